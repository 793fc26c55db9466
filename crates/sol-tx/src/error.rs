use thiserror::Error;

/// Errors raised while handling keys, addresses and transaction bytes.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("malformed key file: {0}")]
    MalformedKeyFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing signer: {0}")]
    MissingSigner(String),

    #[error("no valid bump seed found for program derived address")]
    NoValidBumpFound,

    #[error("invalid seeds: {0}")]
    InvalidSeeds(String),

    #[error("invalid mint layout: {0}")]
    InvalidMintLayout(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}
