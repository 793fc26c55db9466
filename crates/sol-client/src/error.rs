use sol_rpc::RpcError;
use sol_tx::{Signature, TxError};
use thiserror::Error;

/// Errors surfaced by the dispatcher and token flows.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Tx(#[from] TxError),

    /// The deadline passed with the transaction still unconfirmed. It may
    /// yet land: check its status before building a replacement.
    #[error("confirmation timed out for {signature}")]
    TimedOut { signature: Signature },

    /// The blockhash expired before the transaction landed. Recompile with
    /// a fresh blockhash.
    #[error("blockhash expired before {signature} was confirmed")]
    BlockhashExpired { signature: Signature },

    #[error("transaction {signature} failed: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("config error: {0}")]
    Config(String),
}
