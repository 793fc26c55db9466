use sol_tx::TxError;
use thiserror::Error;

/// Errors raised while talking to a ledger node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection, timeout or HTTP-level failure. The node may never have
    /// seen the request.
    #[error("network error: {0}")]
    Network(String),

    /// The node answered with a structured JSON-RPC error.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Tx(#[from] TxError),
}

impl RpcError {
    /// True when resending the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Network(_))
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::InvalidResponse(e.to_string())
    }
}
