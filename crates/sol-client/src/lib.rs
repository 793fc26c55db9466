//! Client engine: submits transactions and runs token flows against a
//! ledger node.
//!
//! [`Dispatcher`] drives compile → sign → submit → confirm over a
//! [`sol_rpc::RpcClient`]; [`TokenClient`] builds on it for mints,
//! associated accounts and token transfers. [`config`] and [`logging`]
//! set both up from a TOML file.

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use config::{load_config, ClientConfig};
pub use dispatcher::{
    CompiledMessage, ConfirmationOutcome, Dispatcher, SignedTransaction, SubmissionHandle,
};
pub use error::ClientError;
pub use logging::{LogConfig, LogFormat, LogOutput};
pub use token::TokenClient;

// Re-export the lower layers so callers need only this crate.
pub use sol_rpc;
pub use sol_tx;
