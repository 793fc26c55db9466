//! Chain reader: a blocking JSON-RPC client for a ledger node.
//!
//! [`RpcClient`] exposes the handful of node methods a wallet needs
//! (balances, account data, blockhashes, submission and signature status)
//! over any [`RpcTransport`]. [`HttpTransport`] is the default, built on
//! blocking `reqwest`.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::RpcError;
pub use transport::{HttpTransport, RpcTransport};
pub use types::{
    Account, Commitment, RecentBlockhash, SignatureStatus, TokenAccountEntry, TokenAmount,
};
