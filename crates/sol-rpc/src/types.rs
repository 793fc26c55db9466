//! Request options and response shapes of the node's JSON-RPC API.
//!
//! The `Rpc*` structs mirror the node's camelCase JSON and stay private to
//! the crate; the rest are the typed values handed to callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sol_tx::{Hash, Pubkey};

/// How settled a piece of ledger state must be before the node reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Seen by the connected node; may still be rolled back.
    Processed,
    /// Voted on by a supermajority of stake.
    Confirmed,
    /// Rooted; will not be rolled back.
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level: {other}")),
        }
    }
}

/// A blockhash plus the last block height at which transactions using it
/// are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Where a submitted transaction stands, as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The node has no record of the signature.
    Pending,
    /// Executed by the connected node but not yet voted on.
    Processed { slot: u64 },
    Confirmed { slot: u64 },
    Finalized { slot: u64 },
    /// Executed and rejected. `reason` is the node's error object as text.
    Failed { slot: u64, reason: String },
}

impl SignatureStatus {
    /// The slot the transaction landed in, once known.
    pub fn slot(&self) -> Option<u64> {
        match self {
            SignatureStatus::Pending => None,
            SignatureStatus::Processed { slot }
            | SignatureStatus::Confirmed { slot }
            | SignatureStatus::Finalized { slot }
            | SignatureStatus::Failed { slot, .. } => Some(*slot),
        }
    }

    /// Whether this status meets `commitment`.
    ///
    /// Failures are terminal at every level and are reported as such by the
    /// caller; this only answers for successful states.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match (self, commitment) {
            (SignatureStatus::Finalized { .. }, _) => true,
            (SignatureStatus::Confirmed { .. }, Commitment::Confirmed | Commitment::Processed) => {
                true
            }
            (SignatureStatus::Processed { .. }, Commitment::Processed) => true,
            _ => false,
        }
    }
}

/// A full account as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
    pub rent_epoch: u64,
}

/// A token account balance. `amount` is in base units and kept as the
/// node's decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
    pub ui_amount_string: String,
}

impl TokenAmount {
    /// The amount in base units.
    pub fn base_units(&self) -> Result<u64, std::num::ParseIntError> {
        self.amount.parse()
    }
}

/// One token account held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountEntry {
    pub address: Pubkey,
    pub mint: Pubkey,
    /// Human-readable balance with the mint's decimals applied, e.g. `"1.5"`.
    pub balance: String,
    pub owner: Pubkey,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// `{ "context": { "slot": .. }, "value": .. }`
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcAccount {
    pub lamports: u64,
    pub owner: String,
    /// `[payload, encoding]`
    pub data: (String, String),
    pub executable: bool,
    pub rent_epoch: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcSignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<Commitment>,
}

impl RpcSignatureStatus {
    pub fn into_status(self) -> SignatureStatus {
        let slot = self.slot;
        if let Some(err) = self.err {
            return SignatureStatus::Failed {
                slot,
                reason: err.to_string(),
            };
        }
        match self.confirmation_status {
            Some(Commitment::Finalized) => SignatureStatus::Finalized { slot },
            Some(Commitment::Confirmed) => SignatureStatus::Confirmed { slot },
            Some(Commitment::Processed) => SignatureStatus::Processed { slot },
            // Older nodes omit the level; `confirmations: null` means rooted.
            None if self.confirmations.is_none() => SignatureStatus::Finalized { slot },
            None => SignatureStatus::Confirmed { slot },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcKeyedAccount {
    pub pubkey: String,
    pub account: RpcParsedAccount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcParsedAccount {
    /// `jsonParsed` yields an object for known programs and falls back to
    /// `[payload, encoding]` otherwise.
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcTokenAccountInfo {
    pub mint: String,
    pub owner: String,
    pub token_amount: TokenAmount,
}
