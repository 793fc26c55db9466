//! Ledger addresses.
//!
//! An address is a raw 32-byte Ed25519 public key (or a program derived
//! address, which is 32 bytes that are deliberately *not* a curve point).
//! The textual form is plain Base58 with the Bitcoin alphabet; there is no
//! checksum and no hashing step.

use std::fmt;
use std::str::FromStr;

use crate::error::TxError;

/// Maximum length of a Base58-encoded 32-byte value.
const MAX_BASE58_LEN: usize = 44;

/// A 32-byte account address.
///
/// Equality and ordering are byte-wise. The type is `Copy`; it carries no
/// ownership of anything on the ledger.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns `true` if the bytes decompress to a valid Ed25519 point.
    ///
    /// Program derived addresses must fail this check so that no private
    /// key can ever sign for them.
    pub fn is_on_curve(&self) -> bool {
        is_on_curve(&self.0)
    }
}

/// Check if 32 bytes represent a valid compressed Edwards Y point.
pub(crate) fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Pubkey {
    type Error = TxError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            TxError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for Pubkey {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_BASE58_LEN {
            return Err(TxError::InvalidAddress(format!(
                "address is {} characters, max {MAX_BASE58_LEN}",
                s.len()
            )));
        }

        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TxError::InvalidAddress(format!("base58 decode failed: {e}")))?;

        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            TxError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
        })?;

        Ok(Self(arr))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

/// Validate an address string and return its decoded form.
pub fn validate_address(address: &str) -> Result<Pubkey, TxError> {
    address.parse()
}
