//! Signing keypairs and their on-disk form.
//!
//! A keypair file holds the 64-byte secret key (32-byte seed followed by the
//! 32-byte public key) as a JSON array of numbers, e.g. `[12,201,...]`. This
//! is the same format the ledger's own command-line tools write, so files are
//! interchangeable with them.

use std::fmt;
use std::fs;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::error::TxError;
use crate::pubkey::Pubkey;
use crate::signature::Signature;

/// Length of the serialized secret key: seed || public key.
pub const KEYPAIR_LEN: usize = 64;

/// An Ed25519 signing keypair.
///
/// Immutable after creation. The secret half is zeroed on drop (by
/// `ed25519-dalek`) and is never printed by `Debug`.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the operating system CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a 64-byte secret key.
    ///
    /// Fails with `MalformedKeyFile` if the length is wrong or if bytes
    /// 32..64 are not the public key derived from bytes 0..32.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(TxError::MalformedKeyFile(format!(
                "expected {KEYPAIR_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes[..32]);
        let signing_key = SigningKey::from_bytes(&seed);

        if signing_key.verifying_key().as_bytes() != &bytes[32..] {
            return Err(TxError::MalformedKeyFile(
                "public key does not match secret seed".into(),
            ));
        }

        Ok(Self { signing_key })
    }

    /// Export the 64-byte secret key. The buffer is wiped when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing_key.verifying_key().to_bytes())
    }

    /// Base58 address of the public key.
    pub fn address(&self) -> String {
        self.pubkey().to_string()
    }

    /// Sign arbitrary bytes. Ed25519 is deterministic: the same key and
    /// message always yield the same signature.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message).into()
    }

    /// Write the secret key to `path`, replacing any existing file.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), TxError> {
        let bytes = self.to_bytes();
        let json = Zeroizing::new(
            serde_json::to_string(&bytes[..])
                .map_err(|e| TxError::SerializationError(e.to_string()))?,
        );
        fs::write(path, json.as_bytes())?;
        Ok(())
    }

    /// Read a keypair previously written by [`Keypair::persist`] (or by the
    /// ledger's command-line tools).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TxError> {
        let contents = Zeroizing::new(fs::read_to_string(path)?);
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(contents.trim())
                .map_err(|e| TxError::MalformedKeyFile(format!("not a byte array: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
