//! Signed transactions and their wire format.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message                 (see `message`)
//! ```

use crate::error::TxError;
use crate::keypair::Keypair;
use crate::message::{encode_compact_u16, Message, Reader};
use crate::signature::{Signature, SIGNATURE_LEN};

/// Largest serialized transaction the ledger accepts (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

/// A message plus one signature per required signer, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Sign `message` with every required signer.
    ///
    /// Each signer listed in the message's signer segment must be present
    /// in `signers`; keypairs the message does not require are ignored. On
    /// failure nothing is returned, so a half-signed transaction is never
    /// observable.
    pub fn sign(message: Message, signers: &[&Keypair]) -> Result<Self, TxError> {
        let message_bytes = message.serialize()?;

        let signatures = message
            .signer_keys()
            .iter()
            .map(|required| {
                signers
                    .iter()
                    .find(|kp| kp.pubkey() == *required)
                    .map(|kp| kp.sign_message(&message_bytes))
                    .ok_or_else(|| TxError::MissingSigner(required.to_string()))
            })
            .collect::<Result<Vec<Signature>, TxError>>()?;

        Ok(Self {
            signatures,
            message,
        })
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    /// Check every signature against its signer key and the message bytes.
    pub fn verify(&self) -> bool {
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return false;
        }
        let Ok(message_bytes) = self.message.serialize() else {
            return false;
        };
        self.signatures
            .iter()
            .zip(signers)
            .all(|(sig, key)| sig.verify(key, &message_bytes))
    }

    /// Serialize signatures and message into the wire format.
    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        if self.signatures.len() != self.message.header.num_required_signatures as usize {
            return Err(TxError::SerializationError(format!(
                "{} signatures for {} required signers",
                self.signatures.len(),
                self.message.header.num_required_signatures
            )));
        }

        let message_bytes = self.message.serialize()?;
        let mut wire =
            Vec::with_capacity(3 + SIGNATURE_LEN * self.signatures.len() + message_bytes.len());

        wire.extend_from_slice(&encode_compact_u16(self.signatures.len() as u16));
        for sig in &self.signatures {
            wire.extend_from_slice(sig.as_bytes());
        }
        wire.extend_from_slice(&message_bytes);

        if wire.len() > PACKET_DATA_SIZE {
            return Err(TxError::SerializationError(format!(
                "transaction is {} bytes, max {PACKET_DATA_SIZE}",
                wire.len()
            )));
        }

        Ok(wire)
    }

    /// Parse wire bytes. Signatures are not verified; call [`verify`](Self::verify).
    pub fn deserialize(data: &[u8]) -> Result<Self, TxError> {
        let mut reader = Reader::new(data);

        let num_sigs = reader.read_compact_len()?;
        let mut signatures = Vec::with_capacity(num_sigs);
        for _ in 0..num_sigs {
            signatures.push(Signature::new_from_array(reader.read_array()?));
        }

        let message = Message::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(TxError::SerializationError(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }
        if signatures.len() != message.header.num_required_signatures as usize {
            return Err(TxError::SerializationError(format!(
                "{} signatures for {} required signers",
                signatures.len(),
                message.header.num_required_signatures
            )));
        }

        Ok(Self {
            signatures,
            message,
        })
    }
}
