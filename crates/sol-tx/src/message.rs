//! Message compilation and the message wire format.
//!
//! A message is what every signer signs. Its layout is:
//!
//! ```text
//! Message:
//!   num_required_sigs     u8
//!   num_readonly_signed   u8
//!   num_readonly_unsigned u8
//!   num_accounts          compact-u16
//!   account_keys          32 bytes * num_accounts
//!   recent_blockhash      32 bytes
//!   num_instructions      compact-u16
//!   instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index      u8
//!   num_accounts          compact-u16
//!   account_indices       u8 * num_accounts
//!   data_len              compact-u16
//!   data                  u8 * data_len
//! ```
//!
//! Compilation is deterministic: the same fee payer, instructions (in the
//! same order) and blockhash always serialize to identical bytes.

use crate::error::TxError;
use crate::hash::Hash;
use crate::instruction::Instruction;
use crate::pubkey::Pubkey;

/// Account indices are a single byte on the wire.
pub const MAX_ACCOUNTS: usize = 256;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in the compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from the front of `data`.
///
/// Returns `(value, bytes_consumed)`. Rejects truncated input, encodings
/// longer than three bytes and values above `u16::MAX`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), TxError> {
    let mut value: u32 = 0;

    for (i, &byte) in data.iter().enumerate().take(3) {
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u16::MAX as u32 {
                return Err(TxError::SerializationError(
                    "compact-u16 value overflow".into(),
                ));
            }
            return Ok((value as u16, i + 1));
        }
    }

    if data.len() >= 3 {
        return Err(TxError::SerializationError(
            "compact-u16 longer than 3 bytes".into(),
        ));
    }
    Err(TxError::SerializationError(
        "unexpected end of data while decoding compact-u16".into(),
    ))
}

fn encode_len(buf: &mut Vec<u8>, len: usize) -> Result<(), TxError> {
    let len = u16::try_from(len)
        .map_err(|_| TxError::SerializationError(format!("length {len} exceeds u16")))?;
    buf.extend_from_slice(&encode_compact_u16(len));
    Ok(())
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// The three leading message bytes describing the account key segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Number of required signatures (first N account keys are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed_accounts: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned_accounts: u8,
}

/// A compiled instruction where account references are replaced by u8
/// indices into the message's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index into `account_keys` for the program to invoke.
    pub program_id_index: u8,
    /// Indices into `account_keys` for each account the instruction reads/writes.
    pub accounts: Vec<u8>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

/// A compiled, unsigned message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    /// All account keys referenced by this message, in canonical order:
    ///   1. writable signers (fee payer at index 0)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` into a message paid for by `fee_payer`.
    ///
    /// Accounts are deduplicated; an account's flags are the union of every
    /// reference to it, so a key that signs anywhere is a signer everywhere
    /// and likewise for writability. Program ids join as read-only
    /// non-signers unless referenced otherwise.
    pub fn compile(
        fee_payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Self, TxError> {
        struct AccountEntry {
            pubkey: Pubkey,
            is_signer: bool,
            is_writable: bool,
        }

        // Linear scan keeps first-seen order and account lists are tiny.
        let mut entries: Vec<AccountEntry> = Vec::new();
        let mut upsert = |pubkey: Pubkey, signer: bool, writable: bool| {
            if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
                entry.is_signer |= signer;
                entry.is_writable |= writable;
            } else {
                entries.push(AccountEntry {
                    pubkey,
                    is_signer: signer,
                    is_writable: writable,
                });
            }
        };

        // Fee payer is always signer + writable and seen first.
        upsert(*fee_payer, true, true);

        for ix in instructions {
            upsert(ix.program_id, false, false);
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
        }

        if entries.len() > MAX_ACCOUNTS {
            return Err(TxError::TransactionBuildError(format!(
                "{} accounts referenced, max {MAX_ACCOUNTS}",
                entries.len()
            )));
        }

        fn bucket(entries: &[AccountEntry], signer: bool, writable: bool) -> Vec<Pubkey> {
            entries
                .iter()
                .filter(|e| e.is_signer == signer && e.is_writable == writable)
                .map(|e| e.pubkey)
                .collect()
        }

        let writable_signed = bucket(&entries, true, true);
        let readonly_signed = bucket(&entries, true, false);
        let writable_unsigned = bucket(&entries, false, true);
        let readonly_unsigned = bucket(&entries, false, false);

        let num_signers = writable_signed.len() + readonly_signed.len();
        let header = MessageHeader {
            num_required_signatures: to_u8(num_signers, "signers")?,
            num_readonly_signed_accounts: to_u8(readonly_signed.len(), "read-only signers")?,
            num_readonly_unsigned_accounts: to_u8(readonly_unsigned.len(), "read-only accounts")?,
        };

        let mut account_keys = writable_signed;
        account_keys.extend(readonly_signed);
        account_keys.extend(writable_unsigned);
        account_keys.extend(readonly_unsigned);

        // Compile instructions: replace pubkeys with indices.
        let index_of = |key: &Pubkey| -> Result<u8, TxError> {
            let idx = account_keys.iter().position(|k| k == key).ok_or_else(|| {
                TxError::TransactionBuildError(format!("account {key} not in account keys"))
            })?;
            to_u8(idx, "account index")
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            let accounts = ix
                .accounts
                .iter()
                .map(|meta| index_of(&meta.pubkey))
                .collect::<Result<Vec<u8>, TxError>>()?;

            compiled.push(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                accounts,
                data: ix.data.clone(),
            });
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The keys that must sign, in signature order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    /// Writability of the key at `index`, derived from the header counts.
    pub fn is_writable(&self, index: usize) -> bool {
        let num_keys = self.account_keys.len();
        let num_signed = self.header.num_required_signatures as usize;
        if index >= num_keys {
            return false;
        }
        if index < num_signed {
            index < num_signed.saturating_sub(self.header.num_readonly_signed_accounts as usize)
        } else {
            let num_unsigned = num_keys - num_signed;
            let writable_unsigned =
                num_unsigned.saturating_sub(self.header.num_readonly_unsigned_accounts as usize);
            index - num_signed < writable_unsigned
        }
    }

    /// Serialize the message (the bytes that get signed).
    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        let mut buf = Vec::with_capacity(
            3 + 3 + 32 * self.account_keys.len() + 32 + 3 + 64 * self.instructions.len(),
        );

        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        encode_len(&mut buf, self.account_keys.len())?;
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_len(&mut buf, self.instructions.len())?;
        for ix in &self.instructions {
            buf.push(ix.program_id_index);

            encode_len(&mut buf, ix.accounts.len())?;
            buf.extend_from_slice(&ix.accounts);

            encode_len(&mut buf, ix.data.len())?;
            buf.extend_from_slice(&ix.data);
        }

        Ok(buf)
    }

    /// Parse a serialized message. The whole slice must be consumed.
    pub fn deserialize(data: &[u8]) -> Result<Self, TxError> {
        let mut reader = Reader::new(data);
        let message = Self::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(TxError::SerializationError(format!(
                "{} trailing bytes after message",
                reader.remaining()
            )));
        }
        Ok(message)
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, TxError> {
        let header = MessageHeader {
            num_required_signatures: reader.read_u8()?,
            num_readonly_signed_accounts: reader.read_u8()?,
            num_readonly_unsigned_accounts: reader.read_u8()?,
        };

        let num_keys = reader.read_compact_len()?;
        let mut account_keys = Vec::with_capacity(num_keys);
        for _ in 0..num_keys {
            account_keys.push(Pubkey::new_from_array(reader.read_array()?));
        }
        if (header.num_required_signatures as usize) > account_keys.len() {
            return Err(TxError::SerializationError(
                "header requires more signers than account keys".into(),
            ));
        }

        let recent_blockhash = Hash::new_from_array(reader.read_array()?);

        let num_instructions = reader.read_compact_len()?;
        let mut instructions = Vec::with_capacity(num_instructions);
        for _ in 0..num_instructions {
            let program_id_index = reader.read_u8()?;
            let n = reader.read_compact_len()?;
            let accounts = reader.read_bytes(n)?.to_vec();
            let n = reader.read_compact_len()?;
            let data = reader.read_bytes(n)?.to_vec();

            let max_index = accounts.iter().chain(Some(&program_id_index)).max();
            if max_index.is_some_and(|&i| i as usize >= account_keys.len()) {
                return Err(TxError::SerializationError(
                    "instruction references an account index out of range".into(),
                ));
            }

            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}

fn to_u8(n: usize, what: &str) -> Result<u8, TxError> {
    u8::try_from(n).map_err(|_| TxError::TransactionBuildError(format!("too many {what}: {n}")))
}

// ---------------------------------------------------------------------------
// Byte reader
// ---------------------------------------------------------------------------

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, TxError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_compact_len(&mut self) -> Result<usize, TxError> {
        let (value, consumed) = decode_compact_u16(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value as usize)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], TxError> {
        if n > self.remaining() {
            return Err(TxError::SerializationError(format!(
                "unexpected end of data: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}
