//! Ledger primitives for the client engine.
//!
//! Keys, addresses, the legacy message wire format, transaction signing and
//! the instruction builders for the system, token and associated-token
//! programs. Everything here is pure: no network and no clock.
//!
//! The compact binary wire format is implemented by hand, using
//! `ed25519-dalek` for signing, `curve25519-dalek` for the off-curve check
//! of program derived addresses and `bs58` for Base58 text forms.

pub mod error;
pub mod hash;
pub mod instruction;
pub mod keypair;
pub mod message;
pub mod pda;
pub mod pubkey;
pub mod signature;
pub mod system_program;
pub mod token;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use error::TxError;
pub use hash::Hash;
pub use instruction::{instruction_discriminator, AccountMeta, Instruction};
pub use keypair::{Keypair, KEYPAIR_LEN};
pub use message::{
    decode_compact_u16, encode_compact_u16, CompiledInstruction, Message, MessageHeader,
};
pub use pda::{create_program_address, find_program_address};
pub use pubkey::{validate_address, Pubkey};
pub use signature::{Signature, SIGNATURE_LEN};
pub use system_program::SYSTEM_PROGRAM_ID;
pub use token::{
    get_associated_token_address, Mint, TokenAccount, ASSOCIATED_TOKEN_PROGRAM_ID, MINT_LEN,
    TOKEN_PROGRAM_ID,
};
pub use transaction::{Transaction, PACKET_DATA_SIZE};
