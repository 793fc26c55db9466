//! Fungible-token program support.
//!
//! Builds token program and associated-token-account program instructions
//! and packs/unpacks the fixed binary account layouts, without pulling in
//! the program crates themselves.
//!
//! Instruction data is a one-byte opcode followed by little-endian fields.
//! Optional keys use the program's `COption` encoding: a `u32` tag (0 or 1)
//! followed by 32 bytes in account state, or a `u8` tag followed by 32 bytes
//! (only when present) in instruction data.

use crate::error::TxError;
use crate::instruction::{AccountMeta, Instruction};
use crate::pda::find_program_address;
use crate::pubkey::Pubkey;
use crate::system_program::SYSTEM_PROGRAM_ID;

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// Rent sysvar: `SysvarRent111111111111111111111111111111111`
pub const RENT_SYSVAR_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xa7, 0xd5, 0x17, 0x19, 0x2c, 0x5c, 0x51, 0x21, 0x8c, 0xc9, 0x4c, 0x3d, 0x4a, 0xf1,
    0x7f, 0x58, 0xda, 0xee, 0x08, 0x9b, 0xa1, 0xfd, 0x44, 0xe3, 0xdb, 0xd9, 0x8a, 0x00, 0x00,
    0x00, 0x00,
]);

/// Size of a mint account.
pub const MINT_LEN: usize = 82;
/// Size of a token account.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

const OP_INITIALIZE_MINT: u8 = 0;
const OP_TRANSFER: u8 = 3;
const OP_MINT_TO: u8 = 7;
const OP_TRANSFER_CHECKED: u8 = 12;
const OP_MINT_TO_CHECKED: u8 = 14;
const OP_INITIALIZE_MINT2: u8 = 20;

const ATA_CREATE: u8 = 0;
const ATA_CREATE_IDEMPOTENT: u8 = 1;

// ---------------------------------------------------------------------------
// Mint instructions
// ---------------------------------------------------------------------------

/// `InitializeMint`: set decimals and authorities on a freshly allocated
/// mint account. Requires the rent sysvar.
pub fn initialize_mint(
    mint: &Pubkey,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
        ],
        data: initialize_mint_data(OP_INITIALIZE_MINT, mint_authority, freeze_authority, decimals),
    }
}

/// `InitializeMint2`: same as [`initialize_mint`] without the rent sysvar.
pub fn initialize_mint2(
    mint: &Pubkey,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*mint, false)],
        data: initialize_mint_data(OP_INITIALIZE_MINT2, mint_authority, freeze_authority, decimals),
    }
}

fn initialize_mint_data(
    opcode: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
) -> Vec<u8> {
    // opcode + decimals + authority + (tag [+ freeze authority]) = 35 or 67 bytes.
    let mut data = Vec::with_capacity(67);
    data.push(opcode);
    data.push(decimals);
    data.extend_from_slice(mint_authority.as_bytes());
    match freeze_authority {
        Some(key) => {
            data.push(1);
            data.extend_from_slice(key.as_bytes());
        }
        None => data.push(0),
    }
    data
}

/// `MintTo`: create `amount` base units in `destination`.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    mint_authority: &Pubkey,
    amount: u64,
) -> Result<Instruction, TxError> {
    non_zero(amount, "mint")?;
    Ok(Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*mint_authority, true),
        ],
        data: amount_data(OP_MINT_TO, amount, None),
    })
}

/// `MintToChecked`: like [`mint_to`], failing on-chain if `decimals`
/// disagrees with the mint.
pub fn mint_to_checked(
    mint: &Pubkey,
    destination: &Pubkey,
    mint_authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, TxError> {
    let mut ix = mint_to(mint, destination, mint_authority, amount)?;
    ix.data = amount_data(OP_MINT_TO_CHECKED, amount, Some(decimals));
    Ok(ix)
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// `Transfer`: move `amount` base units between two token accounts.
///
/// For a token with 6 decimals, `amount = 1_000_000` is one whole token.
///
/// # Wire format
///
/// Opcode 3 followed by u64 LE amount. Total data: 9 bytes.
pub fn transfer(
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, TxError> {
    non_zero(amount, "transfer")?;
    Ok(Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: amount_data(OP_TRANSFER, amount, None),
    })
}

/// `TransferChecked`: transfer that also names the mint and its decimals.
///
/// Opcode 12, u64 LE amount, decimals byte. Total data: 10 bytes.
pub fn transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, TxError> {
    non_zero(amount, "transfer")?;
    Ok(Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: amount_data(OP_TRANSFER_CHECKED, amount, Some(decimals)),
    })
}

fn amount_data(opcode: u8, amount: u64, decimals: Option<u8>) -> Vec<u8> {
    let mut data = Vec::with_capacity(10);
    data.push(opcode);
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend(decimals);
    data
}

fn non_zero(amount: u64, what: &str) -> Result<(), TxError> {
    if amount == 0 {
        return Err(TxError::TransactionBuildError(format!(
            "{what} amount must be > 0"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Associated Token Account (PDA) derivation
// ---------------------------------------------------------------------------

/// Derive the associated token account address for a wallet + mint pair
/// under the standard token program.
pub fn get_associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, TxError> {
    get_associated_token_address_with_program_id(wallet, mint, &TOKEN_PROGRAM_ID)
}

/// The ATA is a program derived address with seeds
/// `[wallet_address, token_program_id, mint_address]` derived from the
/// associated token account program.
pub fn get_associated_token_address_with_program_id(
    wallet: &Pubkey,
    mint: &Pubkey,
    token_program_id: &Pubkey,
) -> Result<Pubkey, TxError> {
    find_program_address(
        &[wallet.as_ref(), token_program_id.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Create the associated token account of `wallet` for `mint`, paid by
/// `payer`. Fails on-chain if the account already exists.
pub fn create_associated_token_account(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, TxError> {
    build_create_ata(payer, wallet, mint, ATA_CREATE)
}

/// Like [`create_associated_token_account`], but succeeds on-chain when the
/// account already exists with the expected owner and mint.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, TxError> {
    build_create_ata(payer, wallet, mint, ATA_CREATE_IDEMPOTENT)
}

fn build_create_ata(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    opcode: u8,
) -> Result<Instruction, TxError> {
    let ata = get_associated_token_address(wallet, mint)?;
    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![opcode],
    })
}

// ---------------------------------------------------------------------------
// Account layouts
// ---------------------------------------------------------------------------

/// Snapshot of a mint account.
///
/// ```text
/// [0..4)   mint authority tag (u32 LE, 0 = none, 1 = some)
/// [4..36)  mint authority
/// [36..44) supply (u64 LE)
/// [44]     decimals
/// [45]     is_initialized
/// [46..50) freeze authority tag
/// [50..82) freeze authority
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Pubkey>,
}

impl Mint {
    pub fn unpack(data: &[u8]) -> Result<Self, TxError> {
        if data.len() != MINT_LEN {
            return Err(TxError::InvalidMintLayout(format!(
                "expected {MINT_LEN} bytes, got {}",
                data.len()
            )));
        }

        let mint_authority = read_coption_key(&data[0..36]).map_err(TxError::InvalidMintLayout)?;
        let supply = read_u64(&data[36..44]);
        let decimals = data[44];
        let is_initialized = match data[45] {
            0 => false,
            1 => true,
            other => {
                return Err(TxError::InvalidMintLayout(format!(
                    "invalid initialized flag {other}"
                )))
            }
        };
        let freeze_authority =
            read_coption_key(&data[46..82]).map_err(TxError::InvalidMintLayout)?;

        Ok(Self {
            mint_authority,
            supply,
            decimals,
            is_initialized,
            freeze_authority,
        })
    }

    pub fn pack(&self) -> [u8; MINT_LEN] {
        let mut out = [0u8; MINT_LEN];
        write_coption_key(&mut out[0..36], self.mint_authority.as_ref());
        out[36..44].copy_from_slice(&self.supply.to_le_bytes());
        out[44] = self.decimals;
        out[45] = self.is_initialized as u8;
        write_coption_key(&mut out[46..82], self.freeze_authority.as_ref());
        out
    }
}

/// Lifecycle state of a token account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountState {
    #[default]
    Uninitialized,
    Initialized,
    Frozen,
}

/// Snapshot of a token account (165 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub state: AccountState,
    /// Rent-exempt reserve for wrapped native accounts.
    pub is_native: Option<u64>,
    pub delegated_amount: u64,
    pub close_authority: Option<Pubkey>,
}

impl TokenAccount {
    pub fn unpack(data: &[u8]) -> Result<Self, TxError> {
        if data.len() != TOKEN_ACCOUNT_LEN {
            return Err(TxError::SerializationError(format!(
                "token account must be {TOKEN_ACCOUNT_LEN} bytes, got {}",
                data.len()
            )));
        }

        let state = match data[108] {
            0 => AccountState::Uninitialized,
            1 => AccountState::Initialized,
            2 => AccountState::Frozen,
            other => {
                return Err(TxError::SerializationError(format!(
                    "invalid token account state {other}"
                )))
            }
        };
        let is_native = match read_u32(&data[109..113]) {
            0 => None,
            1 => Some(read_u64(&data[113..121])),
            tag => {
                return Err(TxError::SerializationError(format!(
                    "invalid option tag {tag}"
                )))
            }
        };

        Ok(Self {
            mint: Pubkey::try_from(&data[0..32])?,
            owner: Pubkey::try_from(&data[32..64])?,
            amount: read_u64(&data[64..72]),
            delegate: read_coption_key(&data[72..108]).map_err(TxError::SerializationError)?,
            state,
            is_native,
            delegated_amount: read_u64(&data[121..129]),
            close_authority: read_coption_key(&data[129..165])
                .map_err(TxError::SerializationError)?,
        })
    }

    pub fn pack(&self) -> [u8; TOKEN_ACCOUNT_LEN] {
        let mut out = [0u8; TOKEN_ACCOUNT_LEN];
        out[0..32].copy_from_slice(self.mint.as_bytes());
        out[32..64].copy_from_slice(self.owner.as_bytes());
        out[64..72].copy_from_slice(&self.amount.to_le_bytes());
        write_coption_key(&mut out[72..108], self.delegate.as_ref());
        out[108] = match self.state {
            AccountState::Uninitialized => 0,
            AccountState::Initialized => 1,
            AccountState::Frozen => 2,
        };
        if let Some(reserve) = self.is_native {
            out[109..113].copy_from_slice(&1u32.to_le_bytes());
            out[113..121].copy_from_slice(&reserve.to_le_bytes());
        }
        out[121..129].copy_from_slice(&self.delegated_amount.to_le_bytes());
        write_coption_key(&mut out[129..165], self.close_authority.as_ref());
        out
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// Read a 36-byte `COption<Pubkey>`.
fn read_coption_key(bytes: &[u8]) -> Result<Option<Pubkey>, String> {
    match read_u32(&bytes[..4]) {
        0 => Ok(None),
        1 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes[4..36]);
            Ok(Some(Pubkey::new_from_array(key)))
        }
        tag => Err(format!("invalid option tag {tag}")),
    }
}

fn write_coption_key(out: &mut [u8], key: Option<&Pubkey>) {
    if let Some(key) = key {
        out[..4].copy_from_slice(&1u32.to_le_bytes());
        out[4..36].copy_from_slice(key.as_bytes());
    }
}
