//! In-memory ledger node for integration tests.
//!
//! `MockLedger` answers the JSON-RPC methods the client uses. Submitted
//! transactions are decoded from the wire, signature-checked and executed
//! against a small model of the system, token and associated-token
//! programs, so the tests observe the same balances a real node would.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use sol_client::sol_rpc::{RpcError, RpcTransport};
use sol_client::sol_tx::message::CompiledInstruction;
use sol_client::sol_tx::token::{
    get_associated_token_address, AccountState, Mint, TokenAccount, ASSOCIATED_TOKEN_PROGRAM_ID,
    MINT_LEN, RENT_SYSVAR_ID, TOKEN_ACCOUNT_LEN, TOKEN_PROGRAM_ID,
};
use sol_client::sol_tx::{Hash, Message, Pubkey, Signature, Transaction, SYSTEM_PROGRAM_ID};
use sol_client::Clock;

pub const FEE_PER_SIGNATURE: u64 = 5_000;
/// Blocks a blockhash stays valid for after it is handed out.
pub const BLOCKHASH_VALIDITY: u64 = 150;
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Rent-exempt minimum for `len` bytes (two years at 3480 lamports per
/// byte-year, plus the 128-byte account overhead).
pub fn rent_exempt(len: u64) -> u64 {
    (len + 128) * 3_480 * 2
}

// ---------------------------------------------------------------------------
// Virtual clock
// ---------------------------------------------------------------------------

/// A clock that only moves when slept on.
pub struct VirtualClock {
    start: Instant,
    elapsed: Cell<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
    }
}

// ---------------------------------------------------------------------------
// Ledger state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MockAccount {
    lamports: u64,
    owner: Pubkey,
    data: Vec<u8>,
}

type Accounts = HashMap<Pubkey, MockAccount>;

struct TxStatus {
    slot: u64,
    err: Option<Value>,
    polls: u32,
}

struct PendingAirdrop {
    to: Pubkey,
    lamports: u64,
    polls_left: u32,
}

#[derive(Default)]
struct State {
    accounts: Accounts,
    slot: u64,
    block_height: u64,
    /// blockhash -> last valid block height
    blockhashes: HashMap<Hash, u64>,
    statuses: HashMap<Signature, TxStatus>,
    /// Accounts the next `getAccountInfo` reports as missing.
    hidden_once: Vec<Pubkey>,
    airdrops: Vec<PendingAirdrop>,
    airdrop_count: u64,
    calls: Vec<String>,
}

pub struct MockLedger {
    state: RefCell<State>,
    drop_submissions: Cell<bool>,
    preflight: Cell<bool>,
    height_step: Cell<u64>,
    airdrops_enabled: Cell<bool>,
    airdrop_delay: Cell<u32>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                block_height: 1_000,
                slot: 1_200,
                ..State::default()
            }),
            drop_submissions: Cell::new(false),
            preflight: Cell::new(true),
            height_step: Cell::new(1),
            airdrops_enabled: Cell::new(true),
            airdrop_delay: Cell::new(0),
        }
    }

    // -- Knobs ---------------------------------------------------------------

    /// Accept submissions but never execute them.
    pub fn drop_submissions(&self, drop: bool) {
        self.drop_submissions.set(drop);
    }

    /// With preflight off, failing transactions land as failed instead of
    /// being rejected at submission.
    pub fn set_preflight(&self, enabled: bool) {
        self.preflight.set(enabled);
    }

    /// Blocks produced per `getBlockHeight` call.
    pub fn set_height_step(&self, step: u64) {
        self.height_step.set(step);
    }

    pub fn set_airdrops_enabled(&self, enabled: bool) {
        self.airdrops_enabled.set(enabled);
    }

    /// Balance queries an airdrop waits before it lands.
    pub fn set_airdrop_delay(&self, polls: u32) {
        self.airdrop_delay.set(polls);
    }

    /// Report `pubkey` as missing to the next `getAccountInfo`, as if it
    /// were created right after that read.
    pub fn hide_once(&self, pubkey: &Pubkey) {
        self.state.borrow_mut().hidden_once.push(*pubkey);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.borrow_mut().block_height += blocks;
    }

    // -- Inspection ----------------------------------------------------------

    pub fn fund(&self, pubkey: &Pubkey, lamports: u64) {
        let mut state = self.state.borrow_mut();
        let account = state.accounts.entry(*pubkey).or_insert(MockAccount {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
        });
        account.lamports += lamports;
    }

    pub fn lamports(&self, pubkey: &Pubkey) -> u64 {
        self.state
            .borrow()
            .accounts
            .get(pubkey)
            .map_or(0, |a| a.lamports)
    }

    pub fn token_account(&self, pubkey: &Pubkey) -> Option<TokenAccount> {
        let state = self.state.borrow();
        let account = state.accounts.get(pubkey)?;
        TokenAccount::unpack(&account.data).ok()
    }

    pub fn mint(&self, pubkey: &Pubkey) -> Option<Mint> {
        let state = self.state.borrow();
        let account = state.accounts.get(pubkey)?;
        Mint::unpack(&account.data).ok()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    // -- Methods -------------------------------------------------------------

    fn get_balance(&self, params: &Value) -> Result<Value, RpcError> {
        let pubkey = param_pubkey(params, 0)?;
        let mut state = self.state.borrow_mut();
        land_airdrops(&mut state);
        let lamports = state.accounts.get(&pubkey).map_or(0, |a| a.lamports);
        Ok(with_context(&state, json!(lamports)))
    }

    fn request_airdrop(&self, params: &Value) -> Result<Value, RpcError> {
        let pubkey = param_pubkey(params, 0)?;
        let lamports = params[1]
            .as_u64()
            .ok_or_else(|| invalid_params("lamports must be a u64"))?;
        if !self.airdrops_enabled.get() {
            return Err(RpcError::Node {
                code: -32603,
                message: "airdrop request failed. This can happen when the rate limit is reached."
                    .into(),
            });
        }

        let mut state = self.state.borrow_mut();
        state.airdrop_count += 1;
        let mut bytes = [0xA1u8; 64];
        bytes[..8].copy_from_slice(&state.airdrop_count.to_le_bytes());
        let signature = Signature::new_from_array(bytes);
        let slot = state.slot;
        state.statuses.insert(
            signature,
            TxStatus {
                slot,
                err: None,
                polls: 0,
            },
        );
        state.airdrops.push(PendingAirdrop {
            to: pubkey,
            lamports,
            polls_left: self.airdrop_delay.get(),
        });
        Ok(json!(signature.to_string()))
    }

    fn get_latest_blockhash(&self) -> Result<Value, RpcError> {
        let mut state = self.state.borrow_mut();
        let height = state.block_height;
        let mut bytes = [0xABu8; 32];
        bytes[..8].copy_from_slice(&height.to_le_bytes());
        let blockhash = Hash::new_from_array(bytes);
        let last_valid = height + BLOCKHASH_VALIDITY;
        state.blockhashes.insert(blockhash, last_valid);
        Ok(with_context(
            &state,
            json!({
                "blockhash": blockhash.to_string(),
                "lastValidBlockHeight": last_valid
            }),
        ))
    }

    fn get_block_height(&self) -> Result<Value, RpcError> {
        let mut state = self.state.borrow_mut();
        state.block_height += self.height_step.get();
        state.slot += self.height_step.get();
        Ok(json!(state.block_height))
    }

    fn get_account_info(&self, params: &Value) -> Result<Value, RpcError> {
        let pubkey = param_pubkey(params, 0)?;
        let config = &params[1];
        if config["encoding"] != "base64" {
            return Err(invalid_params("only base64 encoding is supported"));
        }

        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.hidden_once.iter().position(|k| *k == pubkey) {
            state.hidden_once.remove(pos);
            return Ok(with_context(&state, Value::Null));
        }
        let Some(account) = state.accounts.get(&pubkey) else {
            return Ok(with_context(&state, Value::Null));
        };
        let data = match config.get("dataSlice") {
            Some(slice) => {
                let offset = slice["offset"].as_u64().unwrap_or(0) as usize;
                let length = slice["length"].as_u64().unwrap_or(0) as usize;
                let start = offset.min(account.data.len());
                let end = offset.saturating_add(length).min(account.data.len());
                &account.data[start..end]
            }
            None => &account.data[..],
        };
        Ok(with_context(
            &state,
            json!({
                "data": [BASE64.encode(data), "base64"],
                "executable": false,
                "lamports": account.lamports,
                "owner": account.owner.to_string(),
                "rentEpoch": u64::MAX,
                "space": account.data.len()
            }),
        ))
    }

    fn get_minimum_balance_for_rent_exemption(&self, params: &Value) -> Result<Value, RpcError> {
        let len = params[0]
            .as_u64()
            .ok_or_else(|| invalid_params("data length must be a u64"))?;
        Ok(json!(rent_exempt(len)))
    }

    fn get_token_account_balance(&self, params: &Value) -> Result<Value, RpcError> {
        let pubkey = param_pubkey(params, 0)?;
        let state = self.state.borrow();
        let account = state
            .accounts
            .get(&pubkey)
            .ok_or_else(|| invalid_params("Invalid param: could not find account"))?;
        let token = token_state(account)
            .map_err(|_| invalid_params("Invalid param: not a Token account"))?;
        let decimals = state
            .accounts
            .get(&token.mint)
            .and_then(|m| Mint::unpack(&m.data).ok())
            .map_or(0, |m| m.decimals);
        Ok(with_context(&state, token_amount_json(token.amount, decimals)))
    }

    fn get_token_accounts_by_owner(&self, params: &Value) -> Result<Value, RpcError> {
        let owner = param_pubkey(params, 0)?;
        if params[1]["programId"] != TOKEN_PROGRAM_ID.to_string() {
            return Err(invalid_params("unsupported filter"));
        }
        if params[2]["encoding"] != "jsonParsed" {
            return Err(invalid_params("only jsonParsed encoding is supported"));
        }

        let state = self.state.borrow();
        let mut held: Vec<(Pubkey, TokenAccount, u64)> = state
            .accounts
            .iter()
            .filter_map(|(address, account)| {
                let token = token_state(account).ok()?;
                (token.owner == owner).then_some((*address, token, account.lamports))
            })
            .collect();
        held.sort_by_key(|(address, _, _)| *address);

        let value: Vec<Value> = held
            .into_iter()
            .map(|(address, token, lamports)| {
                let decimals = state
                    .accounts
                    .get(&token.mint)
                    .and_then(|m| Mint::unpack(&m.data).ok())
                    .map_or(0, |m| m.decimals);
                json!({
                    "pubkey": address.to_string(),
                    "account": {
                        "data": {
                            "program": "spl-token",
                            "parsed": {
                                "type": "account",
                                "info": {
                                    "isNative": false,
                                    "mint": token.mint.to_string(),
                                    "owner": token.owner.to_string(),
                                    "state": "initialized",
                                    "tokenAmount": token_amount_json(token.amount, decimals)
                                }
                            },
                            "space": TOKEN_ACCOUNT_LEN
                        },
                        "executable": false,
                        "lamports": lamports,
                        "owner": TOKEN_PROGRAM_ID.to_string(),
                        "rentEpoch": u64::MAX,
                        "space": TOKEN_ACCOUNT_LEN
                    }
                })
            })
            .collect();
        Ok(with_context(&state, Value::Array(value)))
    }

    fn send_transaction(&self, params: &Value) -> Result<Value, RpcError> {
        let encoded = params[0]
            .as_str()
            .ok_or_else(|| invalid_params("missing transaction"))?;
        if params[1]["encoding"] != "base64" {
            return Err(invalid_params("only base64 encoding is supported"));
        }
        let wire = BASE64
            .decode(encoded)
            .map_err(|e| invalid_params(&format!("invalid base64: {e}")))?;
        let tx = Transaction::deserialize(&wire)
            .map_err(|e| invalid_params(&format!("failed to deserialize transaction: {e}")))?;
        if !tx.verify() {
            return Err(RpcError::Node {
                code: -32003,
                message: "Transaction signature verification failure".into(),
            });
        }

        let mut state = self.state.borrow_mut();
        let fresh = state
            .blockhashes
            .get(&tx.message.recent_blockhash)
            .is_some_and(|last_valid| *last_valid >= state.block_height);
        if !fresh {
            return Err(simulation_failed("Blockhash not found"));
        }

        let signature = tx.signatures[0];
        if state.statuses.contains_key(&signature) {
            return Err(simulation_failed("This transaction has already been processed"));
        }
        if self.drop_submissions.get() {
            return Ok(json!(signature.to_string()));
        }

        let mut accounts = state.accounts.clone();
        charge_fee(&mut accounts, &tx.message, tx.signatures.len())
            .map_err(|e| simulation_failed(&e))?;
        let fee_charged = accounts.clone();

        let outcome = tx
            .message
            .instructions
            .iter()
            .enumerate()
            .try_for_each(|(index, ix)| {
                process_instruction(&mut accounts, &tx.message, ix).map_err(|e| (index, e))
            });

        state.slot += 1;
        let slot = state.slot;
        let err = match outcome {
            Ok(()) => {
                state.accounts = accounts;
                None
            }
            Err((index, reason)) if self.preflight.get() => {
                return Err(simulation_failed(&format!(
                    "Error processing Instruction {index}: {reason}"
                )));
            }
            Err((index, reason)) => {
                state.accounts = fee_charged;
                Some(json!({ "InstructionError": [index, reason] }))
            }
        };
        state.statuses.insert(signature, TxStatus { slot, err, polls: 0 });
        Ok(json!(signature.to_string()))
    }

    fn get_signature_statuses(&self, params: &Value) -> Result<Value, RpcError> {
        let signatures = params[0]
            .as_array()
            .ok_or_else(|| invalid_params("expected an array of signatures"))?;
        let mut state = self.state.borrow_mut();
        let mut value = Vec::with_capacity(signatures.len());
        for raw in signatures {
            let signature: Signature = raw
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| invalid_params("invalid signature"))?;
            let entry = state.statuses.get_mut(&signature).map(|status| {
                // processed -> confirmed -> finalized, one step per query.
                let level = match status.polls {
                    0 => "processed",
                    1 => "confirmed",
                    _ => "finalized",
                };
                status.polls += 1;
                let confirmations = if level == "finalized" {
                    Value::Null
                } else {
                    json!(status.polls)
                };
                let result = match &status.err {
                    None => json!({ "Ok": null }),
                    Some(err) => json!({ "Err": err }),
                };
                json!({
                    "slot": status.slot,
                    "confirmations": confirmations,
                    "err": status.err.clone(),
                    "status": result,
                    "confirmationStatus": level
                })
            });
            value.push(entry.unwrap_or(Value::Null));
        }
        Ok(with_context(&state, Value::Array(value)))
    }
}

impl RpcTransport for MockLedger {
    fn send(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.state.borrow_mut().calls.push(method.to_string());
        match method {
            "getBalance" => self.get_balance(&params),
            "requestAirdrop" => self.request_airdrop(&params),
            "getLatestBlockhash" => self.get_latest_blockhash(),
            "getBlockHeight" => self.get_block_height(),
            "getAccountInfo" => self.get_account_info(&params),
            "getMinimumBalanceForRentExemption" => {
                self.get_minimum_balance_for_rent_exemption(&params)
            }
            "getTokenAccountBalance" => self.get_token_account_balance(&params),
            "getTokenAccountsByOwner" => self.get_token_accounts_by_owner(&params),
            "sendTransaction" => self.send_transaction(&params),
            "getSignatureStatuses" => self.get_signature_statuses(&params),
            other => Err(RpcError::Node {
                code: -32601,
                message: format!("Method not found: {other}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn with_context(state: &State, value: Value) -> Value {
    json!({ "context": { "apiVersion": "2.0.0", "slot": state.slot }, "value": value })
}

fn invalid_params(message: &str) -> RpcError {
    RpcError::Node {
        code: -32602,
        message: message.to_string(),
    }
}

fn simulation_failed(reason: &str) -> RpcError {
    RpcError::Node {
        code: -32002,
        message: format!("Transaction simulation failed: {reason}"),
    }
}

fn param_pubkey(params: &Value, index: usize) -> Result<Pubkey, RpcError> {
    params[index]
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_params("Invalid param: invalid pubkey"))
}

fn land_airdrops(state: &mut State) {
    let mut landed = Vec::new();
    state.airdrops.retain_mut(|drop| {
        if drop.polls_left == 0 {
            landed.push((drop.to, drop.lamports));
            false
        } else {
            drop.polls_left -= 1;
            true
        }
    });
    for (to, lamports) in landed {
        credit(&mut state.accounts, &to, lamports);
    }
}

fn token_amount_json(amount: u64, decimals: u8) -> Value {
    json!({
        "amount": amount.to_string(),
        "decimals": decimals,
        "uiAmount": amount as f64 / 10f64.powi(decimals as i32),
        "uiAmountString": ui_amount_string(amount, decimals)
    })
}

pub fn ui_amount_string(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}

fn token_state(account: &MockAccount) -> Result<TokenAccount, String> {
    if account.owner != TOKEN_PROGRAM_ID || account.data.len() != TOKEN_ACCOUNT_LEN {
        return Err("not a token account".into());
    }
    TokenAccount::unpack(&account.data).map_err(|e| e.to_string())
}

fn mint_state(account: Option<&MockAccount>) -> Result<Mint, String> {
    let account = account.ok_or("mint account not found")?;
    if account.owner != TOKEN_PROGRAM_ID {
        return Err("mint not owned by the token program".into());
    }
    let mint = Mint::unpack(&account.data).map_err(|e| e.to_string())?;
    if !mint.is_initialized {
        return Err("mint is not initialized".into());
    }
    Ok(mint)
}

fn credit(accounts: &mut Accounts, to: &Pubkey, lamports: u64) {
    let account = accounts.entry(*to).or_insert(MockAccount {
        lamports: 0,
        owner: SYSTEM_PROGRAM_ID,
        data: Vec::new(),
    });
    account.lamports += lamports;
}

fn debit(accounts: &mut Accounts, from: &Pubkey, lamports: u64) -> Result<(), String> {
    let account = accounts
        .get_mut(from)
        .filter(|a| a.lamports >= lamports)
        .ok_or_else(|| format!("insufficient lamports in {from}"))?;
    account.lamports -= lamports;
    Ok(())
}

fn charge_fee(accounts: &mut Accounts, message: &Message, signatures: usize) -> Result<(), String> {
    let payer = message.fee_payer().ok_or("message has no fee payer")?;
    debit(accounts, payer, FEE_PER_SIGNATURE * signatures as u64)
        .map_err(|_| "Attempt to debit an account but found no record of a prior credit".to_string())
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, String> {
    data.get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| "invalid instruction data".to_string())
}

fn read_key(data: &[u8], at: usize) -> Result<Pubkey, String> {
    data.get(at..at + 32)
        .and_then(|b| Pubkey::try_from(b).ok())
        .ok_or_else(|| "invalid instruction data".to_string())
}

/// Account keys an instruction references, with their message roles.
struct IxAccounts<'m> {
    message: &'m Message,
    indices: &'m [u8],
}

impl IxAccounts<'_> {
    fn key(&self, position: usize) -> Result<Pubkey, String> {
        let index = *self
            .indices
            .get(position)
            .ok_or("not enough account keys")? as usize;
        Ok(self.message.account_keys[index])
    }

    fn signer(&self, position: usize) -> Result<Pubkey, String> {
        let key = self.key(position)?;
        if !self.message.is_signer(self.indices[position] as usize) {
            return Err(format!("missing required signature for {key}"));
        }
        Ok(key)
    }

    fn writable(&self, position: usize) -> Result<Pubkey, String> {
        let key = self.key(position)?;
        if !self.message.is_writable(self.indices[position] as usize) {
            return Err(format!("{key} must be writable"));
        }
        Ok(key)
    }
}

fn process_instruction(
    accounts: &mut Accounts,
    message: &Message,
    ix: &CompiledInstruction,
) -> Result<(), String> {
    let program_id = message.account_keys[ix.program_id_index as usize];
    let ix_accounts = IxAccounts {
        message,
        indices: &ix.accounts,
    };
    if program_id == SYSTEM_PROGRAM_ID {
        process_system(accounts, &ix_accounts, &ix.data)
    } else if program_id == TOKEN_PROGRAM_ID {
        process_token(accounts, &ix_accounts, &ix.data)
    } else if program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
        process_associated(accounts, &ix_accounts, &ix.data)
    } else {
        Err(format!("program {program_id} is not deployed"))
    }
}

fn process_system(accounts: &mut Accounts, ix: &IxAccounts<'_>, data: &[u8]) -> Result<(), String> {
    let index = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or("invalid instruction data")?;
    match index {
        0 => {
            let lamports = read_u64(data, 4)?;
            let space = read_u64(data, 12)?;
            let owner = read_key(data, 20)?;
            let from = ix.signer(0)?;
            ix.writable(0)?;
            let new = ix.signer(1)?;
            ix.writable(1)?;
            if accounts
                .get(&new)
                .is_some_and(|a| a.lamports > 0 || !a.data.is_empty())
            {
                return Err(format!("account {new} already in use"));
            }
            debit(accounts, &from, lamports)?;
            accounts.insert(
                new,
                MockAccount {
                    lamports,
                    owner,
                    data: vec![0; space as usize],
                },
            );
            Ok(())
        }
        2 => {
            let lamports = read_u64(data, 4)?;
            let from = ix.signer(0)?;
            ix.writable(0)?;
            let to = ix.writable(1)?;
            debit(accounts, &from, lamports)?;
            credit(accounts, &to, lamports);
            Ok(())
        }
        other => Err(format!("unsupported system instruction {other}")),
    }
}

fn process_token(accounts: &mut Accounts, ix: &IxAccounts<'_>, data: &[u8]) -> Result<(), String> {
    let opcode = *data.first().ok_or("invalid instruction data")?;
    match opcode {
        // InitializeMint / InitializeMint2
        0 | 20 => {
            let mint_key = ix.writable(0)?;
            if opcode == 0 && ix.key(1)? != RENT_SYSVAR_ID {
                return Err("rent sysvar expected".into());
            }
            let decimals = *data.get(1).ok_or("invalid instruction data")?;
            let authority = read_key(data, 2)?;
            let freeze_authority = match data.get(34) {
                Some(1) => Some(read_key(data, 35)?),
                Some(0) => None,
                _ => return Err("invalid instruction data".into()),
            };

            let account = accounts
                .get_mut(&mint_key)
                .filter(|a| a.owner == TOKEN_PROGRAM_ID && a.data.len() == MINT_LEN)
                .ok_or("invalid mint account")?;
            let mut mint = Mint::unpack(&account.data).map_err(|e| e.to_string())?;
            if mint.is_initialized {
                return Err("mint already initialized".into());
            }
            mint.mint_authority = Some(authority);
            mint.decimals = decimals;
            mint.is_initialized = true;
            mint.freeze_authority = freeze_authority;
            account.data = mint.pack().to_vec();
            Ok(())
        }
        // MintTo / MintToChecked
        7 | 14 => {
            let amount = read_u64(data, 1)?;
            let mint_key = ix.writable(0)?;
            let dest_key = ix.writable(1)?;
            let authority = ix.signer(2)?;

            let mut mint = mint_state(accounts.get(&mint_key))?;
            if mint.mint_authority != Some(authority) {
                return Err("owner does not match".into());
            }
            if opcode == 14 && data.get(9) != Some(&mint.decimals) {
                return Err("decimals mismatch".into());
            }
            let dest_account = accounts.get(&dest_key).ok_or("destination not found")?;
            let mut dest = token_state(dest_account)?;
            if dest.mint != mint_key {
                return Err("account not associated with this mint".into());
            }
            mint.supply = mint.supply.checked_add(amount).ok_or("overflow")?;
            dest.amount = dest.amount.checked_add(amount).ok_or("overflow")?;

            set_data(accounts, &mint_key, mint.pack().to_vec());
            set_data(accounts, &dest_key, dest.pack().to_vec());
            Ok(())
        }
        // Transfer / TransferChecked
        3 | 12 => {
            let amount = read_u64(data, 1)?;
            let checked = opcode == 12;
            let source_key = ix.writable(0)?;
            let (dest_pos, owner_pos) = if checked { (2, 3) } else { (1, 2) };
            let dest_key = ix.writable(dest_pos)?;
            let owner = ix.signer(owner_pos)?;

            let mut source = token_state(accounts.get(&source_key).ok_or("source not found")?)?;
            let mut dest = token_state(accounts.get(&dest_key).ok_or("destination not found")?)?;
            if source.owner != owner {
                return Err("owner does not match".into());
            }
            if source.mint != dest.mint {
                return Err("account not associated with this mint".into());
            }
            if checked {
                let mint_key = ix.key(1)?;
                let mint = mint_state(accounts.get(&mint_key))?;
                if mint_key != source.mint {
                    return Err("mint mismatch".into());
                }
                if data.get(9) != Some(&mint.decimals) {
                    return Err("decimals mismatch".into());
                }
            }
            if source.amount < amount {
                return Err("insufficient funds".into());
            }
            source.amount -= amount;
            if source_key == dest_key {
                source.amount += amount;
                set_data(accounts, &source_key, source.pack().to_vec());
                return Ok(());
            }
            dest.amount += amount;
            set_data(accounts, &source_key, source.pack().to_vec());
            set_data(accounts, &dest_key, dest.pack().to_vec());
            Ok(())
        }
        other => Err(format!("unsupported token instruction {other}")),
    }
}

fn process_associated(
    accounts: &mut Accounts,
    ix: &IxAccounts<'_>,
    data: &[u8],
) -> Result<(), String> {
    let idempotent = match data.first() {
        None | Some(0) => false,
        Some(1) => true,
        Some(other) => return Err(format!("unsupported instruction {other}")),
    };
    let payer = ix.signer(0)?;
    ix.writable(0)?;
    let ata = ix.writable(1)?;
    let wallet = ix.key(2)?;
    let mint_key = ix.key(3)?;
    if ix.key(4)? != SYSTEM_PROGRAM_ID || ix.key(5)? != TOKEN_PROGRAM_ID {
        return Err("incorrect program id".into());
    }
    let expected = get_associated_token_address(&wallet, &mint_key).map_err(|e| e.to_string())?;
    if expected != ata {
        return Err("Provided seeds do not result in a valid address".into());
    }
    mint_state(accounts.get(&mint_key))?;

    if let Some(existing) = accounts.get(&ata) {
        let existing = token_state(existing)?;
        if idempotent && existing.owner == wallet && existing.mint == mint_key {
            return Ok(());
        }
        return Err(format!("account {ata} already in use"));
    }

    let lamports = rent_exempt(TOKEN_ACCOUNT_LEN as u64);
    debit(accounts, &payer, lamports)?;
    let token = TokenAccount {
        mint: mint_key,
        owner: wallet,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    };
    accounts.insert(
        ata,
        MockAccount {
            lamports,
            owner: TOKEN_PROGRAM_ID,
            data: token.pack().to_vec(),
        },
    );
    Ok(())
}

fn set_data(accounts: &mut Accounts, key: &Pubkey, data: Vec<u8>) {
    if let Some(account) = accounts.get_mut(key) {
        account.data = data;
    }
}
