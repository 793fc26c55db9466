//! Typed façade over the node's JSON-RPC methods.
//!
//! Every method is one blocking round trip. The client keeps no state
//! besides the transport and the commitment level, so sharing it across
//! threads is as safe as sharing its transport.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sol_tx::token::{Mint, TOKEN_PROGRAM_ID};
use sol_tx::{Hash, Pubkey, Signature, Transaction};
use tracing::{debug, info, warn};

use crate::error::RpcError;
use crate::transport::{HttpTransport, RpcTransport};
use crate::types::{
    Account, Commitment, RecentBlockhash, RpcAccount, RpcBlockhash, RpcKeyedAccount,
    RpcResponse, RpcSignatureStatus, RpcTokenAccountInfo, SignatureStatus, TokenAccountEntry,
    TokenAmount,
};

/// Default per-request timeout for [`RpcClient::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC code the node uses for bad parameters, including lookups of
/// accounts that do not exist.
const INVALID_PARAMS: i64 = -32602;

/// Chain reader bound to one endpoint and one commitment level.
pub struct RpcClient<T = HttpTransport> {
    transport: T,
    commitment: Commitment,
}

impl RpcClient<HttpTransport> {
    /// Connect to `url` over HTTP(S).
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Result<Self, RpcError> {
        Self::new_with_timeout(url, commitment, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn new_with_timeout(
        url: impl Into<String>,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        Ok(Self::with_transport(
            HttpTransport::new(url, timeout)?,
            commitment,
        ))
    }
}

impl<T: RpcTransport> RpcClient<T> {
    pub fn with_transport(transport: T, commitment: Commitment) -> Self {
        Self {
            transport,
            commitment,
        }
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, RpcError> {
        let result = self.transport.send(method, params)?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment })
    }

    // -- Balances -----------------------------------------------------------

    /// Lamport balance. Addresses the ledger has never seen report 0.
    pub fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, RpcError> {
        let response: RpcResponse<u64> = self.call(
            "getBalance",
            json!([pubkey.to_string(), self.commitment_config()]),
        )?;
        Ok(response.value)
    }

    /// Ask the test-network faucet for `lamports`. Returns the faucet
    /// transaction's signature.
    pub fn request_airdrop_signature(
        &self,
        pubkey: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, RpcError> {
        let signature: String = self.call(
            "requestAirdrop",
            json!([pubkey.to_string(), lamports, self.commitment_config()]),
        )?;
        parse_signature(&signature)
    }

    /// Faucet request that reports only whether the node accepted it.
    pub fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> bool {
        match self.request_airdrop_signature(pubkey, lamports) {
            Ok(signature) => {
                info!(%pubkey, lamports, %signature, "airdrop requested");
                true
            }
            Err(e) => {
                warn!(%pubkey, lamports, error = %e, "airdrop rejected");
                false
            }
        }
    }

    // -- Blocks -------------------------------------------------------------

    pub fn get_recent_blockhash(&self) -> Result<RecentBlockhash, RpcError> {
        let response: RpcResponse<RpcBlockhash> =
            self.call("getLatestBlockhash", json!([self.commitment_config()]))?;
        let blockhash: Hash = response
            .value
            .blockhash
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {e}")))?;
        debug!(%blockhash, last_valid = response.value.last_valid_block_height, "fetched blockhash");
        Ok(RecentBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    pub fn get_block_height(&self) -> Result<u64, RpcError> {
        self.call("getBlockHeight", json!([self.commitment_config()]))
    }

    pub fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcError> {
        self.call(
            "getMinimumBalanceForRentExemption",
            json!([data_len, self.commitment_config()]),
        )
    }

    // -- Accounts -----------------------------------------------------------

    /// The whole account, or `None` if it does not exist.
    pub fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcError> {
        let config = json!({
            "encoding": "base64",
            "commitment": self.commitment
        });
        self.fetch_account(pubkey, config)
    }

    /// `length` bytes of account data starting at `offset`. Missing
    /// accounts read as empty.
    pub fn get_account_data(
        &self,
        pubkey: &Pubkey,
        offset: usize,
        length: usize,
    ) -> Result<Vec<u8>, RpcError> {
        let config = json!({
            "encoding": "base64",
            "commitment": self.commitment,
            "dataSlice": { "offset": offset, "length": length }
        });
        Ok(self
            .fetch_account(pubkey, config)?
            .map(|account| account.data)
            .unwrap_or_default())
    }

    fn fetch_account(&self, pubkey: &Pubkey, config: Value) -> Result<Option<Account>, RpcError> {
        let response: RpcResponse<Option<RpcAccount>> =
            self.call("getAccountInfo", json!([pubkey.to_string(), config]))?;

        let Some(raw) = response.value else {
            return Ok(None);
        };
        let (payload, encoding) = raw.data;
        if encoding != "base64" {
            return Err(RpcError::InvalidResponse(format!(
                "expected base64 account data, got {encoding}"
            )));
        }
        let data = BASE64
            .decode(payload)
            .map_err(|e| RpcError::InvalidResponse(format!("account data: {e}")))?;
        let owner: Pubkey = raw
            .owner
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("account owner: {e}")))?;

        Ok(Some(Account {
            lamports: raw.lamports,
            owner,
            data,
            executable: raw.executable,
            rent_epoch: raw.rent_epoch,
        }))
    }

    /// Fetch and decode a token mint.
    pub fn get_mint_info(&self, mint: &Pubkey) -> Result<Mint, RpcError> {
        let account = self
            .get_account(mint)?
            .ok_or_else(|| RpcError::AccountNotFound(mint.to_string()))?;
        Ok(Mint::unpack(&account.data)?)
    }

    // -- Tokens -------------------------------------------------------------

    pub fn get_token_account_balance(&self, account: &Pubkey) -> Result<TokenAmount, RpcError> {
        let result: Result<RpcResponse<TokenAmount>, RpcError> = self.call(
            "getTokenAccountBalance",
            json!([account.to_string(), self.commitment_config()]),
        );
        match result {
            Ok(response) => Ok(response.value),
            Err(RpcError::Node { code, message })
                if code == INVALID_PARAMS && message.contains("could not find account") =>
            {
                Err(RpcError::AccountNotFound(account.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Every token account owned by `owner` under the token program.
    pub fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<TokenAccountEntry>, RpcError> {
        let response: RpcResponse<Vec<RpcKeyedAccount>> = self.call(
            "getTokenAccountsByOwner",
            json!([
                owner.to_string(),
                { "programId": TOKEN_PROGRAM_ID.to_string() },
                { "encoding": "jsonParsed", "commitment": self.commitment }
            ]),
        )?;

        let mut entries = Vec::with_capacity(response.value.len());
        for keyed in response.value {
            let Some(info) = keyed.account.data.pointer("/parsed/info") else {
                warn!(account = %keyed.pubkey, "unexpected token account data format");
                continue;
            };
            let info: RpcTokenAccountInfo = serde_json::from_value(info.clone())?;
            entries.push(TokenAccountEntry {
                address: parse_pubkey(&keyed.pubkey)?,
                mint: parse_pubkey(&info.mint)?,
                balance: info.token_amount.ui_amount_string,
                owner: parse_pubkey(&info.owner)?,
            });
        }
        Ok(entries)
    }

    // -- Transactions -------------------------------------------------------

    /// Submit wire bytes. Returns once the node has accepted them for
    /// processing, not when they land.
    pub fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let wire = transaction.serialize()?;
        let signature: String = self.call(
            "sendTransaction",
            json!([
                BASE64.encode(&wire),
                {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": self.commitment
                }
            ]),
        )?;
        let signature = parse_signature(&signature)?;
        info!(%signature, bytes = wire.len(), "transaction submitted");
        Ok(signature)
    }

    pub fn get_signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError> {
        let response: RpcResponse<Vec<Option<RpcSignatureStatus>>> = self.call(
            "getSignatureStatuses",
            json!([[signature.to_string()], { "searchTransactionHistory": true }]),
        )?;
        let status = response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(RpcSignatureStatus::into_status)
            .unwrap_or(SignatureStatus::Pending);
        debug!(%signature, ?status, "signature status");
        Ok(status)
    }
}

fn parse_pubkey(s: &str) -> Result<Pubkey, RpcError> {
    s.parse()
        .map_err(|e| RpcError::InvalidResponse(format!("pubkey {s}: {e}")))
}

fn parse_signature(s: &str) -> Result<Signature, RpcError> {
    s.parse()
        .map_err(|e| RpcError::InvalidResponse(format!("signature {s}: {e}")))
}
