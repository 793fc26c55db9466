//! Token program flows: mints, associated accounts, minting and transfers.
//!
//! Each flow builds its instructions with `sol_tx::token` and runs them
//! through the [`Dispatcher`], so every call returns only after the
//! transaction is confirmed at the client's commitment level.

use sol_rpc::{RpcError, RpcTransport, TokenAccountEntry};
use sol_tx::token::{self as token_ix, Mint, TokenAccount, MINT_LEN, TOKEN_PROGRAM_ID};
use sol_tx::{system_program, Keypair, Pubkey, Signature};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;

pub struct TokenClient<'a, T, C = SystemClock> {
    dispatcher: &'a Dispatcher<T, C>,
}

impl<'a, T: RpcTransport, C: Clock> TokenClient<'a, T, C> {
    pub fn new(dispatcher: &'a Dispatcher<T, C>) -> Self {
        Self { dispatcher }
    }

    // -- Mints --------------------------------------------------------------

    /// Create and initialize a new mint with a freshly generated address.
    pub fn create_mint(
        &self,
        payer: &Keypair,
        mint_authority: &Pubkey,
        freeze_authority: Option<&Pubkey>,
        decimals: u8,
    ) -> Result<Pubkey, ClientError> {
        let mint = Keypair::generate();
        self.create_mint_with_keypair(payer, &mint, mint_authority, freeze_authority, decimals)?;
        Ok(mint.pubkey())
    }

    /// Allocate a rent-exempt 82-byte account at `mint`'s address, assign it
    /// to the token program and initialize it, in one transaction signed by
    /// `payer` and `mint`.
    pub fn create_mint_with_keypair(
        &self,
        payer: &Keypair,
        mint: &Keypair,
        mint_authority: &Pubkey,
        freeze_authority: Option<&Pubkey>,
        decimals: u8,
    ) -> Result<Signature, ClientError> {
        let rpc = self.dispatcher.rpc();
        let lamports = rpc.get_minimum_balance_for_rent_exemption(MINT_LEN)?;
        let mint_pubkey = mint.pubkey();

        let instructions = [
            system_program::create_account(
                &payer.pubkey(),
                &mint_pubkey,
                lamports,
                MINT_LEN as u64,
                &TOKEN_PROGRAM_ID,
            ),
            token_ix::initialize_mint(&mint_pubkey, mint_authority, freeze_authority, decimals),
        ];
        let signature =
            self.dispatcher
                .send_and_confirm(&payer.pubkey(), &instructions, &[payer, mint])?;
        info!(mint = %mint_pubkey, decimals, %signature, "mint created");
        Ok(signature)
    }

    pub fn get_mint(&self, mint: &Pubkey) -> Result<Mint, ClientError> {
        Ok(self.dispatcher.rpc().get_mint_info(mint)?)
    }

    // -- Associated accounts ------------------------------------------------

    /// The associated token account of `owner` for `mint`, created (and
    /// paid for by `payer`) if it does not exist yet.
    pub fn get_or_create_associated_account(
        &self,
        payer: &Keypair,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Pubkey, ClientError> {
        let ata = token_ix::get_associated_token_address(owner, mint)?;
        if self.dispatcher.rpc().get_account(&ata)?.is_some() {
            debug!(%ata, %owner, %mint, "associated account exists");
            return Ok(ata);
        }

        // Idempotent: another party may create it before this lands.
        let ix =
            token_ix::create_associated_token_account_idempotent(&payer.pubkey(), owner, mint)?;
        let signature = self
            .dispatcher
            .send_and_confirm(&payer.pubkey(), &[ix], &[payer])?;
        info!(%ata, %owner, %mint, %signature, "associated account created");
        Ok(ata)
    }

    /// Decoded state of a token account, or `None` if it does not exist.
    pub fn get_token_account(&self, address: &Pubkey) -> Result<Option<TokenAccount>, ClientError> {
        self.dispatcher
            .rpc()
            .get_account(address)?
            .map(|account| TokenAccount::unpack(&account.data))
            .transpose()
            .map_err(ClientError::from)
    }

    // -- Minting and transfers ----------------------------------------------

    pub fn mint_to(
        &self,
        payer: &Keypair,
        mint_authority: &Keypair,
        mint: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<Signature, ClientError> {
        let ix = token_ix::mint_to(mint, destination, &mint_authority.pubkey(), amount)?;
        let signature =
            self.dispatcher
                .send_and_confirm(&payer.pubkey(), &[ix], &[payer, mint_authority])?;
        info!(%mint, %destination, amount, %signature, "minted");
        Ok(signature)
    }

    /// Move `amount` base units between two token accounts of the same mint.
    pub fn transfer(
        &self,
        payer: &Keypair,
        owner: &Keypair,
        source: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<Signature, ClientError> {
        let ix = token_ix::transfer(source, destination, &owner.pubkey(), amount)?;
        let signature = self
            .dispatcher
            .send_and_confirm(&payer.pubkey(), &[ix], &[payer, owner])?;
        info!(%source, %destination, amount, %signature, "token transfer confirmed");
        Ok(signature)
    }

    /// [`transfer`](Self::transfer) that the token program rejects unless
    /// `mint` and `decimals` match the accounts.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer_checked(
        &self,
        payer: &Keypair,
        owner: &Keypair,
        source: &Pubkey,
        mint: &Pubkey,
        destination: &Pubkey,
        amount: u64,
        decimals: u8,
    ) -> Result<Signature, ClientError> {
        let ix = token_ix::transfer_checked(
            source,
            mint,
            destination,
            &owner.pubkey(),
            amount,
            decimals,
        )?;
        let signature = self
            .dispatcher
            .send_and_confirm(&payer.pubkey(), &[ix], &[payer, owner])?;
        info!(%source, %destination, %mint, amount, %signature, "checked token transfer confirmed");
        Ok(signature)
    }

    /// Transfer from `owner`'s associated account to `recipient`'s,
    /// creating the recipient's account first if needed.
    pub fn transfer_to_wallet(
        &self,
        payer: &Keypair,
        owner: &Keypair,
        recipient: &Pubkey,
        mint: &Pubkey,
        amount: u64,
    ) -> Result<Signature, ClientError> {
        let destination = self.get_or_create_associated_account(payer, recipient, mint)?;
        let source = token_ix::get_associated_token_address(&owner.pubkey(), mint)?;
        self.transfer(payer, owner, &source, &destination, amount)
    }

    // -- Balances -----------------------------------------------------------

    /// Base-unit balance of `owner`'s associated account for `mint`. An
    /// account that does not exist yet holds 0.
    pub fn get_associated_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ClientError> {
        let ata = token_ix::get_associated_token_address(owner, mint)?;
        match self.dispatcher.rpc().get_token_account_balance(&ata) {
            Ok(amount) => amount.base_units().map_err(|e| {
                ClientError::Rpc(RpcError::InvalidResponse(format!(
                    "token amount '{}': {e}",
                    amount.amount
                )))
            }),
            Err(RpcError::AccountNotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Every token account `owner` holds, with human-readable balances.
    pub fn list_token_accounts(&self, owner: &Pubkey) -> Result<Vec<TokenAccountEntry>, ClientError> {
        Ok(self.dispatcher.rpc().get_token_accounts_by_owner(owner)?)
    }
}
