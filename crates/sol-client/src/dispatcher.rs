//! Compile → sign → submit → confirm.
//!
//! Each step has its own type so a caller can stop anywhere in the
//! pipeline: [`CompiledMessage`] carries the blockhash's validity window,
//! [`SignedTransaction`] is ready for the wire, and [`SubmissionHandle`] is
//! what the node accepted. Nothing is resubmitted automatically; after
//! [`ConfirmationOutcome::Expired`] the caller recompiles.

use std::time::Duration;

use sol_rpc::{RpcClient, RpcTransport, SignatureStatus};
use sol_tx::{
    system_program, AccountMeta, Hash, Instruction, Keypair, Message, Pubkey, Signature,
    Transaction, TxError,
};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::ClientError;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A message compiled against a recent blockhash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMessage {
    pub message: Message,
    /// Last block height at which the blockhash is accepted.
    pub last_valid_block_height: u64,
}

impl CompiledMessage {
    /// Sign with every signer the message requires.
    pub fn sign(self, signers: &[&Keypair]) -> Result<SignedTransaction, TxError> {
        Ok(SignedTransaction {
            transaction: Transaction::sign(self.message, signers)?,
            last_valid_block_height: self.last_valid_block_height,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub last_valid_block_height: u64,
}

/// A transaction the node has accepted for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub signature: Signature,
    pub last_valid_block_height: u64,
}

/// Terminal result of [`Dispatcher::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Reached the client's commitment level.
    Confirmed { slot: u64 },
    /// Executed and rejected by the ledger.
    Failed { reason: String },
    /// Still unknown after its blockhash stopped being valid. It will not
    /// land; recompile with a fresh blockhash.
    Expired,
    /// The deadline passed first. The outcome is unknown.
    TimedOut,
}

/// Drives transactions through a [`RpcClient`].
pub struct Dispatcher<T, C = SystemClock> {
    rpc: RpcClient<T>,
    clock: C,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl<T: RpcTransport, C: Clock> Dispatcher<T, C> {
    pub fn new(rpc: RpcClient<T>, clock: C) -> Self {
        Self {
            rpc,
            clock,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn rpc(&self) -> &RpcClient<T> {
        &self.rpc
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Compile `instructions` with `fee_payer` at index 0 against a fresh
    /// blockhash. Layout errors surface before the node is queried.
    pub fn compile(
        &self,
        fee_payer: &Pubkey,
        instructions: &[Instruction],
    ) -> Result<CompiledMessage, ClientError> {
        let message = Message::compile(fee_payer, instructions, Hash::default())?;
        self.attach_blockhash(message)
    }

    fn attach_blockhash(&self, mut message: Message) -> Result<CompiledMessage, ClientError> {
        let recent = self.rpc.get_recent_blockhash()?;
        message.recent_blockhash = recent.blockhash;
        debug!(
            fee_payer = ?message.fee_payer(),
            accounts = message.account_keys.len(),
            instructions = message.instructions.len(),
            "compiled message"
        );
        Ok(CompiledMessage {
            message,
            last_valid_block_height: recent.last_valid_block_height,
        })
    }

    /// Hand the wire bytes to the node. Returns as soon as the node accepts
    /// them; use [`confirm`](Self::confirm) to learn whether they landed.
    pub fn submit(&self, signed: &SignedTransaction) -> Result<SubmissionHandle, ClientError> {
        let signature = self.rpc.send_transaction(&signed.transaction)?;
        Ok(SubmissionHandle {
            signature,
            last_valid_block_height: signed.last_valid_block_height,
        })
    }

    /// Poll the node until the transaction reaches the client's commitment
    /// level, fails, expires or `timeout` passes.
    ///
    /// Only a signature the node has never seen can expire. Once it has
    /// landed below the commitment level, polling continues until the level
    /// is reached or the deadline passes. A `timeout` too large to add to
    /// the clock means no deadline.
    pub fn confirm(
        &self,
        handle: &SubmissionHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ConfirmationOutcome, ClientError> {
        let commitment = self.rpc.commitment();
        let deadline = self.clock.now().checked_add(timeout);

        loop {
            let status = self.rpc.get_signature_status(&handle.signature)?;
            if let Some(outcome) = self.resolve(handle, status.clone()) {
                return Ok(outcome);
            }

            if status == SignatureStatus::Pending {
                let height = self.rpc.get_block_height()?;
                if height > handle.last_valid_block_height {
                    // It may have landed between the two queries.
                    let status = self.rpc.get_signature_status(&handle.signature)?;
                    if let Some(outcome) = self.resolve(handle, status.clone()) {
                        return Ok(outcome);
                    }
                    if status == SignatureStatus::Pending {
                        warn!(signature = %handle.signature, height, "blockhash expired");
                        return Ok(ConfirmationOutcome::Expired);
                    }
                }
            }

            let now = self.clock.now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    warn!(signature = %handle.signature, %commitment, "confirmation timed out");
                    return Ok(ConfirmationOutcome::TimedOut);
                }
                Some(deadline) => poll_interval.min(deadline - now),
                None => poll_interval,
            };
            self.clock.sleep(wait);
        }
    }

    fn resolve(
        &self,
        handle: &SubmissionHandle,
        status: SignatureStatus,
    ) -> Option<ConfirmationOutcome> {
        if let SignatureStatus::Failed { reason, .. } = status {
            return Some(ConfirmationOutcome::Failed { reason });
        }
        match status.slot() {
            Some(slot) if status.satisfies(self.rpc.commitment()) => {
                info!(signature = %handle.signature, slot, "transaction confirmed");
                Some(ConfirmationOutcome::Confirmed { slot })
            }
            _ => None,
        }
    }

    /// Compile, sign, submit and confirm with the dispatcher's timing.
    pub fn send_and_confirm(
        &self,
        fee_payer: &Pubkey,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<Signature, ClientError> {
        let message = Message::compile(fee_payer, instructions, Hash::default())?;
        ensure_signers(&message, signers)?;
        let signed = self.attach_blockhash(message)?.sign(signers)?;
        let handle = self.submit(&signed)?;
        let signature = handle.signature;

        match self.confirm(&handle, self.confirm_timeout, self.poll_interval)? {
            ConfirmationOutcome::Confirmed { .. } => Ok(signature),
            ConfirmationOutcome::Failed { reason } => {
                Err(ClientError::TransactionFailed { signature, reason })
            }
            ConfirmationOutcome::Expired => Err(ClientError::BlockhashExpired { signature }),
            ConfirmationOutcome::TimedOut => Err(ClientError::TimedOut { signature }),
        }
    }

    /// Invoke `program_id` with caller-built accounts and data. The first
    /// signer pays the fee.
    pub fn send_generic(
        &self,
        program_id: &Pubkey,
        accounts: Vec<AccountMeta>,
        data: &[u8],
        signers: &[&Keypair],
    ) -> Result<Signature, ClientError> {
        let fee_payer = signers.first().ok_or_else(|| {
            TxError::TransactionBuildError("at least one signer is required".into())
        })?;
        let instruction = Instruction::new_with_bytes(*program_id, data, accounts);
        self.send_and_confirm(&fee_payer.pubkey(), &[instruction], signers)
    }

    /// Native transfer paid by `from`. Fails before building anything if
    /// the balance cannot cover `lamports`.
    pub fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, ClientError> {
        let from_pubkey = from.pubkey();
        let balance = self.rpc.get_balance(&from_pubkey)?;
        if balance < lamports {
            return Err(ClientError::InsufficientFunds {
                balance,
                required: lamports,
            });
        }

        let ix = system_program::transfer(&from_pubkey, to, lamports);
        let signature = self.send_and_confirm(&from_pubkey, &[ix], &[from])?;
        info!(from = %from_pubkey, %to, lamports, %signature, "native transfer confirmed");
        Ok(signature)
    }
}

/// Every signer `message` requires must be among `signers`.
fn ensure_signers(message: &Message, signers: &[&Keypair]) -> Result<(), TxError> {
    match message
        .signer_keys()
        .iter()
        .find(|required| !signers.iter().any(|kp| kp.pubkey() == **required))
    {
        Some(missing) => Err(TxError::MissingSigner(missing.to_string())),
        None => Ok(()),
    }
}
