//! Transaction Retry Submitter.
//!
//! Signs a transaction against a fresh confirmation reference, sends it and waits
//! for "confirmed". The only condition that leads to a resubmission is proof that
//! the previous attempt can no longer land: its blockhash expired (block height
//! passed `last_valid_block_height`) while the signature was still unseen.
//! Everything else is terminal, so a side-effecting instruction is never executed twice.

use std::fmt;
use std::sync::Arc;

use solana_program::{instruction::Instruction, pubkey::Pubkey};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, packet::PACKET_DATA_SIZE,
    signature::Signature, signer::keypair::Keypair, transaction::Transaction,
};
use std::time::Duration;

use crate::errors::{LedgerError, SubmitError};
use crate::infra::config::SubmitSettings;
use crate::infra::solana::{BlockhashProvider, ConfirmationReference, Ledger, TransactionStatus};

/// An assembled transaction whose blockhash slot is refilled on every attempt.
#[derive(Debug, Clone)]
pub struct TransactionTemplate {
    transaction: Transaction,
}

impl TransactionTemplate {
    pub fn new(instructions: &[Instruction], fee_payer: &Pubkey) -> Self {
        Self {
            transaction: Transaction::new_with_payer(instructions, Some(fee_payer)),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Replaces the blockhash and re-signs. Returns the fee payer's signature,
    /// which identifies the attempt on the network.
    pub fn attach(
        &mut self,
        reference: &ConfirmationReference,
        signers: &[&Keypair],
    ) -> Result<Signature, SubmitError> {
        self.transaction
            .try_sign(signers, reference.blockhash)
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(self.transaction.signatures[0])
    }

    /// Serialized size; the signature slots are present (zeroed) before signing.
    pub fn wire_size(&self) -> u64 {
        // Serializing a Transaction into a size counter cannot fail.
        bincode::serialized_size(&self.transaction).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Consecutive failed status/height polls before giving up as `ConfirmationUnknown`.
    pub max_poll_errors: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        SubmitterConfig::from(&SubmitSettings::default())
    }
}

impl From<&SubmitSettings> for SubmitterConfig {
    fn from(settings: &SubmitSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            poll_interval: settings.poll_interval,
            max_poll_errors: settings.max_poll_errors.max(1),
        }
    }
}

/// Why an attempt ended without a terminal outcome.
#[derive(Debug, Clone)]
enum RetryCause {
    ReferenceExpired {
        blockhash: Hash,
        signature: Signature,
    },
    /// The network handed back a blockhash already known to be expired.
    StaleReference(Hash),
    /// The reference could not be fetched; nothing was sent.
    Transport(String),
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCause::ReferenceExpired { blockhash, signature } => {
                write!(f, "blockhash {} expired before {} landed", blockhash, signature)
            }
            RetryCause::StaleReference(blockhash) => {
                write!(f, "network returned expired blockhash {}", blockhash)
            }
            RetryCause::Transport(message) => write!(f, "could not fetch blockhash: {}", message),
        }
    }
}

#[derive(Debug)]
enum SubmissionState {
    Fetching,
    Submitting(ConfirmationReference),
    Confirming {
        reference: ConfirmationReference,
        signature: Signature,
    },
    ExpiredRetry(RetryCause),
    Success(Signature),
    Failed(SubmitError),
}

/// Outcome of one status/height poll while confirming.
enum Poll {
    Done(SubmissionState),
    Waiting,
    Error(LedgerError),
}

pub struct TransactionSubmitter {
    ledger: Arc<dyn Ledger>,
    blockhash: BlockhashProvider,
    config: SubmitterConfig,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn Ledger>, config: SubmitterConfig) -> Self {
        Self {
            blockhash: BlockhashProvider::new(ledger.clone()),
            ledger,
            config,
        }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// Submits `template` signed by `signers` (fee payer first) until confirmed,
    /// rejected, or `max_attempts` references have expired.
    pub async fn submit(
        &self,
        template: &mut TransactionTemplate,
        signers: &[&Keypair],
    ) -> Result<Signature, SubmitError> {
        let size = template.wire_size();
        if size > PACKET_DATA_SIZE as u64 {
            return Err(SubmitError::Oversized {
                size,
                limit: PACKET_DATA_SIZE,
            });
        }

        let mut attempt: u32 = 1;
        let mut expired: Vec<Hash> = Vec::new();
        let mut last_signature: Option<Signature> = None;
        let mut state = SubmissionState::Fetching;

        loop {
            state = match state {
                SubmissionState::Fetching => match self.blockhash.fetch().await {
                    Ok(reference) if expired.contains(&reference.blockhash) => {
                        SubmissionState::ExpiredRetry(RetryCause::StaleReference(reference.blockhash))
                    }
                    Ok(reference) => SubmissionState::Submitting(reference),
                    Err(e) => SubmissionState::ExpiredRetry(RetryCause::Transport(e.to_string())),
                },
                SubmissionState::Submitting(reference) => {
                    self.send_attempt(template, signers, reference, attempt).await
                }
                SubmissionState::Confirming { reference, signature } => {
                    last_signature = Some(signature);
                    self.confirm(&reference, signature).await
                }
                SubmissionState::ExpiredRetry(cause) => {
                    if let RetryCause::ReferenceExpired { blockhash, signature } = &cause {
                        expired.push(*blockhash);
                        last_signature = Some(*signature);
                    }
                    if attempt >= self.config.max_attempts {
                        tracing::error!(attempt, %cause, "giving up on transaction");
                        SubmissionState::Failed(match &cause {
                            RetryCause::Transport(_) => SubmitError::Network {
                                message: cause.to_string(),
                                signature: last_signature,
                            },
                            _ => SubmitError::RetryExhausted {
                                attempts: attempt,
                                last_failure: cause.to_string(),
                                last_signature,
                            },
                        })
                    } else {
                        tracing::warn!(attempt, %cause, "attempt did not land, retrying with a fresh blockhash");
                        // An expired reference already waited out its validity window.
                        if !matches!(cause, RetryCause::ReferenceExpired { .. }) {
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                        attempt += 1;
                        SubmissionState::Fetching
                    }
                }
                SubmissionState::Success(signature) => {
                    tracing::info!(%signature, attempt, "transaction confirmed");
                    return Ok(signature);
                }
                SubmissionState::Failed(err) => {
                    if let Some(signature) = err.signature() {
                        tracing::error!(%signature, error = %err, "transaction failed");
                    } else {
                        tracing::error!(error = %err, "transaction failed");
                    }
                    return Err(err);
                }
            };
        }
    }

    async fn send_attempt(
        &self,
        template: &mut TransactionTemplate,
        signers: &[&Keypair],
        reference: ConfirmationReference,
        attempt: u32,
    ) -> SubmissionState {
        let signature = match template.attach(&reference, signers) {
            Ok(signature) => signature,
            Err(e) => return SubmissionState::Failed(e),
        };
        tracing::info!(
            attempt,
            %signature,
            blockhash = %reference.blockhash,
            last_valid_block_height = reference.last_valid_block_height,
            "sending transaction"
        );

        match self.ledger.send_transaction(template.transaction()).await {
            Ok(sent) => SubmissionState::Confirming {
                reference,
                signature: sent,
            },
            Err(LedgerError::BlockhashNotFound) => {
                SubmissionState::ExpiredRetry(RetryCause::ReferenceExpired {
                    blockhash: reference.blockhash,
                    signature,
                })
            }
            Err(LedgerError::Rejected { reason }) => {
                SubmissionState::Failed(SubmitError::ProgramRejection {
                    reason,
                    signature: Some(signature),
                })
            }
            Err(LedgerError::Signing(message)) => SubmissionState::Failed(SubmitError::Signing(message)),
            Err(LedgerError::Network(message)) => {
                // The transaction may still have reached a leader. Watch its signature
                // until it lands or its blockhash expires instead of sending a new one.
                tracing::warn!(%signature, error = %message, "send failed at transport level, watching signature");
                SubmissionState::Confirming {
                    reference,
                    signature,
                }
            }
        }
    }

    async fn confirm(&self, reference: &ConfirmationReference, signature: Signature) -> SubmissionState {
        let mut poll_errors: u32 = 0;
        loop {
            match self.poll(reference, signature).await {
                Poll::Done(state) => return state,
                Poll::Waiting => poll_errors = 0,
                Poll::Error(e) => {
                    poll_errors += 1;
                    tracing::debug!(%signature, poll_errors, error = %e, "confirmation poll failed");
                    if poll_errors >= self.config.max_poll_errors {
                        return SubmissionState::Failed(SubmitError::ConfirmationUnknown {
                            signature,
                            message: e.to_string(),
                        });
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn poll(&self, reference: &ConfirmationReference, signature: Signature) -> Poll {
        let commitment = CommitmentConfig::confirmed();
        match self.ledger.signature_status(&signature, commitment).await {
            Ok(TransactionStatus::Confirmed) => return Poll::Done(SubmissionState::Success(signature)),
            Ok(TransactionStatus::Failed(reason)) => {
                return Poll::Done(SubmissionState::Failed(SubmitError::ProgramRejection {
                    reason,
                    signature: Some(signature),
                }))
            }
            // Included somewhere; expiry no longer decides anything.
            Ok(TransactionStatus::Processed) => return Poll::Waiting,
            Ok(TransactionStatus::NotFound) => {}
            Err(e) => return Poll::Error(e),
        }

        let height = match self.ledger.block_height(commitment).await {
            Ok(height) => height,
            Err(e) => return Poll::Error(e),
        };
        if !reference.is_expired_at(height) {
            return Poll::Waiting;
        }

        // Expired: the signature may have landed between the two reads.
        match self.ledger.signature_status(&signature, commitment).await {
            Ok(TransactionStatus::NotFound) => {
                Poll::Done(SubmissionState::ExpiredRetry(RetryCause::ReferenceExpired {
                    blockhash: reference.blockhash,
                    signature,
                }))
            }
            Ok(TransactionStatus::Processed) => Poll::Waiting,
            Ok(TransactionStatus::Confirmed) => Poll::Done(SubmissionState::Success(signature)),
            Ok(TransactionStatus::Failed(reason)) => {
                Poll::Done(SubmissionState::Failed(SubmitError::ProgramRejection {
                    reason,
                    signature: Some(signature),
                }))
            }
            Err(e) => Poll::Error(e),
        }
    }
}
