// Responsible for all communication with the Solana blockchain.

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_program::pubkey::Pubkey;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    signature::Signature,
    signer::keypair::{read_keypair_file, Keypair},
    transaction::{Transaction, TransactionError},
};

use crate::errors::LedgerError;

/// Where a sent transaction stands at a given consistency level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    NotFound,
    /// Included in a block, but not yet at the requested commitment.
    Processed,
    Confirmed,
    /// Included, but execution failed.
    Failed(String),
}

/// The ledger RPC surface the submitter and workflow depend on.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns the latest blockhash and the last block height at which it is valid.
    async fn latest_blockhash(&self, commitment: CommitmentConfig)
        -> Result<(Hash, u64), LedgerError>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError>;

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<TransactionStatus, LedgerError>;

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, LedgerError>;

    async fn minimum_balance_for_rent_exemption(&self, len: usize) -> Result<u64, LedgerError>;

    /// Raw account data, `None` if the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;
}

/// `Ledger` backed by the nonblocking Solana RPC client.
pub struct RpcLedger {
    client: RpcClient,
    skip_preflight: bool,
}

impl RpcLedger {
    pub fn new(rpc_url: String, skip_preflight: bool) -> Self {
        let client = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());
        Self {
            client,
            skip_preflight,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

/// Maps a client error onto the retry-relevant categories.
pub fn classify_client_error(err: &ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(TransactionError::BlockhashNotFound) => LedgerError::BlockhashNotFound,
        Some(tx_err) => LedgerError::Rejected {
            reason: tx_err.to_string(),
        },
        None => match err.kind() {
            ClientErrorKind::SigningError(e) => LedgerError::Signing(e.to_string()),
            _ => LedgerError::Network(err.to_string()),
        },
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), LedgerError> {
        self.client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            // Resubmission is owned by the submitter, not the node.
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<TransactionStatus, LedgerError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| classify_client_error(&e))?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(TransactionStatus::NotFound),
        };
        if !status.satisfies_commitment(commitment) {
            return Ok(TransactionStatus::Processed);
        }
        match status.err {
            Some(err) => Ok(TransactionStatus::Failed(err.to_string())),
            None => Ok(TransactionStatus::Confirmed),
        }
    }

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, LedgerError> {
        self.client
            .get_block_height_with_commitment(commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn minimum_balance_for_rent_exemption(&self, len: usize) -> Result<u64, LedgerError> {
        self.client
            .get_minimum_balance_for_rent_exemption(len)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| classify_client_error(&e))?;
        Ok(response.value.map(|account| account.data))
    }
}

/// Reads a JSON key-pair file as written by `solana-keygen`.
pub fn load_keypair(path: &str) -> anyhow::Result<Keypair> {
    read_keypair_file(path).map_err(|e| anyhow::anyhow!("Failed to read keypair file {}: {}", path, e))
}
