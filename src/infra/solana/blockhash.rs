//! Blockhash provider: fetches the confirmation reference a transaction is signed against.

use std::sync::Arc;

use solana_sdk::{commitment_config::CommitmentConfig, hash::Hash};

use crate::errors::LedgerError;
use crate::infra::solana::client::Ledger;

/// A recent blockhash and the last block height at which transactions using it are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationReference {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl ConfirmationReference {
    /// True once the network's block height has passed the validity window.
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

#[derive(Clone)]
pub struct BlockhashProvider {
    ledger: Arc<dyn Ledger>,
}

impl BlockhashProvider {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Fetches a fresh reference at `finalized`, so the blockhash cannot be orphaned.
    pub async fn fetch(&self) -> Result<ConfirmationReference, LedgerError> {
        let (blockhash, last_valid_block_height) = self
            .ledger
            .latest_blockhash(CommitmentConfig::finalized())
            .await?;
        tracing::debug!(%blockhash, last_valid_block_height, "fetched confirmation reference");
        Ok(ConfirmationReference {
            blockhash,
            last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strictly_after_last_valid_height() {
        let reference = ConfirmationReference {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 100,
        };
        assert!(!reference.is_expired_at(99));
        assert!(!reference.is_expired_at(100));
        assert!(reference.is_expired_at(101));
    }
}
