//! Shared fakes for the integration tests: a scripted ledger and an in-memory indexer.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_program::pubkey::Pubkey;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, signature::Signature, transaction::Transaction,
};

use compressed_nft_client::errors::{FetchError, LedgerError};
use compressed_nft_client::infra::indexer::{AssetIndex, AssetProof, AssetSnapshot};
use compressed_nft_client::infra::solana::{Ledger, TransactionStatus};

/// Blocks a fresh blockhash stays valid for.
pub const VALIDITY_WINDOW: u64 = 150;

/// What the ledger does with the next sent transaction.
#[derive(Debug, Clone)]
pub enum SendScript {
    /// Accepted and confirmed on the first status poll.
    Confirm,
    /// Accepted, never lands; block height jumps past the blockhash's validity.
    Expire,
    /// Blockhash expires, but the transaction is found on the final status check.
    ExpireButLand,
    /// Rejected at send (preflight).
    Reject(String),
    /// Accepted, lands, and fails execution.
    FailOnChain(String),
    /// The node does not recognize the blockhash.
    BlockhashNotFound,
    /// The send call fails at the transport level, yet the transaction lands.
    TransportErrorThenLand,
}

#[derive(Default)]
struct State {
    height: u64,
    scripts: VecDeque<SendScript>,
    sent: Vec<Transaction>,
    issued: HashMap<Hash, u64>,
    fetched: Vec<Hash>,
    statuses: HashMap<Signature, VecDeque<TransactionStatus>>,
    blockhash_failures: u32,
    status_failures: u32,
    repeat_blockhash: Option<(Hash, u64)>,
    accounts: HashMap<Pubkey, Vec<u8>>,
}

pub struct ScriptedLedger {
    state: Mutex<State>,
    rent: u64,
}

impl ScriptedLedger {
    pub fn new(scripts: impl IntoIterator<Item = SendScript>) -> Self {
        Self {
            state: Mutex::new(State {
                height: 1_000,
                scripts: scripts.into_iter().collect(),
                ..State::default()
            }),
            rent: 1_461_600,
        }
    }

    pub fn fail_blockhash_fetches(&self, n: u32) {
        self.state.lock().unwrap().blockhash_failures = n;
    }

    pub fn fail_status_polls(&self, n: u32) {
        self.state.lock().unwrap().status_failures = n;
    }

    /// Every blockhash request returns the first blockhash handed out.
    pub fn repeat_blockhash(&self) {
        let mut state = self.state.lock().unwrap();
        let hash = Hash::new_unique();
        let last_valid = state.height + VALIDITY_WINDOW;
        state.issued.insert(hash, last_valid);
        state.repeat_blockhash = Some((hash, last_valid));
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state.lock().unwrap().accounts.insert(address, data);
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_blockhashes(&self) -> Vec<Hash> {
        self.sent().iter().map(|tx| tx.message.recent_blockhash).collect()
    }

    pub fn fetched_blockhashes(&self) -> usize {
        self.state.lock().unwrap().fetched.len()
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn latest_blockhash(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.blockhash_failures > 0 {
            state.blockhash_failures -= 1;
            return Err(LedgerError::Network("connection refused".to_string()));
        }
        let (hash, last_valid) = match state.repeat_blockhash {
            Some(repeated) => repeated,
            None => {
                let hash = Hash::new_unique();
                let last_valid = state.height + VALIDITY_WINDOW;
                state.issued.insert(hash, last_valid);
                (hash, last_valid)
            }
        };
        state.fetched.push(hash);
        Ok((hash, last_valid))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let signature = transaction.signatures[0];
        let blockhash = transaction.message.recent_blockhash;
        let expire_height = state.issued.get(&blockhash).copied().unwrap_or(state.height) + 1;
        let script = state.scripts.pop_front().unwrap_or(SendScript::Confirm);
        state.sent.push(transaction.clone());

        match script {
            SendScript::Confirm => {
                state
                    .statuses
                    .insert(signature, VecDeque::from([TransactionStatus::Confirmed]));
                Ok(signature)
            }
            SendScript::Expire => {
                state.height = state.height.max(expire_height);
                Ok(signature)
            }
            SendScript::ExpireButLand => {
                state.height = state.height.max(expire_height);
                state.statuses.insert(
                    signature,
                    VecDeque::from([TransactionStatus::NotFound, TransactionStatus::Confirmed]),
                );
                Ok(signature)
            }
            SendScript::Reject(reason) => Err(LedgerError::Rejected { reason }),
            SendScript::FailOnChain(reason) => {
                state
                    .statuses
                    .insert(signature, VecDeque::from([TransactionStatus::Failed(reason)]));
                Ok(signature)
            }
            SendScript::BlockhashNotFound => Err(LedgerError::BlockhashNotFound),
            SendScript::TransportErrorThenLand => {
                state
                    .statuses
                    .insert(signature, VecDeque::from([TransactionStatus::Confirmed]));
                Err(LedgerError::Network("connection reset by peer".to_string()))
            }
        }
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> Result<TransactionStatus, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(LedgerError::Network("timed out".to_string()));
        }
        // The last queued status is sticky.
        let status = match state.statuses.get_mut(signature) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(status.unwrap_or(TransactionStatus::NotFound))
    }

    async fn block_height(&self, _commitment: CommitmentConfig) -> Result<u64, LedgerError> {
        Ok(self.state.lock().unwrap().height)
    }

    async fn minimum_balance_for_rent_exemption(&self, _len: usize) -> Result<u64, LedgerError> {
        Ok(self.rent)
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state.lock().unwrap().accounts.get(address).cloned())
    }
}

/// Indexer fake serving fixed JSON documents, shaped like the Read API's results.
pub struct StubIndex {
    asset: Option<Value>,
    proof: Option<Value>,
    calls: AtomicUsize,
}

impl StubIndex {
    pub fn new(asset: Value, proof: Value) -> Self {
        Self {
            asset: Some(asset),
            proof: Some(proof),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            asset: None,
            proof: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn serve<T: serde::de::DeserializeOwned>(
        &self,
        doc: &Option<Value>,
        method: &str,
        asset_id: &str,
    ) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match doc {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| FetchError::Decode(e.to_string()))
            }
            None => Err(FetchError::Absent {
                method: method.to_string(),
                id: asset_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl AssetIndex for StubIndex {
    async fn get_asset(&self, asset_id: &str) -> Result<AssetSnapshot, FetchError> {
        self.serve(&self.asset, "getAsset", asset_id)
    }

    async fn get_asset_proof(&self, asset_id: &str) -> Result<AssetProof, FetchError> {
        self.serve(&self.proof, "getAssetProof", asset_id)
    }
}

/// Base58 of a 32-byte array filled with `byte`.
pub fn hash_b58(byte: u8) -> String {
    bs58::encode([byte; 32]).into_string()
}

pub fn proof_nodes(n: usize) -> Vec<Pubkey> {
    (0..n).map(|_| Pubkey::new_unique()).collect()
}

pub fn asset_json(asset_id: &Pubkey, tree: &Pubkey, leaf_id: u64, owner: &Pubkey) -> Value {
    json!({
        "id": asset_id.to_string(),
        "compression": {
            "eligible": false,
            "compressed": true,
            "data_hash": hash_b58(2),
            "creator_hash": hash_b58(3),
            "asset_hash": hash_b58(4),
            "tree": tree.to_string(),
            "seq": leaf_id + 1,
            "leaf_id": leaf_id
        },
        "ownership": {
            "owner": owner.to_string(),
            "delegate": null,
            "delegated": false
        }
    })
}

pub fn proof_json(tree: &Pubkey, nodes: &[Pubkey], leaf_id: u64) -> Value {
    json!({
        "root": hash_b58(1),
        "proof": nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        "node_index": (1u64 << nodes.len()) + leaf_id,
        "leaf": hash_b58(4),
        "tree_id": tree.to_string()
    })
}

/// Bubblegum tree config bytes with `num_minted` set.
pub fn tree_config(num_minted: u64) -> Vec<u8> {
    let mut data = vec![0u8; 96];
    data[80..88].copy_from_slice(&num_minted.to_le_bytes());
    data
}
