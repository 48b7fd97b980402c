//! Wire types for the compressed-asset Read API (`getAsset`, `getAssetProof`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub id: String,
    pub params: AssetIdParams<'a>,
}

#[derive(Debug, Serialize)]
pub struct AssetIdParams<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Current state of an asset as reported by the indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetSnapshot {
    pub compression: AssetCompression,
    pub ownership: AssetOwnership,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetCompression {
    pub compressed: bool,
    pub data_hash: String,
    pub creator_hash: String,
    pub tree: String,
    /// Leaf index, which is also the leaf nonce for Bubblegum trees.
    pub leaf_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetOwnership {
    pub owner: String,
    /// Absent when the owner has not delegated the leaf.
    #[serde(default)]
    pub delegate: Option<String>,
}

/// Merkle proof path for an asset's leaf, as reported by the indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetProof {
    pub root: String,
    pub proof: Vec<String>,
    /// Position of the leaf in the full tree, `2^depth + leaf_id`, when reported.
    #[serde(default)]
    pub node_index: Option<u64>,
    pub tree_id: String,
}
