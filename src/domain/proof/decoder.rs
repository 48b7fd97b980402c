//! Turns indexer proof data into the byte arrays and account list the verifier consumes.

use solana_program::{instruction::AccountMeta, pubkey::Pubkey};
use std::str::FromStr;

use crate::errors::ProofError;
use crate::infra::indexer::{AssetProof, AssetSnapshot};

pub const HASH_LEN: usize = 32;

/// Decodes a Base58 hash into its exact 32-byte on-chain form.
pub fn decode_hash(value: &str) -> Result<[u8; HASH_LEN], ProofError> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| ProofError::MalformedHash {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ProofError::MalformedHash {
            value: value.to_string(),
            reason: format!("decoded to {} bytes, expected {}", bytes.len(), HASH_LEN),
        })
}

fn decode_address(value: &str) -> Result<Pubkey, ProofError> {
    Pubkey::from_str(value).map_err(|e| ProofError::MalformedAddress {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Maps proof path nodes 1:1 to read-only, non-signer account references.
///
/// Order is the tree-traversal order (leaf sibling first) and is preserved.
pub fn map_proof<S: AsRef<str>>(path: &[S]) -> Result<Vec<AccountMeta>, ProofError> {
    if path.is_empty() {
        return Err(ProofError::EmptyProof);
    }
    path.iter()
        .enumerate()
        .map(|(position, node)| {
            let node = node.as_ref();
            Pubkey::from_str(node)
                .map(|pubkey| AccountMeta::new_readonly(pubkey, false))
                .map_err(|_| ProofError::MalformedNode {
                    position,
                    value: node.to_string(),
                })
        })
        .collect()
}

/// A decoded, validated inclusion proof for one asset, as of the moment it was fetched.
///
/// Any later mutation of the tree invalidates it; fetch a fresh one per verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetProofRecord {
    pub asset_id: Pubkey,
    pub tree: Pubkey,
    pub root: [u8; HASH_LEN],
    pub data_hash: [u8; HASH_LEN],
    pub creator_hash: [u8; HASH_LEN],
    pub leaf_index: u64,
    pub leaf_owner: Pubkey,
    /// The owner itself when no delegate is set.
    pub leaf_delegate: Pubkey,
    pub proof_path: Vec<AccountMeta>,
}

impl AssetProofRecord {
    /// Combines `getAsset` and `getAssetProof` results for the same asset.
    pub fn from_indexer(
        asset_id: &Pubkey,
        snapshot: &AssetSnapshot,
        proof: &AssetProof,
    ) -> Result<Self, ProofError> {
        let compression = &snapshot.compression;
        if !compression.compressed {
            return Err(ProofError::NotCompressed(asset_id.to_string()));
        }
        if compression.tree != proof.tree_id {
            return Err(ProofError::TreeMismatch {
                asset_tree: compression.tree.clone(),
                proof_tree: proof.tree_id.clone(),
            });
        }

        let proof_path = map_proof(&proof.proof)?;
        let tree = decode_address(&proof.tree_id)?;
        if let Some(node_index) = proof.node_index {
            check_leaf_position(compression.leaf_id, node_index, proof_path.len())?;
        }

        let leaf_owner = decode_address(&snapshot.ownership.owner)?;
        let leaf_delegate = match &snapshot.ownership.delegate {
            Some(delegate) => decode_address(delegate)?,
            None => leaf_owner,
        };

        Ok(Self {
            asset_id: *asset_id,
            tree,
            root: decode_hash(&proof.root)?,
            data_hash: decode_hash(&compression.data_hash)?,
            creator_hash: decode_hash(&compression.creator_hash)?,
            leaf_index: compression.leaf_id,
            leaf_owner,
            leaf_delegate,
            proof_path,
        })
    }

    pub fn depth(&self) -> usize {
        self.proof_path.len()
    }
}

// Leaves occupy nodes 2^depth .. 2^(depth+1) of the full tree, in index order.
fn check_leaf_position(leaf_index: u64, node_index: u64, depth: usize) -> Result<(), ProofError> {
    let expected = u32::try_from(depth)
        .ok()
        .and_then(|d| 1u64.checked_shl(d))
        .and_then(|first_leaf| first_leaf.checked_add(leaf_index));
    if expected == Some(node_index) {
        Ok(())
    } else {
        Err(ProofError::LeafPositionMismatch {
            leaf_index,
            node_index,
            depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::indexer::{AssetCompression, AssetOwnership};

    fn node(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    fn snapshot(tree: String, leaf_id: u64, delegate: Option<String>) -> AssetSnapshot {
        AssetSnapshot {
            compression: AssetCompression {
                compressed: true,
                data_hash: node(2),
                creator_hash: node(3),
                tree,
                leaf_id,
            },
            ownership: AssetOwnership {
                owner: node(7),
                delegate,
            },
        }
    }

    fn proof(tree: String, depth: u8, node_index: Option<u64>) -> AssetProof {
        AssetProof {
            root: node(1),
            proof: (10..10 + depth).map(node).collect(),
            node_index,
            tree_id: tree,
        }
    }

    #[test]
    fn decode_hash_round_trips_a_known_value() {
        let original: [u8; 32] = core::array::from_fn(|i| (i as u8).wrapping_mul(7));
        let encoded = bs58::encode(original).into_string();
        assert_eq!(decode_hash(&encoded).unwrap(), original);
    }

    #[test]
    fn decode_hash_rejects_wrong_length() {
        let short = bs58::encode([1u8; 31]).into_string();
        assert!(matches!(
            decode_hash(&short),
            Err(ProofError::MalformedHash { .. })
        ));
        let long = bs58::encode([1u8; 33]).into_string();
        assert!(decode_hash(&long).is_err());
    }

    #[test]
    fn decode_hash_rejects_non_base58() {
        // '0' and 'l' are outside the Base58 alphabet.
        assert!(decode_hash("0OIl").is_err());
    }

    #[test]
    fn map_proof_preserves_order_and_marks_read_only() {
        let path: Vec<String> = (1..=5).map(node).collect();
        let metas = map_proof(&path).unwrap();

        assert_eq!(metas.len(), path.len());
        for (meta, raw) in metas.iter().zip(&path) {
            assert_eq!(meta.pubkey.to_string(), *raw);
            assert!(!meta.is_signer);
            assert!(!meta.is_writable);
        }
    }

    #[test]
    fn map_proof_rejects_empty_path() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(map_proof(&empty), Err(ProofError::EmptyProof));
    }

    #[test]
    fn map_proof_reports_position_of_bad_node() {
        let path = vec![node(1), "not-a-key".to_string(), node(3)];
        assert_eq!(
            map_proof(&path),
            Err(ProofError::MalformedNode {
                position: 1,
                value: "not-a-key".to_string()
            })
        );
    }

    #[test]
    fn record_rejects_proof_for_another_tree() {
        let asset_id = Pubkey::new_unique();
        assert!(matches!(
            AssetProofRecord::from_indexer(
                &asset_id,
                &snapshot(node(4), 0, None),
                &proof(node(6), 3, None)
            ),
            Err(ProofError::TreeMismatch { .. })
        ));
    }

    #[test]
    fn record_takes_owner_as_delegate_when_none_is_set() {
        let record = AssetProofRecord::from_indexer(
            &Pubkey::new_unique(),
            &snapshot(node(4), 5, None),
            &proof(node(4), 3, Some(8 + 5)),
        )
        .unwrap();
        assert_eq!(record.leaf_owner.to_string(), node(7));
        assert_eq!(record.leaf_delegate, record.leaf_owner);

        let record = AssetProofRecord::from_indexer(
            &Pubkey::new_unique(),
            &snapshot(node(4), 5, Some(node(8))),
            &proof(node(4), 3, None),
        )
        .unwrap();
        assert_eq!(record.leaf_delegate.to_string(), node(8));
    }

    #[test]
    fn record_rejects_node_index_off_the_leaf_row() {
        let err = AssetProofRecord::from_indexer(
            &Pubkey::new_unique(),
            &snapshot(node(4), 5, None),
            &proof(node(4), 3, Some(16384 + 5)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProofError::LeafPositionMismatch {
                leaf_index: 5,
                node_index: 16389,
                depth: 3
            }
        );
    }
}
