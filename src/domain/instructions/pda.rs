//! Program ids and derived addresses used by the compressed mint workflow.

use solana_program::{pubkey, pubkey::Pubkey};

pub const BUBBLEGUM_PROGRAM_ID: Pubkey = pubkey!("BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY");
pub const ACCOUNT_COMPRESSION_PROGRAM_ID: Pubkey =
    pubkey!("cmtDvXumGCrqC1Age74AVPhSRVXJMd8PJS91L8KbNCK");
pub const NOOP_PROGRAM_ID: Pubkey = pubkey!("noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV");
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Bubblegum tree config account, which is also the tree's authority.
pub fn tree_authority(tree: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[tree.as_ref()], &BUBBLEGUM_PROGRAM_ID).0
}

/// Signer Bubblegum uses for CPIs into token metadata when minting into a collection.
pub fn bubblegum_collection_signer() -> Pubkey {
    Pubkey::find_program_address(&[b"collection_cpi"], &BUBBLEGUM_PROGRAM_ID).0
}

pub fn metadata_account(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition_account(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Asset id of the leaf minted with `nonce` into `tree`.
pub fn asset_id(tree: &Pubkey, nonce: u64) -> Pubkey {
    Pubkey::find_program_address(
        &[b"asset", tree.as_ref(), &nonce.to_le_bytes()],
        &BUBBLEGUM_PROGRAM_ID,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_ids_are_distinct_per_nonce() {
        let tree = Pubkey::new_unique();
        assert_ne!(asset_id(&tree, 0), asset_id(&tree, 1));
        assert_eq!(asset_id(&tree, 7), asset_id(&tree, 7));
    }

    #[test]
    fn metadata_and_edition_differ() {
        let mint = Pubkey::new_unique();
        assert_ne!(metadata_account(&mint), master_edition_account(&mint));
    }
}
