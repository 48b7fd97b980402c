//! Merkle tree allocation and Bubblegum tree creation.
//!
//! Allocation and creation go into the same transaction: an allocated but
//! uninitialized tree account cannot be used and its rent is stranded.

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction, system_program,
};

use crate::domain::instructions::encode::anchor_data;
use crate::domain::instructions::pda::{
    tree_authority, ACCOUNT_COMPRESSION_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID, NOOP_PROGRAM_ID,
};
use crate::errors::WorkflowError;

/// (max_depth, max_buffer_size) pairs the account compression program accepts.
pub const VALID_DEPTH_SIZE_PAIRS: &[(u32, u32)] = &[
    (3, 8),
    (5, 8),
    (14, 64),
    (14, 256),
    (14, 1024),
    (14, 2048),
    (15, 64),
    (16, 64),
    (17, 64),
    (18, 64),
    (19, 64),
    (20, 64),
    (20, 256),
    (20, 1024),
    (20, 2048),
    (24, 64),
    (24, 256),
    (24, 512),
    (24, 1024),
    (24, 2048),
    (26, 512),
    (26, 1024),
    (26, 2048),
    (30, 512),
    (30, 1024),
    (30, 2048),
];

const TREE_HEADER_SIZE: usize = 56;
const NODE_SIZE: usize = 32;

/// Offset of `num_minted` in Bubblegum's tree config account:
/// discriminator, tree_creator, tree_delegate, total_mint_capacity.
const TREE_CONFIG_NUM_MINTED_OFFSET: usize = 8 + 32 + 32 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
}

impl TreeShape {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !VALID_DEPTH_SIZE_PAIRS.contains(&(self.max_depth, self.max_buffer_size)) {
            return Err(WorkflowError::Instruction(format!(
                "unsupported depth/buffer pair ({}, {})",
                self.max_depth, self.max_buffer_size
            )));
        }
        if self.canopy_depth >= self.max_depth {
            return Err(WorkflowError::Instruction(format!(
                "canopy depth {} must be below max depth {}",
                self.canopy_depth, self.max_depth
            )));
        }
        Ok(())
    }

    /// Byte size of the concurrent Merkle tree account: header, tree, canopy.
    pub fn account_size(&self) -> usize {
        let depth = self.max_depth as usize;
        let buffer = self.max_buffer_size as usize;
        // change log entry and rightmost path share the same layout:
        // depth nodes + one 32-byte node + u32 index + u32 padding
        let path_size = NODE_SIZE * depth + NODE_SIZE + 8;
        let tree_size = 3 * 8 + buffer * path_size + path_size;
        let canopy_size = if self.canopy_depth == 0 {
            0
        } else {
            ((1usize << (self.canopy_depth + 1)) - 2) * NODE_SIZE
        };
        TREE_HEADER_SIZE + tree_size + canopy_size
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.max_depth
    }
}

/// Accounts the tree step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeAccounts {
    pub tree: Pubkey,
    pub tree_authority: Pubkey,
}

impl TreeAccounts {
    pub fn for_tree(tree: Pubkey) -> Self {
        Self {
            tree,
            tree_authority: tree_authority(&tree),
        }
    }
}

/// Allocates the tree account, owned by the account compression program.
pub fn alloc_tree_ix(payer: &Pubkey, tree: &Pubkey, lamports: u64, shape: &TreeShape) -> Instruction {
    system_instruction::create_account(
        payer,
        tree,
        lamports,
        shape.account_size() as u64,
        &ACCOUNT_COMPRESSION_PROGRAM_ID,
    )
}

#[derive(BorshSerialize)]
struct CreateTreeArgs {
    max_depth: u32,
    max_buffer_size: u32,
    public: Option<bool>,
}

pub fn create_tree_ix(
    payer: &Pubkey,
    accounts: &TreeAccounts,
    shape: &TreeShape,
) -> Result<Instruction, WorkflowError> {
    let data = anchor_data(
        "create_tree",
        &CreateTreeArgs {
            max_depth: shape.max_depth,
            max_buffer_size: shape.max_buffer_size,
            public: Some(false),
        },
    )?;

    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(accounts.tree_authority, false),
            AccountMeta::new(accounts.tree, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new_readonly(NOOP_PROGRAM_ID, false),
            AccountMeta::new_readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data,
    })
}

/// Reads `num_minted` from a tree config account; it is the nonce the next mint receives.
pub fn num_minted(tree_config: &[u8]) -> Option<u64> {
    let bytes = tree_config.get(TREE_CONFIG_NUM_MINTED_OFFSET..TREE_CONFIG_NUM_MINTED_OFFSET + 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> TreeShape {
        TreeShape {
            max_depth,
            max_buffer_size,
            canopy_depth,
        }
    }

    #[test]
    fn account_size_matches_compression_layout() {
        // (3, 8) with no canopy: 56 + 24 + 9 * (32*3 + 40)
        assert_eq!(shape(3, 8, 0).account_size(), 56 + 24 + 9 * 136);
        // Canopy of depth 2 stores 6 nodes.
        assert_eq!(
            shape(3, 8, 2).account_size(),
            shape(3, 8, 0).account_size() + 6 * 32
        );
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(shape(14, 64, 10).validate().is_ok());
        assert_eq!(shape(14, 64, 10).capacity(), 16_384);
    }

    #[test]
    fn rejects_unsupported_pairs_and_deep_canopy() {
        assert!(shape(14, 63, 0).validate().is_err());
        assert!(shape(14, 64, 14).validate().is_err());
    }

    #[test]
    fn create_tree_marks_payer_as_signer() {
        let payer = Pubkey::new_unique();
        let accounts = TreeAccounts::for_tree(Pubkey::new_unique());
        let ix = create_tree_ix(&payer, &accounts, &shape(14, 64, 10)).unwrap();

        assert_eq!(ix.program_id, BUBBLEGUM_PROGRAM_ID);
        assert_eq!(ix.accounts[1].pubkey, accounts.tree);
        assert!(ix.accounts[2].is_signer && ix.accounts[2].is_writable);
        // discriminator + depth + buffer + Some(false)
        assert_eq!(ix.data.len(), 8 + 4 + 4 + 2);
        assert_eq!(&ix.data[..8], &crate::crypto::instruction_discriminator("create_tree"));
        assert_eq!(&ix.data[8..12], &14u32.to_le_bytes());
        assert_eq!(&ix.data[16..], &[1, 0]);
    }

    #[test]
    fn num_minted_reads_le_counter() {
        let mut data = vec![0u8; 96];
        data[80..88].copy_from_slice(&7u64.to_le_bytes());
        assert_eq!(num_minted(&data), Some(7));
        assert_eq!(num_minted(&data[..40]), None);
    }
}
