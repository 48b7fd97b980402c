//! The `verify` instruction: checks a leaf's inclusion proof against the tree's current root.

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::domain::instructions::encode::anchor_data;
use crate::domain::instructions::pda::ACCOUNT_COMPRESSION_PROGRAM_ID;
use crate::domain::proof::{AssetProofRecord, HASH_LEN};
use crate::errors::{ProofError, WorkflowError};

/// Fixed-width arguments of `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize)]
pub struct VerifyArgs {
    pub root: [u8; HASH_LEN],
    pub data_hash: [u8; HASH_LEN],
    pub creator_hash: [u8; HASH_LEN],
    pub nonce: u64,
    pub index: u32,
}

impl VerifyArgs {
    /// Nonce and index both come from the leaf index observed at fetch time.
    pub fn from_record(record: &AssetProofRecord) -> Result<Self, ProofError> {
        let index = u32::try_from(record.leaf_index)
            .map_err(|_| ProofError::IndexOutOfRange(record.leaf_index))?;
        Ok(Self {
            root: record.root,
            data_hash: record.data_hash,
            creator_hash: record.creator_hash,
            nonce: record.leaf_index,
            index,
        })
    }
}

/// Builds `verify` with the fixed accounts first and the proof path appended in order.
pub fn verify_ix(
    program_id: &Pubkey,
    leaf_owner: &Pubkey,
    leaf_delegate: &Pubkey,
    merkle_tree: &Pubkey,
    args: &VerifyArgs,
    proof_path: &[AccountMeta],
) -> Result<Instruction, WorkflowError> {
    let data = anchor_data("verify", args)?;

    let mut accounts = Vec::with_capacity(4 + proof_path.len());
    accounts.push(AccountMeta::new_readonly(*leaf_owner, true));
    accounts.push(AccountMeta::new_readonly(*leaf_delegate, false));
    accounts.push(AccountMeta::new_readonly(*merkle_tree, false));
    accounts.push(AccountMeta::new_readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false));
    accounts.extend_from_slice(proof_path);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
