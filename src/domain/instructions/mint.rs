//! Bubblegum `mint_to_collection_v1`: appends a compressed NFT leaf to a tree.

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::domain::instructions::collection::{CollectionAccounts, Creator};
use crate::domain::instructions::encode::anchor_data;
use crate::domain::instructions::pda::{
    bubblegum_collection_signer, ACCOUNT_COMPRESSION_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID,
    NOOP_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID,
};
use crate::domain::instructions::tree::TreeAccounts;
use crate::errors::WorkflowError;

#[derive(BorshSerialize)]
#[allow(dead_code)]
enum TokenStandard {
    NonFungible,
    FungibleAsset,
    Fungible,
    NonFungibleEdition,
}

#[derive(BorshSerialize)]
#[allow(dead_code)]
enum TokenProgramVersion {
    Original,
    Token2022,
}

#[derive(BorshSerialize)]
struct Collection {
    verified: bool,
    key: Pubkey,
}

// Bubblegum `MetadataArgs`.
#[derive(BorshSerialize)]
struct MetadataArgs<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
    seller_fee_basis_points: u16,
    primary_sale_happened: bool,
    is_mutable: bool,
    edition_nonce: Option<u8>,
    token_standard: Option<TokenStandard>,
    collection: Option<Collection>,
    uses: Option<()>,
    token_program_version: TokenProgramVersion,
    creators: Vec<Creator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
}

/// Who receives the leaf and who signs for the tree and collection.
#[derive(Debug, Clone, Copy)]
pub struct MintAuthorities {
    pub payer: Pubkey,
    pub leaf_owner: Pubkey,
    pub leaf_delegate: Pubkey,
}

pub fn mint_to_collection_ix(
    authorities: &MintAuthorities,
    tree: &TreeAccounts,
    collection: &CollectionAccounts,
    metadata: &AssetMetadata,
) -> Result<Instruction, WorkflowError> {
    let args = MetadataArgs {
        name: &metadata.name,
        symbol: &metadata.symbol,
        uri: &metadata.uri,
        seller_fee_basis_points: metadata.seller_fee_basis_points,
        primary_sale_happened: false,
        is_mutable: false,
        edition_nonce: Some(0),
        token_standard: Some(TokenStandard::NonFungible),
        // Bubblegum verifies the collection during the mint.
        collection: Some(Collection {
            verified: false,
            key: collection.mint,
        }),
        uses: None,
        token_program_version: TokenProgramVersion::Original,
        creators: vec![Creator::sole(authorities.payer)],
    };
    let data = anchor_data("mint_to_collection_v1", &args)?;

    let payer = authorities.payer;
    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(tree.tree_authority, false),
            AccountMeta::new_readonly(authorities.leaf_owner, false),
            AccountMeta::new_readonly(authorities.leaf_delegate, false),
            AccountMeta::new(tree.tree, false),
            AccountMeta::new_readonly(payer, true),
            AccountMeta::new_readonly(payer, true), // tree delegate
            AccountMeta::new_readonly(payer, true), // collection authority
            // No delegated collection authority record: the program id stands in for "none".
            AccountMeta::new_readonly(BUBBLEGUM_PROGRAM_ID, false),
            AccountMeta::new_readonly(collection.mint, false),
            AccountMeta::new(collection.metadata, false),
            AccountMeta::new_readonly(collection.master_edition, false),
            AccountMeta::new_readonly(bubblegum_collection_signer(), false),
            AccountMeta::new_readonly(NOOP_PROGRAM_ID, false),
            AccountMeta::new_readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data,
    })
}
