//! Collection NFT creation: mint, token account, metadata, master edition and size.
//!
//! All of it is assembled into one instruction list so the collection is never
//! observable half-initialized.

use borsh::BorshSerialize;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};

use crate::domain::instructions::encode::indexed_data;
use crate::domain::instructions::pda::{
    master_edition_account, metadata_account, TOKEN_METADATA_PROGRAM_ID,
};
use crate::errors::WorkflowError;

// Token metadata instruction indices.
const CREATE_METADATA_ACCOUNT_V3: u8 = 33;
const CREATE_MASTER_EDITION_V3: u8 = 17;
const SET_COLLECTION_SIZE: u8 = 34;

/// A creator entry in token metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

impl Creator {
    /// Sole, unverified creator with the whole share.
    pub fn sole(address: Pubkey) -> Self {
        Self {
            address,
            verified: false,
            share: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
    pub size: u64,
}

// Token metadata `DataV2`; collection and uses stay unset on the collection NFT itself.
#[derive(BorshSerialize)]
struct DataV2<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
    seller_fee_basis_points: u16,
    creators: Option<&'a [Creator]>,
    collection: Option<()>,
    uses: Option<()>,
}

#[derive(BorshSerialize)]
struct CreateMetadataAccountArgsV3<'a> {
    data: DataV2<'a>,
    is_mutable: bool,
    collection_details: Option<()>,
}

#[derive(BorshSerialize)]
struct CreateMasterEditionArgs {
    max_supply: Option<u64>,
}

#[derive(BorshSerialize)]
struct SetCollectionSizeArgs {
    size: u64,
}

/// Accounts the collection step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionAccounts {
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub metadata: Pubkey,
    pub master_edition: Pubkey,
}

impl CollectionAccounts {
    pub fn for_mint(mint: Pubkey, owner: &Pubkey) -> Self {
        Self {
            mint,
            token_account: get_associated_token_address(owner, &mint),
            metadata: metadata_account(&mint),
            master_edition: master_edition_account(&mint),
        }
    }
}

/// Space the mint account needs.
pub fn mint_account_len() -> usize {
    spl_token::state::Mint::LEN
}

/// Builds the whole collection setup with `payer` as mint, update and collection authority.
pub fn create_collection_ixs(
    payer: &Pubkey,
    accounts: &CollectionAccounts,
    mint_rent_lamports: u64,
    metadata: &CollectionMetadata,
) -> Result<Vec<Instruction>, WorkflowError> {
    let token_program = spl_token::id();

    let create_mint = system_instruction::create_account(
        payer,
        &accounts.mint,
        mint_rent_lamports,
        mint_account_len() as u64,
        &token_program,
    );
    let init_mint = spl_token::instruction::initialize_mint2(
        &token_program,
        &accounts.mint,
        payer,
        Some(payer),
        0,
    )
    .map_err(|e| WorkflowError::Instruction(format!("initialize_mint2: {}", e)))?;
    let create_ata = create_associated_token_account(payer, payer, &accounts.mint, &token_program);
    let mint_one = spl_token::instruction::mint_to(
        &token_program,
        &accounts.mint,
        &accounts.token_account,
        payer,
        &[],
        1,
    )
    .map_err(|e| WorkflowError::Instruction(format!("mint_to: {}", e)))?;

    Ok(vec![
        create_mint,
        init_mint,
        create_ata,
        mint_one,
        create_metadata_v3_ix(payer, accounts, metadata)?,
        create_master_edition_v3_ix(payer, accounts)?,
        set_collection_size_ix(payer, accounts, metadata.size)?,
    ])
}

fn create_metadata_v3_ix(
    payer: &Pubkey,
    accounts: &CollectionAccounts,
    metadata: &CollectionMetadata,
) -> Result<Instruction, WorkflowError> {
    let creators = if metadata.creators.is_empty() {
        None
    } else {
        Some(metadata.creators.as_slice())
    };
    let args = CreateMetadataAccountArgsV3 {
        data: DataV2 {
            name: &metadata.name,
            symbol: &metadata.symbol,
            uri: &metadata.uri,
            seller_fee_basis_points: metadata.seller_fee_basis_points,
            creators,
            collection: None,
            uses: None,
        },
        is_mutable: false,
        collection_details: None,
    };
    let data = indexed_data(CREATE_METADATA_ACCOUNT_V3, &args)?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(accounts.metadata, false),
            AccountMeta::new_readonly(accounts.mint, false),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data,
    })
}

fn create_master_edition_v3_ix(
    payer: &Pubkey,
    accounts: &CollectionAccounts,
) -> Result<Instruction, WorkflowError> {
    // max_supply = Some(0): the collection NFT can never be printed.
    let data = indexed_data(
        CREATE_MASTER_EDITION_V3,
        &CreateMasterEditionArgs { max_supply: Some(0) },
    )?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(accounts.master_edition, false),
            AccountMeta::new(accounts.mint, false),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new(accounts.metadata, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data,
    })
}

fn set_collection_size_ix(
    payer: &Pubkey,
    accounts: &CollectionAccounts,
    size: u64,
) -> Result<Instruction, WorkflowError> {
    let data = indexed_data(SET_COLLECTION_SIZE, &SetCollectionSizeArgs { size })?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(accounts.metadata, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(accounts.mint, false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(creators: Vec<Creator>) -> CollectionMetadata {
        CollectionMetadata {
            name: "Super Sweet NFT Collection".to_string(),
            symbol: "SSNC".to_string(),
            uri: "https://example.invalid/collection.json".to_string(),
            seller_fee_basis_points: 100,
            creators,
            size: 50,
        }
    }

    #[test]
    fn collection_setup_is_one_ordered_instruction_list() {
        let payer = Pubkey::new_unique();
        let accounts = CollectionAccounts::for_mint(Pubkey::new_unique(), &payer);
        let ixs =
            create_collection_ixs(&payer, &accounts, 1_461_600, &metadata(vec![Creator::sole(payer)]))
                .unwrap();

        let programs: Vec<Pubkey> = ixs.iter().map(|ix| ix.program_id).collect();
        assert_eq!(
            programs,
            vec![
                system_program::ID,
                spl_token::id(),
                spl_associated_token_account::id(),
                spl_token::id(),
                TOKEN_METADATA_PROGRAM_ID,
                TOKEN_METADATA_PROGRAM_ID,
                TOKEN_METADATA_PROGRAM_ID,
            ]
        );
        assert_eq!(ixs[4].data[0], CREATE_METADATA_ACCOUNT_V3);
        assert_eq!(ixs[5].data, vec![CREATE_MASTER_EDITION_V3, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ixs[6].data[1..], 50u64.to_le_bytes());
    }

    #[test]
    fn metadata_without_creators_encodes_none() {
        let payer = Pubkey::new_unique();
        let accounts = CollectionAccounts::for_mint(Pubkey::new_unique(), &payer);
        let meta = metadata(vec![]);
        let ix = create_metadata_v3_ix(&payer, &accounts, &meta).unwrap();

        let strings_len = 4 * 3 + meta.name.len() + meta.symbol.len() + meta.uri.len();
        let creators_tag = 1 + strings_len + 2;
        assert_eq!(ix.data[creators_tag], 0);
        // creators, collection, uses tags + is_mutable + collection_details tag
        assert_eq!(ix.data.len(), creators_tag + 5);
    }

    #[test]
    fn creators_are_length_prefixed_entries() {
        let payer = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        let accounts = CollectionAccounts::for_mint(Pubkey::new_unique(), &payer);
        let meta = metadata(vec![
            Creator::sole(payer),
            Creator {
                address: second,
                verified: true,
                share: 0,
            },
        ]);
        let ix = create_metadata_v3_ix(&payer, &accounts, &meta).unwrap();

        let strings_len = 4 * 3 + meta.name.len() + meta.symbol.len() + meta.uri.len();
        let tag = 1 + strings_len + 2;
        assert_eq!(ix.data[tag], 1);
        assert_eq!(&ix.data[tag + 1..tag + 5], &2u32.to_le_bytes());
        let first = tag + 5;
        assert_eq!(&ix.data[first..first + 32], payer.as_ref());
        assert_eq!(&ix.data[first + 32..first + 34], &[0, 100]);
        let next = first + 34;
        assert_eq!(&ix.data[next..next + 32], second.as_ref());
        assert_eq!(&ix.data[next + 32..next + 34], &[1, 0]);
    }
}
