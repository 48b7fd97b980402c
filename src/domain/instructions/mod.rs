//! Instruction assembly for the compressed mint workflow.

pub mod collection;
pub mod encode;
pub mod mint;
pub mod pda;
pub mod tree;
pub mod verify;

pub use collection::{create_collection_ixs, CollectionAccounts, CollectionMetadata, Creator};
pub use mint::{mint_to_collection_ix, AssetMetadata, MintAuthorities};
pub use tree::{alloc_tree_ix, create_tree_ix, TreeAccounts, TreeShape};
pub use verify::{verify_ix, VerifyArgs};
