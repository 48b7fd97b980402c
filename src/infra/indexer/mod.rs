pub mod client;
pub mod types;

pub use client::{AssetIndex, ReadApiClient};
pub use types::{AssetCompression, AssetOwnership, AssetProof, AssetSnapshot};
