pub mod decoder;

pub use decoder::{decode_hash, map_proof, AssetProofRecord, HASH_LEN};
