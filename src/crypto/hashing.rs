// Instruction discriminators for Anchor programs.

use sha2::{Digest, Sha256};

// Anchor namespaces instruction handlers under "global".
const INSTRUCTION_NAMESPACE: &str = "global";

/// First 8 bytes of `sha256("global:<name>")`, the prefix Anchor dispatches on.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(INSTRUCTION_NAMESPACE.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&digest[..8]);
    discriminator
}
