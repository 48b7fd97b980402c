pub mod hashing;

pub use hashing::instruction_discriminator;
