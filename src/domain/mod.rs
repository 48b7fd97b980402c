pub mod instructions;
pub mod proof;
