pub mod blockhash;
pub mod client;

pub use blockhash::{BlockhashProvider, ConfirmationReference};
pub use client::{load_keypair, Ledger, RpcLedger, TransactionStatus};
