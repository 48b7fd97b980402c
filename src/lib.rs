pub mod app;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod infra;

// Convenience re-exports (keeps call-sites clean)
pub use app::{TransactionSubmitter, TransactionTemplate, Workflow, WorkflowPlan, WorkflowReport};
pub use domain::proof::AssetProofRecord;
pub use errors::{FetchError, LedgerError, ProofError, SubmitError, WorkflowError};
pub use infra::indexer::{AssetIndex, ReadApiClient};
pub use infra::solana::{Ledger, RpcLedger};
