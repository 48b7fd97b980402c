pub mod submitter;
pub mod workflow;

pub use submitter::{SubmitterConfig, TransactionSubmitter, TransactionTemplate};
pub use workflow::{
    AssetPlan, CollectionPlan, MintedAsset, Step, StepOutcome, StepReport, TreePlan, Workflow,
    WorkflowPlan, WorkflowReport,
};
