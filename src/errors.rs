//! Error taxonomy for submission, indexer fetches, proof decoding and the workflow.

use solana_sdk::signature::Signature;
use thiserror::Error;

/// Classified failures at the ledger RPC boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport-level failure (connection, HTTP, node unhealthy).
    #[error("network error: {0}")]
    Network(String),

    /// The node does not know the blockhash the transaction was signed against.
    #[error("blockhash not found")]
    BlockhashNotFound,

    /// The transaction was rejected (preflight simulation or program error).
    #[error("transaction rejected: {reason}")]
    Rejected { reason: String },

    #[error("signing error: {0}")]
    Signing(String),
}

/// Terminal outcomes of the Transaction Retry Submitter.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("network error: {message}")]
    Network {
        message: String,
        signature: Option<Signature>,
    },

    #[error("program rejected transaction: {reason}")]
    ProgramRejection {
        reason: String,
        signature: Option<Signature>,
    },

    #[error("failed to sign transaction: {0}")]
    Signing(String),

    #[error("transaction is {size} bytes, over the {limit} byte packet limit")]
    Oversized { size: u64, limit: usize },

    /// The status of a sent transaction could not be read; it may or may not have landed.
    #[error("confirmation status unknown for {signature}: {message}")]
    ConfirmationUnknown {
        signature: Signature,
        message: String,
    },

    #[error("no confirmation after {attempts} attempts (last failure: {last_failure})")]
    RetryExhausted {
        attempts: u32,
        last_failure: String,
        last_signature: Option<Signature>,
    },
}

impl SubmitError {
    /// Best-effort signature of the attempt that produced this error.
    pub fn signature(&self) -> Option<Signature> {
        match self {
            SubmitError::Network { signature, .. } => *signature,
            SubmitError::ProgramRejection { signature, .. } => *signature,
            SubmitError::ConfirmationUnknown { signature, .. } => Some(*signature),
            SubmitError::RetryExhausted { last_signature, .. } => *last_signature,
            SubmitError::Signing(_) | SubmitError::Oversized { .. } => None,
        }
    }
}

/// Failures talking to the indexing service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("indexer transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("indexer answered HTTP {status}")]
    Status { status: u16 },

    #[error("indexer returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response carried neither a result nor an error.
    #[error("indexer returned no result for {method}({id})")]
    Absent { method: String, id: String },

    #[error("indexer response could not be decoded: {0}")]
    Decode(String),
}

/// Input validation failures in the proof decoder/mapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof path is empty")]
    EmptyProof,

    #[error("malformed hash {value:?}: {reason}")]
    MalformedHash { value: String, reason: String },

    #[error("malformed proof node {value:?} at position {position}")]
    MalformedNode { position: usize, value: String },

    #[error("asset belongs to tree {asset_tree} but proof is for tree {proof_tree}")]
    TreeMismatch {
        asset_tree: String,
        proof_tree: String,
    },

    #[error("malformed address {value:?}: {reason}")]
    MalformedAddress { value: String, reason: String },

    #[error("leaf {leaf_index} cannot sit at node {node_index} of a depth {depth} tree")]
    LeafPositionMismatch {
        leaf_index: u64,
        node_index: u64,
        depth: usize,
    },

    /// The signer offered for the leaf is not its indexed owner.
    #[error("leaf is owned by {indexed}, not {signer}")]
    OwnerMismatch { indexed: String, signer: String },

    #[error("asset {0} is not compressed")]
    NotCompressed(String),

    #[error("leaf index {0} does not fit the verification index field")]
    IndexOutOfRange(u64),
}

/// Named preconditions of the workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    TreeCreated,
    CollectionCreated,
    AssetMinted,
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Precondition::TreeCreated => "tree created",
            Precondition::CollectionCreated => "collection created",
            Precondition::AssetMinted => "asset minted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid instruction input: {0}")]
    Instruction(String),

    #[error("precondition not met: {0}")]
    Precondition(Precondition),
}

impl WorkflowError {
    pub fn signature(&self) -> Option<Signature> {
        match self {
            WorkflowError::Submit(e) => e.signature(),
            _ => None,
        }
    }
}
