//! Workflow Sequencer: tree -> collection -> mint -> verify.
//!
//! Every step lands on-chain state the next one needs and nothing can be rolled
//! back once submitted, so a failed step skips every step that depends on it
//! instead of attempting compensating actions.

use std::sync::Arc;

use solana_program::pubkey::Pubkey;
use solana_sdk::{signature::Signature, signer::keypair::Keypair, signer::Signer};

use crate::app::submitter::{TransactionSubmitter, TransactionTemplate};
use crate::domain::instructions::{
    alloc_tree_ix, collection::mint_account_len, create_collection_ixs, create_tree_ix,
    mint_to_collection_ix, pda, tree::num_minted, verify_ix, AssetMetadata, CollectionAccounts,
    CollectionMetadata, MintAuthorities, TreeAccounts, TreeShape, VerifyArgs,
};
use crate::domain::proof::AssetProofRecord;
use crate::errors::{Precondition, ProofError, WorkflowError};
use crate::infra::indexer::AssetIndex;
use crate::infra::solana::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateTree,
    CreateCollection,
    MintAsset,
    VerifyAsset,
}

impl Step {
    /// Preconditions that must hold before the step is attempted.
    pub fn requires(&self) -> &'static [Precondition] {
        match self {
            Step::CreateTree => &[],
            Step::CreateCollection => &[Precondition::TreeCreated],
            Step::MintAsset => &[Precondition::TreeCreated, Precondition::CollectionCreated],
            Step::VerifyAsset => &[Precondition::AssetMinted],
        }
    }

    /// Precondition established when the step completes.
    pub fn establishes(&self) -> Option<Precondition> {
        match self {
            Step::CreateTree => Some(Precondition::TreeCreated),
            Step::CreateCollection => Some(Precondition::CollectionCreated),
            Step::MintAsset => Some(Precondition::AssetMinted),
            Step::VerifyAsset => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { signature: Signature },
    /// The plan supplied the step's result (an existing on-chain account).
    Provided,
    Failed {
        error: String,
        signature: Option<Signature>,
    },
    Skipped { unmet: Precondition },
}

impl StepOutcome {
    fn failed(err: &WorkflowError) -> Self {
        StepOutcome::Failed {
            error: err.to_string(),
            signature: err.signature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// A freshly minted leaf and the asset id derived from its nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintedAsset {
    pub asset_id: Pubkey,
    pub tree: Pubkey,
    pub nonce: u64,
    pub signature: Signature,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowReport {
    pub steps: Vec<StepReport>,
    pub tree: Option<TreeAccounts>,
    pub collection: Option<CollectionAccounts>,
    pub asset_id: Option<Pubkey>,
    pub proof: Option<AssetProofRecord>,
}

impl WorkflowReport {
    fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|r| {
            matches!(
                r.outcome,
                StepOutcome::Completed { .. } | StepOutcome::Provided
            )
        })
    }

    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }
}

pub enum TreePlan {
    Create { tree: Keypair, shape: TreeShape },
    Existing(Pubkey),
}

pub enum CollectionPlan {
    Create {
        mint: Keypair,
        metadata: CollectionMetadata,
    },
    Existing(Pubkey),
}

pub enum AssetPlan {
    Mint(AssetMetadata),
    Existing(Pubkey),
}

pub struct WorkflowPlan {
    pub tree: TreePlan,
    pub collection: CollectionPlan,
    pub asset: AssetPlan,
    /// Receives the minted leaf and signs the verification.
    pub leaf_owner: Arc<Keypair>,
    pub verify: bool,
}

pub struct Workflow {
    ledger: Arc<dyn Ledger>,
    indexer: Arc<dyn AssetIndex>,
    submitter: TransactionSubmitter,
    payer: Arc<Keypair>,
    verify_program_id: Option<Pubkey>,
}

impl Workflow {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        indexer: Arc<dyn AssetIndex>,
        submitter: TransactionSubmitter,
        payer: Arc<Keypair>,
        verify_program_id: Option<Pubkey>,
    ) -> Self {
        Self {
            ledger,
            indexer,
            submitter,
            payer,
            verify_program_id,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Allocates and initializes the tree in a single transaction.
    pub async fn create_tree(
        &self,
        tree: &Keypair,
        shape: TreeShape,
    ) -> Result<(TreeAccounts, Signature), WorkflowError> {
        shape.validate()?;
        let payer = self.payer.pubkey();
        let accounts = TreeAccounts::for_tree(tree.pubkey());
        tracing::info!(
            tree = %accounts.tree,
            tree_authority = %accounts.tree_authority,
            max_depth = shape.max_depth,
            max_buffer_size = shape.max_buffer_size,
            canopy_depth = shape.canopy_depth,
            "creating merkle tree"
        );

        let lamports = self
            .ledger
            .minimum_balance_for_rent_exemption(shape.account_size())
            .await?;
        let instructions = [
            alloc_tree_ix(&payer, &accounts.tree, lamports, &shape),
            create_tree_ix(&payer, &accounts, &shape)?,
        ];

        let mut template = TransactionTemplate::new(&instructions, &payer);
        let signature = self
            .submitter
            .submit(&mut template, &[self.payer.as_ref(), tree])
            .await?;
        Ok((accounts, signature))
    }

    /// Creates the collection NFT, metadata, master edition and size in one transaction.
    pub async fn create_collection(
        &self,
        mint: &Keypair,
        metadata: &CollectionMetadata,
    ) -> Result<(CollectionAccounts, Signature), WorkflowError> {
        let payer = self.payer.pubkey();
        let accounts = CollectionAccounts::for_mint(mint.pubkey(), &payer);
        tracing::info!(
            mint = %accounts.mint,
            metadata = %accounts.metadata,
            master_edition = %accounts.master_edition,
            name = %metadata.name,
            "creating collection"
        );

        let rent = self
            .ledger
            .minimum_balance_for_rent_exemption(mint_account_len())
            .await?;
        let instructions = create_collection_ixs(&payer, &accounts, rent, metadata)?;

        let mut template = TransactionTemplate::new(&instructions, &payer);
        let signature = self
            .submitter
            .submit(&mut template, &[self.payer.as_ref(), mint])
            .await?;
        Ok((accounts, signature))
    }

    /// Mints one compressed NFT into `tree`, verified into `collection`.
    pub async fn mint_asset(
        &self,
        tree: &TreeAccounts,
        collection: &CollectionAccounts,
        leaf_owner: &Pubkey,
        metadata: &AssetMetadata,
    ) -> Result<MintedAsset, WorkflowError> {
        let tree_config = self
            .ledger
            .account_data(&tree.tree_authority)
            .await?
            .ok_or(WorkflowError::Precondition(Precondition::TreeCreated))?;
        let nonce = num_minted(&tree_config).ok_or_else(|| {
            WorkflowError::Instruction(format!(
                "tree config {} is too short ({} bytes)",
                tree.tree_authority,
                tree_config.len()
            ))
        })?;

        let payer = self.payer.pubkey();
        let authorities = MintAuthorities {
            payer,
            leaf_owner: *leaf_owner,
            leaf_delegate: payer,
        };
        let instruction = mint_to_collection_ix(&authorities, tree, collection, metadata)?;

        let asset_id = pda::asset_id(&tree.tree, nonce);
        tracing::info!(tree = %tree.tree, nonce, %asset_id, %leaf_owner, "minting compressed nft");

        let mut template = TransactionTemplate::new(&[instruction], &payer);
        let signature = self
            .submitter
            .submit(&mut template, &[self.payer.as_ref()])
            .await?;
        Ok(MintedAsset {
            asset_id,
            tree: tree.tree,
            nonce,
            signature,
        })
    }

    /// Fetches asset state and proof fresh from the indexer and decodes them.
    pub async fn fetch_proof(&self, asset_id: &Pubkey) -> Result<AssetProofRecord, WorkflowError> {
        let id = asset_id.to_string();
        let snapshot = self.indexer.get_asset(&id).await?;
        let proof = self.indexer.get_asset_proof(&id).await?;
        let record = AssetProofRecord::from_indexer(asset_id, &snapshot, &proof)?;
        tracing::info!(
            %asset_id,
            tree = %record.tree,
            leaf_index = record.leaf_index,
            depth = record.depth(),
            root = %hex::encode(record.root),
            "fetched asset proof"
        );
        Ok(record)
    }

    /// Verifies the asset's current inclusion proof on-chain.
    ///
    /// `leaf_owner` must be the indexed owner of the leaf; the indexed delegate is
    /// passed alongside it. When `expected_tree` is given, a proof for any other
    /// tree is refused before anything is sent. A proof that went stale between
    /// fetch and inclusion fails on-chain; that rejection is authoritative and
    /// surfaces as `ProgramRejection`.
    pub async fn verify_asset(
        &self,
        asset_id: &Pubkey,
        leaf_owner: &Keypair,
        expected_tree: Option<&Pubkey>,
    ) -> Result<(AssetProofRecord, Signature), WorkflowError> {
        let program_id = self.verify_program_id.ok_or_else(|| {
            WorkflowError::Instruction("no verification program configured".to_string())
        })?;

        let record = self.fetch_proof(asset_id).await?;
        if let Some(expected) = expected_tree {
            if *expected != record.tree {
                return Err(ProofError::TreeMismatch {
                    asset_tree: expected.to_string(),
                    proof_tree: record.tree.to_string(),
                }
                .into());
            }
        }
        let owner = leaf_owner.pubkey();
        if record.leaf_owner != owner {
            return Err(ProofError::OwnerMismatch {
                indexed: record.leaf_owner.to_string(),
                signer: owner.to_string(),
            }
            .into());
        }

        let args = VerifyArgs::from_record(&record)?;
        let instruction = verify_ix(
            &program_id,
            &record.leaf_owner,
            &record.leaf_delegate,
            &record.tree,
            &args,
            &record.proof_path,
        )?;

        let payer = self.payer.pubkey();
        let mut template = TransactionTemplate::new(&[instruction], &payer);
        let signature = if owner == payer {
            self.submitter.submit(&mut template, &[self.payer.as_ref()]).await?
        } else {
            self.submitter
                .submit(&mut template, &[self.payer.as_ref(), leaf_owner])
                .await?
        };
        Ok((record, signature))
    }

    /// Runs the plan in order. Never panics or returns early: every step gets a report.
    pub async fn run(&self, plan: WorkflowPlan) -> WorkflowReport {
        let WorkflowPlan {
            tree,
            collection,
            asset,
            leaf_owner,
            verify,
        } = plan;

        let mut report = WorkflowReport::default();
        let mut satisfied: Vec<Precondition> = Vec::new();

        // Tree
        let outcome = match tree {
            TreePlan::Existing(address) => {
                report.tree = Some(TreeAccounts::for_tree(address));
                StepOutcome::Provided
            }
            TreePlan::Create { tree, shape } => match self.create_tree(&tree, shape).await {
                Ok((accounts, signature)) => {
                    report.tree = Some(accounts);
                    StepOutcome::Completed { signature }
                }
                Err(e) => StepOutcome::failed(&e),
            },
        };
        settle(&mut report, &mut satisfied, Step::CreateTree, outcome);

        // Collection
        let outcome = match unmet(Step::CreateCollection, &satisfied) {
            Some(unmet) => StepOutcome::Skipped { unmet },
            None => match collection {
                CollectionPlan::Existing(mint) => {
                    report.collection = Some(CollectionAccounts::for_mint(mint, &self.payer.pubkey()));
                    StepOutcome::Provided
                }
                CollectionPlan::Create { mint, metadata } => {
                    match self.create_collection(&mint, &metadata).await {
                        Ok((accounts, signature)) => {
                            report.collection = Some(accounts);
                            StepOutcome::Completed { signature }
                        }
                        Err(e) => StepOutcome::failed(&e),
                    }
                }
            },
        };
        settle(&mut report, &mut satisfied, Step::CreateCollection, outcome);

        // Mint
        let outcome = match (unmet(Step::MintAsset, &satisfied), report.tree, report.collection) {
            (Some(unmet), _, _) => StepOutcome::Skipped { unmet },
            (None, Some(tree_accounts), Some(collection_accounts)) => match asset {
                AssetPlan::Existing(asset_id) => {
                    report.asset_id = Some(asset_id);
                    StepOutcome::Provided
                }
                AssetPlan::Mint(metadata) => {
                    match self
                        .mint_asset(&tree_accounts, &collection_accounts, &leaf_owner.pubkey(), &metadata)
                        .await
                    {
                        Ok(minted) => {
                            report.asset_id = Some(minted.asset_id);
                            StepOutcome::Completed {
                                signature: minted.signature,
                            }
                        }
                        Err(e) => StepOutcome::failed(&e),
                    }
                }
            },
            (None, None, _) => StepOutcome::Skipped {
                unmet: Precondition::TreeCreated,
            },
            (None, _, None) => StepOutcome::Skipped {
                unmet: Precondition::CollectionCreated,
            },
        };
        settle(&mut report, &mut satisfied, Step::MintAsset, outcome);

        if !verify {
            return report;
        }

        // Verify
        let outcome = match (unmet(Step::VerifyAsset, &satisfied), report.asset_id) {
            (None, Some(asset_id)) => {
                let expected_tree = report.tree.map(|t| t.tree);
                match self
                    .verify_asset(&asset_id, &leaf_owner, expected_tree.as_ref())
                    .await
                {
                    Ok((record, signature)) => {
                        report.proof = Some(record);
                        StepOutcome::Completed { signature }
                    }
                    Err(e) => StepOutcome::failed(&e),
                }
            }
            (Some(unmet), _) => StepOutcome::Skipped { unmet },
            (None, None) => StepOutcome::Skipped {
                unmet: Precondition::AssetMinted,
            },
        };
        settle(&mut report, &mut satisfied, Step::VerifyAsset, outcome);

        report
    }
}

fn unmet(step: Step, satisfied: &[Precondition]) -> Option<Precondition> {
    step.requires()
        .iter()
        .copied()
        .find(|p| !satisfied.contains(p))
}

fn settle(
    report: &mut WorkflowReport,
    satisfied: &mut Vec<Precondition>,
    step: Step,
    outcome: StepOutcome,
) {
    match &outcome {
        StepOutcome::Completed { signature } => {
            tracing::info!(?step, %signature, "step completed");
        }
        StepOutcome::Provided => tracing::info!(?step, "step provided by plan"),
        StepOutcome::Failed { error, signature } => {
            tracing::error!(?step, %error, signature = ?signature, "step failed, halting dependent steps");
        }
        StepOutcome::Skipped { unmet } => tracing::warn!(?step, %unmet, "step skipped"),
    }
    if matches!(outcome, StepOutcome::Completed { .. } | StepOutcome::Provided) {
        if let Some(p) = step.establishes() {
            satisfied.push(p);
        }
    }
    report.record(step, outcome);
}
