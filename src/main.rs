use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use solana_program::pubkey::Pubkey;
use solana_sdk::signer::{keypair::Keypair, Signer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compressed_nft_client::app::{
    AssetPlan, CollectionPlan, StepOutcome, SubmitterConfig, TransactionSubmitter, TreePlan,
    Workflow, WorkflowPlan,
};
use compressed_nft_client::domain::instructions::{
    AssetMetadata, CollectionAccounts, CollectionMetadata, Creator, TreeAccounts, TreeShape,
};
use compressed_nft_client::infra::config::Settings;
use compressed_nft_client::infra::indexer::ReadApiClient;
use compressed_nft_client::infra::solana::{load_keypair, RpcLedger};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compressed NFT mint and verification client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate and initialize a new Merkle tree
    CreateTree,

    /// Create the collection NFT
    CreateCollection {
        #[command(flatten)]
        metadata: MetadataArgs,
    },

    /// Mint one compressed NFT into an existing tree and collection
    Mint {
        #[arg(long)]
        tree: Pubkey,

        #[arg(long)]
        collection: Pubkey,

        #[command(flatten)]
        metadata: MetadataArgs,
    },

    /// Fetch the asset's proof and verify it on-chain
    Verify {
        asset_id: Pubkey,
        /// Refuse to submit unless the proof is for this tree
        #[arg(long)]
        tree: Option<Pubkey>,
    },

    /// Print the decoded proof without submitting anything
    Proof {
        asset_id: Pubkey,
    },

    /// Run the whole workflow: tree, collection, mint, verify
    Run {
        /// Reuse an existing tree instead of creating one
        #[arg(long)]
        tree: Option<Pubkey>,

        /// Reuse an existing collection mint instead of creating one
        #[arg(long)]
        collection: Option<Pubkey>,

        /// Stop after minting
        #[arg(long)]
        skip_verify: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct MetadataArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    uri: Option<String>,

    #[arg(long)]
    seller_fee_basis_points: Option<u16>,
}

impl MetadataArgs {
    fn collection(&self, creator: Pubkey, size: u64) -> CollectionMetadata {
        CollectionMetadata {
            name: self.name.clone().unwrap_or_else(|| "Super Sweet NFT Collection".to_string()),
            symbol: self.symbol.clone().unwrap_or_else(|| "SSNC".to_string()),
            uri: self
                .uri
                .clone()
                .unwrap_or_else(|| "https://supersweetcollection.notarealurl/collection.json".to_string()),
            seller_fee_basis_points: self.seller_fee_basis_points.unwrap_or(100),
            creators: vec![Creator::sole(creator)],
            size,
        }
    }

    fn asset(&self) -> AssetMetadata {
        AssetMetadata {
            name: self.name.clone().unwrap_or_else(|| "apc".to_string()),
            symbol: self.symbol.clone().unwrap_or_else(|| "new coin".to_string()),
            uri: self
                .uri
                .clone()
                .unwrap_or_else(|| "https://supersweetcollection.notarealurl/test.json".to_string()),
            seller_fee_basis_points: self.seller_fee_basis_points.unwrap_or(10),
        }
    }
}

const NO_METADATA: MetadataArgs = MetadataArgs {
    name: None,
    symbol: None,
    uri: None,
    seller_fee_basis_points: None,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let settings = Settings::from_env()?;
    let payer = Arc::new(load_keypair(&settings.payer_keypair)?);
    let leaf_owner = match &settings.receiver_keypair {
        Some(path) => Arc::new(load_keypair(path)?),
        None => payer.clone(),
    };
    info!(payer = %payer.pubkey(), leaf_owner = %leaf_owner.pubkey(), rpc = %settings.rpc_url, "starting");

    let ledger = Arc::new(RpcLedger::new(settings.rpc_url.clone(), settings.submit.skip_preflight));
    let indexer = Arc::new(
        ReadApiClient::new(settings.readapi_url.clone(), settings.indexer_timeout)
            .context("Failed to build indexer client")?,
    );
    let submitter = TransactionSubmitter::new(ledger.clone(), SubmitterConfig::from(&settings.submit));
    let workflow = Workflow::new(
        ledger,
        indexer,
        submitter,
        payer.clone(),
        settings.verify_program_id,
    );

    let shape = TreeShape {
        max_depth: settings.tree.max_depth,
        max_buffer_size: settings.tree.max_buffer_size,
        canopy_depth: settings.tree.canopy_depth,
    };

    match cli.command {
        Command::CreateTree => {
            let tree = Keypair::new();
            let (accounts, signature) = workflow.create_tree(&tree, shape).await?;
            println!("tree: {}", accounts.tree);
            println!("tree authority: {}", accounts.tree_authority);
            println!("capacity: {}", shape.capacity());
            println!("signature: {}", signature);
        }
        Command::CreateCollection { metadata } => {
            let mint = Keypair::new();
            let metadata = metadata.collection(payer.pubkey(), settings.collection_size);
            let (accounts, signature) = workflow.create_collection(&mint, &metadata).await?;
            println!("collection mint: {}", accounts.mint);
            println!("metadata: {}", accounts.metadata);
            println!("master edition: {}", accounts.master_edition);
            println!("signature: {}", signature);
        }
        Command::Mint {
            tree,
            collection,
            metadata,
        } => {
            let tree = TreeAccounts::for_tree(tree);
            let collection = CollectionAccounts::for_mint(collection, &payer.pubkey());
            let minted = workflow
                .mint_asset(&tree, &collection, &leaf_owner.pubkey(), &metadata.asset())
                .await?;
            println!("asset id: {}", minted.asset_id);
            println!("leaf nonce: {}", minted.nonce);
            println!("signature: {}", minted.signature);
        }
        Command::Verify { asset_id, tree } => {
            let (record, signature) = workflow
                .verify_asset(&asset_id, &leaf_owner, tree.as_ref())
                .await?;
            println!("asset id: {}", record.asset_id);
            println!("tree: {}", record.tree);
            println!("leaf index: {}", record.leaf_index);
            println!("proof depth: {}", record.depth());
            println!("signature: {}", signature);
        }
        Command::Proof { asset_id } => {
            let record = workflow.fetch_proof(&asset_id).await?;
            println!("asset id: {}", record.asset_id);
            println!("tree: {}", record.tree);
            println!("root: {}", hex::encode(record.root));
            println!("data hash: {}", hex::encode(record.data_hash));
            println!("creator hash: {}", hex::encode(record.creator_hash));
            println!("leaf index: {}", record.leaf_index);
            println!("owner: {}", record.leaf_owner);
            println!("delegate: {}", record.leaf_delegate);
            for (i, node) in record.proof_path.iter().enumerate() {
                println!("  proof[{}]: {}", i, node.pubkey);
            }
        }
        Command::Run {
            tree,
            collection,
            skip_verify,
        } => {
            let plan = WorkflowPlan {
                tree: match tree {
                    Some(address) => TreePlan::Existing(address),
                    None => TreePlan::Create {
                        tree: Keypair::new(),
                        shape,
                    },
                },
                collection: match collection {
                    Some(mint) => CollectionPlan::Existing(mint),
                    None => CollectionPlan::Create {
                        mint: Keypair::new(),
                        metadata: NO_METADATA.collection(payer.pubkey(), settings.collection_size),
                    },
                },
                asset: AssetPlan::Mint(NO_METADATA.asset()),
                leaf_owner,
                verify: !skip_verify,
            };

            let report = workflow.run(plan).await;
            for step in &report.steps {
                match &step.outcome {
                    StepOutcome::Completed { signature } => println!("{:?}: ok ({})", step.step, signature),
                    StepOutcome::Provided => println!("{:?}: provided", step.step),
                    StepOutcome::Failed { error, signature } => match signature {
                        Some(sig) => println!("{:?}: FAILED ({}): {}", step.step, sig, error),
                        None => println!("{:?}: FAILED: {}", step.step, error),
                    },
                    StepOutcome::Skipped { unmet } => println!("{:?}: skipped ({} not met)", step.step, unmet),
                }
            }
            if let Some(tree) = report.tree {
                println!("tree: {}", tree.tree);
            }
            if let Some(collection) = report.collection {
                println!("collection mint: {}", collection.mint);
            }
            if let Some(asset_id) = report.asset_id {
                println!("asset id: {}", asset_id);
            }
            if let Some(failed) = report.first_failure() {
                anyhow::bail!("workflow halted at {:?}", failed.step);
            }
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "compressed_nft_client=debug,info"
    } else {
        "compressed_nft_client=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}
