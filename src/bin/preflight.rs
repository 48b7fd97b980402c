use clap::Parser;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::pubkey::Pubkey;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signer::Signer;

use compressed_nft_client::domain::instructions::pda::{
    ACCOUNT_COMPRESSION_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID, NOOP_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID,
};
use compressed_nft_client::domain::proof::AssetProofRecord;
use compressed_nft_client::infra::config::Settings;
use compressed_nft_client::infra::indexer::{AssetIndex, ReadApiClient};
use compressed_nft_client::infra::solana::load_keypair;

/// Checks the cluster, payer and programs before running the workflow.
///
/// Requires SOLANA_RPC_URL. READAPI_RPC_URL, VERIFY_PROGRAM_ID and
/// PAYER_KEYPAIR (default ~/.config/solana/id.json) are optional.
#[derive(Parser, Debug)]
#[command(name = "preflight")]
struct Args {
    /// Also fetch and decode this asset's proof from the indexer
    #[arg(long)]
    asset: Option<Pubkey>,
}

async fn check_program(client: &RpcClient, label: &str, program_id: &Pubkey) -> anyhow::Result<()> {
    let account = client
        .get_account(program_id)
        .await
        .map_err(|e| anyhow::anyhow!("{} program not found on cluster: {} ({})", label, program_id, e))?;
    if !account.executable {
        eprintln!("  Warning: {} account {} exists but is not marked executable.", label, program_id);
    } else {
        println!("  {} program {} is deployed + executable.", label, program_id);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Args { asset } = Args::parse();

    // Force-read config (nice error messages if missing)
    let settings = Settings::from_env()?;

    println!("> Preflight:");
    println!("  SOLANA_RPC_URL={}", settings.rpc_url);
    println!("  READAPI_RPC_URL={}", settings.readapi_url);
    println!(
        "  Tree: depth={} buffer={} canopy={}",
        settings.tree.max_depth, settings.tree.max_buffer_size, settings.tree.canopy_depth
    );

    let payer = load_keypair(&settings.payer_keypair)?;
    let client = RpcClient::new_with_commitment(settings.rpc_url.clone(), CommitmentConfig::confirmed());

    // Basic RPC connectivity
    let version = client.get_version().await?;
    println!("  RPC version: {}", version.solana_core);

    // Payer balance
    let balance_lamports = client.get_balance(&payer.pubkey()).await?;
    let sol = balance_lamports as f64 / 1_000_000_000_f64;
    println!("  Payer: {}", payer.pubkey());
    println!("  Payer balance: {} lamports (~{:.6} SOL)", balance_lamports, sol);
    if balance_lamports < 100_000_000 {
        eprintln!("  Warning: payer balance looks low; tree allocation may fail.");
    }

    for (label, program_id) in [
        ("Bubblegum", BUBBLEGUM_PROGRAM_ID),
        ("Account compression", ACCOUNT_COMPRESSION_PROGRAM_ID),
        ("Noop", NOOP_PROGRAM_ID),
        ("Token metadata", TOKEN_METADATA_PROGRAM_ID),
    ] {
        check_program(&client, label, &program_id).await?;
    }

    match settings.verify_program_id {
        Some(program_id) => check_program(&client, "Verify", &program_id).await?,
        None => eprintln!("  Warning: VERIFY_PROGRAM_ID not set; `verify` will be unavailable."),
    }

    // Indexer round trip
    if let Some(asset_id) = asset {
        let indexer = ReadApiClient::new(settings.readapi_url.clone(), settings.indexer_timeout)?;
        let snapshot = indexer.get_asset(&asset_id.to_string()).await?;
        let proof = indexer.get_asset_proof(&asset_id.to_string()).await?;
        let record = AssetProofRecord::from_indexer(&asset_id, &snapshot, &proof)?;
        println!(
            "  Indexer returned proof for {} (tree {}, leaf {}, depth {}, owner {}).",
            asset_id,
            record.tree,
            record.leaf_index,
            record.depth(),
            record.leaf_owner
        );
    }

    println!("> Preflight OK.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_flag_parses_a_pubkey() {
        let asset = Pubkey::new_unique();
        let args = Args::try_parse_from(["preflight", "--asset", &asset.to_string()]).unwrap();
        assert_eq!(args.asset, Some(asset));
        assert_eq!(Args::try_parse_from(["preflight"]).unwrap().asset, None);
    }

    #[test]
    fn bad_asset_flag_is_rejected() {
        assert!(Args::try_parse_from(["preflight", "--asset", "not-a-key"]).is_err());
        assert!(Args::try_parse_from(["preflight", "--asset"]).is_err());
    }
}
