//! Centralized configuration (environment variables + defaults).

use anyhow::{anyhow, Context};
use std::str::FromStr;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;

const DEFAULT_KEYPAIR_PATH: &str = "~/.config/solana/id.json";

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> anyhow::Result<String> {
    optional(name).ok_or_else(|| anyhow!("{} must be set", name))
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} must be a valid value ({}): {}", name, v, e)),
        None => Ok(default),
    }
}

/// Solana RPC URL (required).
pub fn solana_rpc_url() -> anyhow::Result<String> {
    required("SOLANA_RPC_URL")
}

/// Indexing service (Read API) URL. Falls back to the Solana RPC URL, since most
/// providers serve both from the same endpoint.
pub fn readapi_rpc_url() -> anyhow::Result<String> {
    match optional("READAPI_RPC_URL") {
        Some(url) => Ok(url),
        None => solana_rpc_url(),
    }
}

/// Program exposing the `verify` instruction (required for verification).
///
/// Set this to the Program ID you deployed (e.g. output of `anchor deploy`).
pub fn verify_program_id() -> anyhow::Result<Pubkey> {
    let raw = required("VERIFY_PROGRAM_ID")?;
    Pubkey::from_str(raw.trim()).context("VERIFY_PROGRAM_ID is not a valid pubkey")
}

pub fn payer_keypair_path() -> String {
    let raw = optional("PAYER_KEYPAIR").unwrap_or_else(|| DEFAULT_KEYPAIR_PATH.to_string());
    shellexpand::tilde(&raw).into_owned()
}

/// Leaf owner key file. `None` means the payer receives the asset.
pub fn receiver_keypair_path() -> Option<String> {
    optional("RECEIVER_KEYPAIR").map(|raw| shellexpand::tilde(&raw).into_owned())
}

/// Submission settings for the retry submitter.
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub max_poll_errors: u32,
    pub skip_preflight: bool,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            poll_interval: Duration::from_millis(500),
            max_poll_errors: 10,
            skip_preflight: false,
        }
    }
}

pub fn submit_settings() -> anyhow::Result<SubmitSettings> {
    let defaults = SubmitSettings::default();
    Ok(SubmitSettings {
        max_attempts: parsed("SUBMIT_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
        poll_interval: Duration::from_millis(parsed(
            "CONFIRM_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?),
        max_poll_errors: parsed("CONFIRM_MAX_POLL_ERRORS", defaults.max_poll_errors)?.max(1),
        skip_preflight: parsed("SKIP_PREFLIGHT", defaults.skip_preflight)?,
    })
}

/// Shape of the Merkle tree allocated by `create-tree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSettings {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
}

pub fn tree_settings() -> anyhow::Result<TreeSettings> {
    let max_depth: u32 = parsed("TREE_MAX_DEPTH", 14)?;
    let max_buffer_size: u32 = parsed("TREE_MAX_BUFFER_SIZE", 64)?;
    let canopy_depth: u32 = parsed("TREE_CANOPY_DEPTH", max_depth.saturating_sub(4))?;
    Ok(TreeSettings {
        max_depth,
        max_buffer_size,
        canopy_depth,
    })
}

pub fn collection_size() -> anyhow::Result<u64> {
    parsed("COLLECTION_SIZE", 50)
}

pub fn indexer_timeout() -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(parsed("INDEXER_TIMEOUT_SECS", 30)?))
}

/// Everything the CLI needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: String,
    pub readapi_url: String,
    pub verify_program_id: Option<Pubkey>,
    pub payer_keypair: String,
    pub receiver_keypair: Option<String>,
    pub submit: SubmitSettings,
    pub tree: TreeSettings,
    pub collection_size: u64,
    pub indexer_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        // The program id is only needed for verification; report a bad value eagerly.
        let verify_program_id = match optional("VERIFY_PROGRAM_ID") {
            Some(_) => Some(verify_program_id()?),
            None => None,
        };

        Ok(Self {
            rpc_url: solana_rpc_url()?,
            readapi_url: readapi_rpc_url()?,
            verify_program_id,
            payer_keypair: payer_keypair_path(),
            receiver_keypair: receiver_keypair_path(),
            submit: submit_settings()?,
            tree: tree_settings()?,
            collection_size: collection_size()?,
            indexer_timeout: indexer_timeout()?,
        })
    }
}
