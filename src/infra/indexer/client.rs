//! JSON-RPC client for the indexing service that serves compressed asset state and proofs.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::errors::FetchError;
use crate::infra::indexer::types::{AssetIdParams, AssetProof, AssetSnapshot, RpcRequest, RpcResponse};

/// Read-only queries against the indexer. Both calls are idempotent.
#[async_trait]
pub trait AssetIndex: Send + Sync {
    async fn get_asset(&self, asset_id: &str) -> Result<AssetSnapshot, FetchError>;

    async fn get_asset_proof(&self, asset_id: &str) -> Result<AssetProof, FetchError>;
}

pub struct ReadApiClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl ReadApiClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    fn request_id(&self) -> String {
        format!("cnft-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, asset_id: &str) -> Result<T, FetchError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            id: self.request_id(),
            params: AssetIdParams { id: asset_id },
        };

        let response = self.http.post(&self.url).json(&request).send().await.map_err(|e| {
            tracing::warn!(method, asset_id, error = %e, "indexer request failed");
            FetchError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(method, asset_id, status = status.as_u16(), "indexer answered with an error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let envelope: RpcResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(method, asset_id, error = %e, "indexer response did not decode");
            FetchError::Decode(e.to_string())
        })?;

        if let Some(err) = envelope.error {
            tracing::warn!(method, asset_id, code = err.code, message = %err.message, "indexer returned an error");
            return Err(FetchError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        envelope.result.ok_or_else(|| FetchError::Absent {
            method: method.to_string(),
            id: asset_id.to_string(),
        })
    }
}

#[async_trait]
impl AssetIndex for ReadApiClient {
    async fn get_asset(&self, asset_id: &str) -> Result<AssetSnapshot, FetchError> {
        self.call("getAsset", asset_id).await
    }

    async fn get_asset_proof(&self, asset_id: &str) -> Result<AssetProof, FetchError> {
        self.call("getAssetProof", asset_id).await
    }
}
