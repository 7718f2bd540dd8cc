//! Plain HTTP asset downloader.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use scrapefin_core::RemoteError;
use scrapefin_core::client::AssetFetcher;

use crate::EngineConfig;

pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, RemoteError> {
        Self::new(Duration::from_secs(config.http_timeout_secs))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Map a non-success status into the remote taxonomy.
fn status_error(status: StatusCode) -> Option<RemoteError> {
    match status {
        s if s.is_success() => None,
        StatusCode::NOT_FOUND | StatusCode::GONE => Some(RemoteError::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(RemoteError::Unauthorized),
        s => Some(RemoteError::Provider(format!("server returned {s}"))),
    }
}

#[async_trait::async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch_asset(&self, source_uri: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(url = %source_uri, "asset request");

        let resp = self
            .client
            .get(source_uri)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if let Some(err) = status_error(resp.status()) {
            return Err(err);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(format!("read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
