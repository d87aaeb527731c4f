//! bcoin JSON-RPC client.
//!
//! # Responsibilities
//! - POST JSON-RPC requests to the node with API-key basic auth
//! - Decode header responses into `Header` values, verifying the hash
//! - Map "unknown"/non-200 responses to `None` rather than errors

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use crate::bitcoin::source::SourceChain;
use crate::bitcoin::types::{Digest, Header, SourceError, SourceResult, SourceTransaction};
use crate::config::SourceConfig;

#[derive(Debug, Deserialize)]
struct HeaderInfo {
    hash: String,
    height: u64,
}

#[derive(Debug, Deserialize)]
struct BlockRef {
    hash: String,
}

/// HTTP client for a bcoin node.
pub struct BcoinClient {
    http: reqwest::Client,
    url: Url,
    api_key: String,
    closed: AtomicBool,
}

impl BcoinClient {
    /// Create a client for the configured node.
    pub fn new(config: &SourceConfig) -> SourceResult<Self> {
        let url: Url = config
            .url
            .parse()
            .map_err(|e| SourceError::Decode(format!("invalid source URL '{}': {}", config.url, e)))?;

        // One connection per request; bcoin drops idle keep-alive sockets.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .pool_max_idle_per_host(0)
            .build()?;

        tracing::info!(url = %url, "Source chain client initialized");

        Ok(Self {
            http,
            url,
            api_key: config.api_key.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Dispatch a JSON-RPC call, returning the HTTP status and the `result` member.
    async fn post(&self, method: &'static str, params: Value) -> SourceResult<(StatusCode, Option<Value>)> {
        tracing::debug!(method, "sending bcoin post request");
        let resp = self
            .http
            .post(self.url.clone())
            .basic_auth("x", Some(&self.api_key))
            .json(&json!({ "method": method, "params": params }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        let value: Value = serde_json::from_slice(&body).map_err(|_| {
            tracing::error!(status = %status, "Failed to unwrap json from response");
            SourceError::NotJson { status: status.as_u16() }
        })?;

        if status != StatusCode::OK {
            tracing::error!(method, status = %status, body = %value, "Unexpected status");
        }

        let result = match value {
            Value::Object(mut map) if map.contains_key("result") => map.remove("result"),
            other => Some(other),
        };
        Ok((status, result.filter(|v| !v.is_null())))
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> SourceResult<T> {
        serde_json::from_value(value).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SourceChain for BcoinClient {
    async fn header_by_hash(&self, digest: &Digest) -> SourceResult<Option<Header>> {
        let hash_hex = digest.to_rpc_hex();
        tracing::debug!(hash = %hash_hex, "retrieving header info");

        let (status, info) = self.post("getblockheader", json!([hash_hex, true])).await?;
        let info: HeaderInfo = match (status, info) {
            (StatusCode::OK, Some(v)) => Self::decode(v)?,
            _ => return Ok(None),
        };

        let (status, raw) = self.post("getblockheader", json!([hash_hex, false])).await?;
        let raw_hex: String = match (status, raw) {
            (StatusCode::OK, Some(v)) => Self::decode(v)?,
            _ => return Ok(None),
        };
        let raw = hex::decode(&raw_hex)
            .map_err(|e| SourceError::Decode(format!("invalid header hex: {}", e)))?;

        let header = Header::from_raw(&raw, info.height)?;
        let reported = Digest::from_rpc_hex(&info.hash)?;
        if header.hash != reported {
            return Err(SourceError::HashMismatch {
                reported,
                computed: header.hash,
            });
        }
        Ok(Some(header))
    }

    async fn header_by_height(&self, height: u64) -> SourceResult<Option<Header>> {
        tracing::debug!(height, "retrieving header at height");
        // verbose, no transactions
        let (status, block) = self.post("getblockbyheight", json!([height, true, false])).await?;
        let block: BlockRef = match (status, block) {
            (StatusCode::OK, Some(v)) => Self::decode(v)?,
            _ => return Ok(None),
        };
        let digest = Digest::from_rpc_hex(&block.hash)?;
        self.header_by_hash(&digest).await
    }

    async fn chain_tips(&self) -> SourceResult<Vec<Digest>> {
        let (status, tips) = self.post("getchaintips", json!([])).await?;
        if status != StatusCode::OK {
            return Err(SourceError::Status {
                method: "getchaintips",
                status: status.as_u16(),
            });
        }
        let tips: Vec<BlockRef> = match tips {
            Some(v) => Self::decode(v)?,
            None => Vec::new(),
        };
        tips.iter().map(|t| Digest::from_rpc_hex(&t.hash)).collect()
    }

    async fn transaction(&self, txid: &Digest) -> SourceResult<Option<SourceTransaction>> {
        let route = self
            .url
            .join(&format!("tx/{}", txid.to_rpc_hex()))
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        tracing::debug!(route = %route, "get request");

        let resp = self
            .http
            .get(route)
            .basic_auth("x", Some(&self.api_key))
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Ok(None);
        }
        let tx = resp.json::<SourceTransaction>().await?;
        Ok(Some(tx))
    }

    async fn close(&self) -> SourceResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("closing source chain http session");
        }
        Ok(())
    }
}

impl std::fmt::Debug for BcoinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcoinClient").field("url", &self.url.as_str()).finish()
    }
}
