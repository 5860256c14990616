//! Best-effort public address lookup for the hello event.
//!
//! A failed or slow lookup never blocks the channel: the hello is sent with
//! `client_public_ip: null` instead.

use crate::error::{WsError, WsResult};
use crate::transport::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default lookup endpoint.
pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org?format=json";
/// Default lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Source of the caller's public address.
pub trait PublicIpLookup: Send + Sync {
    /// `None` on any failure.
    fn lookup(&self) -> BoxFuture<'_, Option<String>>;
}

/// Lookup disabled; the hello always carries `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPublicIp;

impl PublicIpLookup for NoPublicIp {
    fn lookup(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async { None })
    }
}

/// Fixed address, mostly for tests and pinned deployments.
#[derive(Debug, Clone)]
pub struct StaticPublicIp(pub String);

impl PublicIpLookup for StaticPublicIp {
    fn lookup(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move { Some(self.0.clone()) })
    }
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// HTTP lookup against a third-party address echo service.
pub struct HttpPublicIpLookup {
    client: Client,
    url: String,
}

impl HttpPublicIpLookup {
    /// Create a lookup with its own short timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> WsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WsError::Lookup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch(&self) -> WsResult<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WsError::Lookup(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WsError::Lookup(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WsError::Lookup(format!("Failed to read body: {e}")))?;

        parse_ip_body(&body)
    }
}

impl PublicIpLookup for HttpPublicIpLookup {
    fn lookup(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            match self.fetch().await {
                Ok(ip) => Some(ip),
                Err(e) => {
                    debug!(error = %e, url = %self.url, "Public address lookup failed");
                    None
                }
            }
        })
    }
}

/// Accept `{"ip": "..."}` or a bare address body.
fn parse_ip_body(body: &str) -> WsResult<String> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        let parsed: IpResponse = serde_json::from_str(trimmed)?;
        return non_empty(parsed.ip.trim());
    }
    non_empty(trimmed)
}

fn non_empty(ip: &str) -> WsResult<String> {
    if ip.is_empty() {
        Err(WsError::Lookup("empty address".to_string()))
    } else {
        Ok(ip.to_string())
    }
}
