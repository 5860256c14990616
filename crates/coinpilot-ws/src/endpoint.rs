//! Client identity and transport URL derivation.

use crate::error::{WsError, WsResult};
use reqwest::Url;
use uuid::Uuid;

/// Opaque client identifier, generated once per process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Length of the random suffix after `client_`.
    const SUFFIX_LEN: usize = 9;

    /// Generate a fresh id such as `client_3f9a0c21b`.
    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("client_{}", &random[..Self::SUFFIX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the channel URL from the hosting origin.
///
/// `http` becomes `ws` and `https` becomes `wss`; host and port are kept and
/// the path is replaced by `/ws/{client_id}`.
pub fn transport_url(origin: &str, client_id: &ClientId) -> WsResult<String> {
    let mut url =
        Url::parse(origin).map_err(|e| WsError::InvalidOrigin(format!("{origin}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(WsError::InvalidOrigin(format!(
                "{origin}: unsupported scheme {other}"
            )))
        }
    };

    if url.host_str().is_none() {
        return Err(WsError::InvalidOrigin(format!("{origin}: missing host")));
    }

    url.set_scheme(scheme)
        .map_err(|()| WsError::InvalidOrigin(format!("{origin}: cannot switch to {scheme}")))?;
    url.set_path(&format!("/ws/{}", client_id.as_str()));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}
