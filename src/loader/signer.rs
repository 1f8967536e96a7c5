// Signed download urls for objects in the storage backend.

use std::time::Duration;

use serde::Deserialize;

/// Turns a storage path into a time-limited download url. `None` means
/// "couldn't" (not found, backend down, no signer configured); callers move
/// on to whatever they'd try next.
pub trait UrlSigner: Send + Sync {
    fn sign(&self, stored_path: &str) -> Option<String>;
}

/// For setups without a storage backend.
#[derive(Debug, Default)]
pub struct NoSigner;

impl UrlSigner for NoSigner {
    fn sign(&self, _stored_path: &str) -> Option<String> {
        None
    }
}

#[derive(Deserialize)]
struct SignResponse {
    url: Option<String>,
}

/// Asks an HTTP endpoint: `GET <endpoint>?path=<stored path>`, expecting
/// `{"url": "..."}` back.
pub struct HttpSigner {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpSigner {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl UrlSigner for HttpSigner {
    fn sign(&self, stored_path: &str) -> Option<String> {
        let response = match self.agent.get(&self.endpoint).query("path", stored_path).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => {
                log::debug!("signer: {stored_path} not found");
                return None;
            }
            Err(e) => {
                log::warn!("signer request for {stored_path} failed: {e}");
                return None;
            }
        };
        match response.into_json::<SignResponse>() {
            Ok(SignResponse { url: Some(url) }) if !url.is_empty() => Some(url),
            Ok(_) => None,
            Err(e) => {
                log::warn!("signer returned junk for {stored_path}: {e}");
                None
            }
        }
    }
}
