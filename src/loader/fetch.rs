// Getting raw bytes for a playable url.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoadError, LoadResult};

/// Fetch the bytes behind a playable url. Called from loader threads, never
/// from the tick path, so it is allowed to block.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> LoadResult<Vec<u8>>;
}

/// `http(s)://` goes over the network, `file://` and bare relative paths are
/// read from disk (relative to the project directory).
pub struct DefaultFetcher {
    root: PathBuf,
    agent: ureq::Agent,
}

impl DefaultFetcher {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn fetch_remote(&self, url: &str) -> LoadResult<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(|e| LoadError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    fn fetch_local(&self, path: &str) -> LoadResult<Vec<u8>> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|source| LoadError::Io {
            path: full.display().to_string(),
            source,
        })
    }
}

impl Fetch for DefaultFetcher {
    fn fetch(&self, url: &str) -> LoadResult<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            log::debug!("fetching {url}");
            self.fetch_remote(url)
        } else if let Some(path) = url.strip_prefix("file://") {
            self.fetch_local(path)
        } else {
            self.fetch_local(url)
        }
    }
}
