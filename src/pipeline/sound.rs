// One sound layer on a pad, and where its audio comes from.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Predefined, // shipped with the app, usually a relative path on disk
    Uploaded,   // user upload, lives in object storage
    Live,       // live recording, also in object storage
}

/// Where a sound's bytes originally live. Decided once, when the sound
/// enters the core, so nothing downstream has to sniff strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoredPath {
    /// relative to the project directory, fetchable as-is
    Local(String),
    /// an object in the storage backend; needs a signed url to fetch
    Storage(String),
}

const STORAGE_SCHEMES: [&str; 3] = ["gs://", "s3://", "storage://"];

impl StoredPath {
    pub fn classify(kind: SourceKind, raw: &str) -> Self {
        let raw = raw.trim();
        match kind {
            // uploads and recordings only ever live in the bucket
            SourceKind::Uploaded | SourceKind::Live => StoredPath::Storage(raw.to_string()),
            SourceKind::Predefined => {
                if STORAGE_SCHEMES.iter().any(|s| raw.starts_with(s)) {
                    StoredPath::Storage(raw.to_string())
                } else {
                    StoredPath::Local(raw.to_string())
                }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StoredPath::Local(p) | StoredPath::Storage(p) => p,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PadSound {
    pub sound_id: String, // join key for pads, colors and the buffer cache
    pub sound_name: String,
    pub stored_path: Option<StoredPath>,
    pub playable_url: Option<String>, // already resolved, if someone did that for us
    pub kind: SourceKind,
    pub color: String, // palette token
}

impl PadSound {
    pub fn new(sound_id: impl Into<String>, sound_name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            sound_id: sound_id.into(),
            sound_name: sound_name.into(),
            stored_path: None,
            playable_url: None,
            kind,
            color: String::new(),
        }
    }

    pub fn with_stored_path(mut self, raw: &str) -> Self {
        self.stored_path = Some(StoredPath::classify(self.kind, raw));
        self
    }

    pub fn with_playable_url(mut self, url: impl Into<String>) -> Self {
        self.playable_url = Some(url.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_paths_are_local_unless_they_name_a_bucket() {
        assert_eq!(
            StoredPath::classify(SourceKind::Predefined, "sounds/kick.wav"),
            StoredPath::Local("sounds/kick.wav".into())
        );
        assert_eq!(
            StoredPath::classify(SourceKind::Predefined, "gs://bucket/kick.wav"),
            StoredPath::Storage("gs://bucket/kick.wav".into())
        );
    }

    #[test]
    fn uploads_are_always_storage() {
        // no scheme, but it's still an object path
        assert_eq!(
            StoredPath::classify(SourceKind::Uploaded, "sounds/u123/clap.wav"),
            StoredPath::Storage("sounds/u123/clap.wav".into())
        );
        assert!(matches!(
            StoredPath::classify(SourceKind::Live, "live/rec1.wav"),
            StoredPath::Storage(_)
        ));
    }
}
