// Read-only sound metadata: what a sound id is called and where it lives.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::colors::ColorAllocator;
use super::sound::{PadSound, SourceKind};
use crate::error::StoreResult;
use crate::loader::sample_loader::index_wav_in_dir;

const CATALOG_FILE: &str = "catalog.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stored_path: Option<String>,
    pub kind: SourceKind,
}

impl SoundInfo {
    /// The pad-ready version of this sound, colored by `colors`.
    pub fn to_pad_sound(&self, colors: &mut ColorAllocator) -> PadSound {
        let sound = PadSound::new(&self.id, &self.name, self.kind).with_color(colors.color_for(&self.id));
        match &self.stored_path {
            Some(path) => sound.with_stored_path(path),
            None => sound,
        }
    }
}

pub trait SoundCatalog {
    fn lookup(&self, sound_id: &str) -> Option<SoundInfo>;
    fn entries(&self) -> Vec<SoundInfo>;
}

/// Predefined sounds are the WAVs in the sounds directory (id = file stem).
/// Uploaded and live sounds are listed in `<sounds dir>/catalog.json`.
#[derive(Clone, Debug, Default)]
pub struct DirectoryCatalog {
    entries: Vec<SoundInfo>,
    by_id: HashMap<String, usize>,
}

impl DirectoryCatalog {
    pub fn open(project_dir: &Path, sounds_dir: &str) -> StoreResult<Self> {
        let dir = project_dir.join(sounds_dir);
        let mut entries = Vec::new();

        for path in index_wav_in_dir(&dir)? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(file) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            entries.push(SoundInfo {
                id: stem.to_string(),
                name: stem.replace(['_', '-'], " "),
                stored_path: Some(format!("{sounds_dir}/{file}")),
                kind: SourceKind::Predefined,
            });
        }

        let listed = dir.join(CATALOG_FILE);
        if listed.exists() {
            let data = std::fs::read_to_string(&listed)?;
            let extra: Vec<SoundInfo> = serde_json::from_str(&data)?;
            log::info!("catalog: {} extra sounds from {:?}", extra.len(), listed);
            entries.extend(extra);
        }

        log::info!("catalog: {} sounds", entries.len());
        Ok(Self::from_entries(entries))
    }

    /// Later duplicates of an id are ignored.
    pub fn from_entries(entries: Vec<SoundInfo>) -> Self {
        let mut catalog = Self::default();
        for info in entries {
            if catalog.by_id.contains_key(&info.id) {
                log::warn!("catalog: duplicate sound id {}, keeping the first", info.id);
                continue;
            }
            catalog.by_id.insert(info.id.clone(), catalog.entries.len());
            catalog.entries.push(info);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SoundCatalog for DirectoryCatalog {
    fn lookup(&self, sound_id: &str) -> Option<SoundInfo> {
        self.by_id.get(sound_id).map(|&i| self.entries[i].clone())
    }

    fn entries(&self) -> Vec<SoundInfo> {
        self.entries.clone()
    }
}
