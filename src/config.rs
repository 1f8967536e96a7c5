//! Project configuration
//!
//! Stored as YAML at `<project>/.padloop/config.yaml`. Every section has
//! defaults, so a missing file, a missing section or a missing key all work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::shared::{DEFAULT_BPM, DEFAULT_COLS, DEFAULT_ROWS};

pub const PADLOOP_DIR: &str = ".padloop";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridSettings,
    pub gesture: GestureSettings,
    pub playback: PlaybackSettings,
    pub loader: LoaderSettings,
    pub storage: StorageSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub rows: usize,
    pub cols: usize,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { rows: DEFAULT_ROWS, cols: DEFAULT_COLS }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub long_press_ms: u64,
    pub swipe_threshold_px: f32,
    /// How many pointer pixels one terminal column is worth
    pub cell_width_px: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            long_press_ms: 500,
            swipe_threshold_px: 30.0,
            cell_width_px: 8.0,
        }
    }
}

impl GestureSettings {
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

/// Which layers of a pad sound when its step comes up. A pad's step plays
/// its whole stack of layers; `current_sound_index` only picks what the pad
/// shows and what a swipe moves. `Current` is the one-layer-at-a-time
/// alternative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerMode {
    /// only the layer at `current_sound_index`
    Current,
    /// every layer on the pad at once
    #[default]
    All,
}

/// What to do with a buffer that finishes loading after its step has passed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatePolicy {
    /// discard it once its step window (one step duration) is over
    #[default]
    Drop,
    /// play it whenever it shows up
    Play,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub default_bpm: f32,
    pub mute_ramp_ms: u64,
    pub layer_mode: LayerMode,
    pub late_policy: LatePolicy,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM,
            mute_ramp_ms: 100,
            layer_mode: LayerMode::All,
            late_policy: LatePolicy::Drop,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub worker_threads: usize,
    /// Decode target when there is no output device to ask
    pub fallback_sample_rate: u32,
    pub sounds_dir: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            fallback_sample_rate: 44100,
            sounds_dir: "sounds".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Endpoint that turns a storage path into a signed download url
    pub signer_endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { signer_endpoint: None, timeout_secs: 10 }
    }
}

// <project_dir>/.padloop/config.yaml
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PADLOOP_DIR).join(CONFIG_FILE)
}

/// Load a YAML config, falling back to defaults if the file is missing or bad.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("load_config: loaded {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save a config as YAML, creating parent directories as needed.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {:?}", parent))?;
    }
    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write config {:?}", path))?;
    log::info!("save_config: wrote {:?}", path);
    Ok(())
}
