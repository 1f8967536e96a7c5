// The saved shape of a fragment. The pad part is two sibling maps keyed by
// the pad index as a string:
//   padSounds: {"0": ["kick", "snare"], "5": ["hat"]}     (empty pads left out)
//   padStates: {"0": {"isActive": true, "currentSoundIndex": 1}, ...}  (every pad)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::SoundCatalog;
use super::colors::ColorAllocator;
use super::grid::{Pad, PadGrid, checked_dims};
use crate::shared::{DEFAULT_BPM, DEFAULT_COLS, DEFAULT_ROWS, PadId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PadState {
    pub is_active: bool,
    pub current_sound_index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_bpm")]
    pub bpm: f32,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_cols")]
    pub cols: usize,
    #[serde(default)]
    pub pad_sounds: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub pad_states: BTreeMap<String, PadState>,
}

fn default_bpm() -> f32 {
    DEFAULT_BPM
}

fn default_rows() -> usize {
    DEFAULT_ROWS
}

fn default_cols() -> usize {
    DEFAULT_COLS
}

impl FragmentRecord {
    pub fn from_grid(grid: &PadGrid, bpm: f32, title: impl Into<String>) -> Self {
        let mut pad_sounds = BTreeMap::new();
        let mut pad_states = BTreeMap::new();
        for pad in grid.pads() {
            let key = pad.id.0.to_string();
            if !pad.sounds.is_empty() {
                let ids = pad.sounds.iter().map(|s| s.sound_id.clone()).collect();
                pad_sounds.insert(key.clone(), ids);
            }
            pad_states.insert(
                key,
                PadState {
                    is_active: pad.is_active,
                    current_sound_index: pad.current_sound_index,
                },
            );
        }
        Self {
            id: None,
            title: title.into(),
            bpm,
            rows: grid.rows(),
            cols: grid.cols(),
            pad_sounds,
            pad_states,
        }
    }

    /// Rebuild the grid. Sound ids the catalog doesn't know are skipped and
    /// bad keys are ignored; the result always satisfies the grid invariants.
    pub fn to_grid(&self, catalog: &dyn SoundCatalog, colors: &mut ColorAllocator) -> PadGrid {
        let (rows, cols) = checked_dims(self.rows, self.cols);
        let n = rows * cols;
        let mut pads: Vec<Pad> = (0..n).map(|i| Pad::new(PadId(i))).collect();

        for (key, ids) in &self.pad_sounds {
            let Some(pad) = parse_index(key, n).map(|i| &mut pads[i]) else {
                log::warn!("fragment: ignoring sounds for bad pad key {key:?}");
                continue;
            };
            for id in ids {
                match catalog.lookup(id) {
                    Some(info) if pad.position_of(id).is_none() => {
                        pad.sounds.push(info.to_pad_sound(colors))
                    }
                    Some(_) => log::debug!("fragment: duplicate {id} on {}", pad.id),
                    None => log::warn!("fragment: unknown sound {id} on {}, dropping it", pad.id),
                }
            }
        }

        for (key, state) in &self.pad_states {
            if let Some(i) = parse_index(key, n) {
                pads[i].is_active = state.is_active;
                pads[i].current_sound_index = state.current_sound_index;
            }
        }

        PadGrid::from_pads(rows, cols, pads)
    }
}

fn parse_index(key: &str, n: usize) -> Option<usize> {
    key.parse::<usize>().ok().filter(|&i| i < n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::catalog::{DirectoryCatalog, SoundInfo};
    use crate::pipeline::sound::SourceKind;

    fn catalog() -> DirectoryCatalog {
        DirectoryCatalog::from_entries(
            ["kick", "snare", "hat"]
                .iter()
                .map(|id| SoundInfo {
                    id: id.to_string(),
                    name: id.to_string(),
                    stored_path: Some(format!("sounds/{id}.wav")),
                    kind: SourceKind::Predefined,
                })
                .collect(),
        )
    }

    fn sample_grid(colors: &mut ColorAllocator) -> PadGrid {
        let cat = catalog();
        let grid = PadGrid::new(4, 4).toggle_active(PadId(0));
        let kick = cat.lookup("kick").unwrap().to_pad_sound(colors);
        let snare = cat.lookup("snare").unwrap().to_pad_sound(colors);
        let hat = cat.lookup("hat").unwrap().to_pad_sound(colors);
        let grid = grid.add_or_remove_sound(PadId(0), kick).0;
        let grid = grid.add_or_remove_sound(PadId(0), snare).0;
        grid.add_or_remove_sound(PadId(5), hat).0
    }

    #[test]
    fn schema_is_two_sibling_maps() {
        let mut colors = ColorAllocator::with_seed(1);
        let record = FragmentRecord::from_grid(&sample_grid(&mut colors), 96.0, "beat");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["padSounds"]["0"], serde_json::json!(["kick", "snare"]));
        assert_eq!(json["padSounds"]["5"], serde_json::json!(["hat"]));
        assert!(json["padSounds"].get("1").is_none()); // empty pads omitted
        assert_eq!(json["padStates"].as_object().unwrap().len(), 16); // every pad listed
        assert_eq!(
            json["padStates"]["0"],
            serde_json::json!({"isActive": true, "currentSoundIndex": 1})
        );
        assert_eq!(
            json["padStates"]["15"],
            serde_json::json!({"isActive": false, "currentSoundIndex": 0})
        );
        assert_eq!(json["bpm"], 96.0);
    }

    #[test]
    fn back_to_the_same_grid() {
        let mut colors = ColorAllocator::with_seed(1);
        let grid = sample_grid(&mut colors);
        let record = FragmentRecord::from_grid(&grid, 120.0, "");
        let text = serde_json::to_string(&record).unwrap();
        let parsed: FragmentRecord = serde_json::from_str(&text).unwrap();
        // same allocator, so same colors
        assert_eq!(parsed.to_grid(&catalog(), &mut colors), grid);
    }

    #[test]
    fn tolerates_junk() {
        let text = r#"{
            "padSounds": {"0": ["kick", "ghost", "kick"], "x": ["hat"], "99": ["hat"]},
            "padStates": {"0": {"isActive": true, "currentSoundIndex": 7}}
        }"#;
        let record: FragmentRecord = serde_json::from_str(text).unwrap();
        assert_eq!(record.bpm, DEFAULT_BPM);
        let grid = record.to_grid(&catalog(), &mut ColorAllocator::with_seed(2));
        let pad = grid.pad(PadId(0)).unwrap();
        assert_eq!(pad.sounds.len(), 1);
        assert_eq!(pad.current_sound_index, 0);
        assert!(pad.is_active);
        assert_eq!(grid.len(), 16);
    }

    #[test]
    fn oversized_grid_reopens_as_the_default() {
        let text = r#"{
            "rows": 9223372036854775808, "cols": 2,
            "padSounds": {"3": ["hat"]},
            "padStates": {"3": {"isActive": true, "currentSoundIndex": 0}}
        }"#;
        let record: FragmentRecord = serde_json::from_str(text).unwrap();
        let grid = record.to_grid(&catalog(), &mut ColorAllocator::with_seed(3));
        assert_eq!((grid.rows(), grid.cols()), (DEFAULT_ROWS, DEFAULT_COLS));
        assert!(grid.pad(PadId(3)).unwrap().is_sounding());

        let huge = FragmentRecord { rows: 1 << 20, cols: 1 << 20, ..record };
        assert_eq!(huge.to_grid(&catalog(), &mut ColorAllocator::with_seed(3)).len(), 16);
    }
}
