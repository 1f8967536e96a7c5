//! The pad grid: a fragment's pads and the mutations gestures can make.
//!
//! A [`PadGrid`] is an immutable snapshot. Every operation hands back a new
//! snapshot and leaves the receiver untouched, so the sequencer can keep
//! reading whatever snapshot it was given while the editor moves on.

use std::sync::Arc;

use crate::shared::{CycleDirection, DEFAULT_COLS, DEFAULT_ROWS, MAX_PADS, MAX_SOUNDS_PER_PAD, PadId};

use super::sound::PadSound;

#[derive(Clone, Debug, PartialEq)]
pub struct Pad {
    pub id: PadId,
    pub sounds: Vec<PadSound>,
    pub is_active: bool, // user toggle, independent of whether sounds exist
    pub current_sound_index: usize,
}

impl Pad {
    pub fn new(id: PadId) -> Self {
        Self {
            id,
            sounds: Vec::new(),
            is_active: false,
            current_sound_index: 0,
        }
    }

    pub fn current_sound(&self) -> Option<&PadSound> {
        self.sounds.get(self.current_sound_index)
    }

    /// Only pads that are both armed and loaded make noise
    pub fn is_sounding(&self) -> bool {
        self.is_active && !self.sounds.is_empty()
    }

    pub fn position_of(&self, sound_id: &str) -> Option<usize> {
        self.sounds.iter().position(|s| s.sound_id == sound_id)
    }

    fn clamp_index(&mut self) {
        let last = self.sounds.len().saturating_sub(1);
        self.current_sound_index = self.current_sound_index.min(last);
    }
}

/// What `add_or_remove_sound` ended up doing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundToggle {
    Added,
    Removed,
    PadFull,
    NoSuchPad,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PadGrid {
    rows: usize,
    cols: usize,
    pads: Arc<[Pad]>,
}

/// Grid dimensions as given if they make between 1 and [`MAX_PADS`] pads,
/// the default 4×4 otherwise. Rows and cols arrive from config and saved
/// fragments, so they can be anything.
pub fn checked_dims(rows: usize, cols: usize) -> (usize, usize) {
    match rows.checked_mul(cols) {
        Some(n) if (1..=MAX_PADS).contains(&n) => (rows, cols),
        _ => {
            log::warn!("grid of {rows}x{cols} pads is out of range, using {DEFAULT_ROWS}x{DEFAULT_COLS}");
            (DEFAULT_ROWS, DEFAULT_COLS)
        }
    }
}

impl PadGrid {
    /// A blank grid: rows × cols pads, all inactive, no sounds.
    pub fn new(rows: usize, cols: usize) -> Self {
        let (rows, cols) = checked_dims(rows, cols);
        let pads: Vec<Pad> = (0..rows * cols).map(|i| Pad::new(PadId(i))).collect();
        Self { rows, cols, pads: pads.into() }
    }

    /// Build from pads that were restored elsewhere. Ids are reassigned by
    /// position and out-of-range indices are clamped.
    pub fn from_pads(rows: usize, cols: usize, pads: Vec<Pad>) -> Self {
        let (rows, cols) = checked_dims(rows, cols);
        let mut pads = pads;
        pads.resize_with(rows * cols, || Pad::new(PadId(0)));
        for (i, pad) in pads.iter_mut().enumerate() {
            pad.id = PadId(i);
            pad.sounds.truncate(MAX_SOUNDS_PER_PAD);
            pad.clamp_index();
        }
        Self { rows, cols, pads: pads.into() }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    pub fn pad(&self, id: PadId) -> Option<&Pad> {
        self.pads.get(id.0)
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn toggle_active(&self, id: PadId) -> PadGrid {
        self.update(id, |pad| pad.is_active = !pad.is_active)
    }

    /// Toggle a sound's membership on a pad. A newly added sound becomes the
    /// pad's current sound; removing one keeps the index in bounds.
    pub fn add_or_remove_sound(&self, id: PadId, sound: PadSound) -> (PadGrid, SoundToggle) {
        let Some(pad) = self.pad(id) else {
            return (self.clone(), SoundToggle::NoSuchPad);
        };
        if pad.position_of(&sound.sound_id).is_none() && pad.sounds.len() >= MAX_SOUNDS_PER_PAD {
            return (self.clone(), SoundToggle::PadFull);
        }

        let mut outcome = SoundToggle::Added;
        let grid = self.update(id, |pad| match pad.position_of(&sound.sound_id) {
            Some(at) => {
                pad.sounds.remove(at);
                pad.clamp_index();
                outcome = SoundToggle::Removed;
            }
            None => {
                pad.sounds.push(sound);
                pad.current_sound_index = pad.sounds.len() - 1;
            }
        });
        (grid, outcome)
    }

    /// Move the current sound index one step, wrapping. No-op with fewer
    /// than two sounds.
    pub fn cycle_current_sound(&self, id: PadId, direction: CycleDirection) -> PadGrid {
        match self.pad(id) {
            Some(pad) if pad.sounds.len() > 1 => self.update(id, |pad| {
                let len = pad.sounds.len() as isize;
                let next = (pad.current_sound_index as isize + direction.step()).rem_euclid(len);
                pad.current_sound_index = next as usize;
            }),
            _ => self.clone(),
        }
    }

    /// Drop every sound from a pad. Its armed state is left alone.
    pub fn clear_pad(&self, id: PadId) -> PadGrid {
        self.update(id, |pad| {
            pad.sounds.clear();
            pad.current_sound_index = 0;
        })
    }

    fn update(&self, id: PadId, f: impl FnOnce(&mut Pad)) -> PadGrid {
        if id.0 >= self.pads.len() {
            log::warn!("ignoring mutation of {} on a {}-pad grid", id, self.pads.len());
            return self.clone();
        }
        let mut pads = self.pads.to_vec();
        f(&mut pads[id.0]);
        PadGrid {
            rows: self.rows,
            cols: self.cols,
            pads: pads.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sound::SourceKind;

    fn snd(id: &str) -> PadSound {
        PadSound::new(id, id.to_uppercase(), SourceKind::Predefined)
    }

    fn invariant_holds(grid: &PadGrid) -> bool {
        grid.pads()
            .iter()
            .all(|p| p.current_sound_index < p.sounds.len().max(1))
    }

    #[test]
    fn blank_grid() {
        let grid = PadGrid::new(4, 4);
        assert_eq!(grid.len(), 16);
        assert!(grid.pads().iter().all(|p| !p.is_active && p.sounds.is_empty()));
        assert_eq!(grid.pad(PadId(15)).unwrap().id, PadId(15));
        assert!(grid.pad(PadId(16)).is_none());
    }

    #[test]
    fn toggle_is_a_new_snapshot() {
        let before = PadGrid::new(4, 4);
        let after = before.toggle_active(PadId(3));
        assert!(!before.pad(PadId(3)).unwrap().is_active);
        assert!(after.pad(PadId(3)).unwrap().is_active);
        assert!(!after.toggle_active(PadId(3)).pad(PadId(3)).unwrap().is_active);
    }

    #[test]
    fn armed_pad_without_sounds_is_not_sounding() {
        let grid = PadGrid::new(4, 4).toggle_active(PadId(0));
        let pad = grid.pad(PadId(0)).unwrap();
        assert!(pad.is_active);
        assert!(!pad.is_sounding());
    }

    #[test]
    fn added_sound_becomes_current() {
        let grid = PadGrid::new(4, 4);
        let (grid, r) = grid.add_or_remove_sound(PadId(1), snd("a"));
        assert_eq!(r, SoundToggle::Added);
        let (grid, _) = grid.add_or_remove_sound(PadId(1), snd("b"));
        let pad = grid.pad(PadId(1)).unwrap();
        assert_eq!(pad.current_sound_index, 1);
        assert_eq!(pad.current_sound().unwrap().sound_id, "b");
        // adding sounds doesn't arm the pad
        assert!(!pad.is_active);
    }

    #[test]
    fn removing_clamps_index() {
        let mut grid = PadGrid::new(4, 4);
        for id in ["a", "b", "c"] {
            grid = grid.add_or_remove_sound(PadId(0), snd(id)).0;
        }
        assert_eq!(grid.pad(PadId(0)).unwrap().current_sound_index, 2);

        let (grid, r) = grid.add_or_remove_sound(PadId(0), snd("c"));
        assert_eq!(r, SoundToggle::Removed);
        assert_eq!(grid.pad(PadId(0)).unwrap().current_sound_index, 1);

        let grid = grid.add_or_remove_sound(PadId(0), snd("a")).0;
        let grid = grid.add_or_remove_sound(PadId(0), snd("b")).0;
        let pad = grid.pad(PadId(0)).unwrap();
        assert!(pad.sounds.is_empty());
        assert_eq!(pad.current_sound_index, 0);
    }

    #[test]
    fn pad_is_bounded() {
        let mut grid = PadGrid::new(1, 1);
        for i in 0..MAX_SOUNDS_PER_PAD {
            grid = grid.add_or_remove_sound(PadId(0), snd(&format!("s{i}"))).0;
        }
        let (grid, r) = grid.add_or_remove_sound(PadId(0), snd("one-too-many"));
        assert_eq!(r, SoundToggle::PadFull);
        assert_eq!(grid.pad(PadId(0)).unwrap().sounds.len(), MAX_SOUNDS_PER_PAD);
        // removing still works when full
        let (_, r) = grid.add_or_remove_sound(PadId(0), snd("s0"));
        assert_eq!(r, SoundToggle::Removed);
    }

    #[test]
    fn cycle_wraps_both_ways() {
        let mut grid = PadGrid::new(4, 4);
        for id in ["a", "b", "c"] {
            grid = grid.add_or_remove_sound(PadId(2), snd(id)).0;
        }
        // index 2, forward -> 0
        let fwd = grid.cycle_current_sound(PadId(2), CycleDirection::Forward);
        assert_eq!(fwd.pad(PadId(2)).unwrap().current_sound_index, 0);
        // index 0, backward -> 2
        let back = fwd.cycle_current_sound(PadId(2), CycleDirection::Backward);
        assert_eq!(back.pad(PadId(2)).unwrap().current_sound_index, 2);
    }

    #[test]
    fn cycle_with_one_sound_is_noop() {
        let grid = PadGrid::new(4, 4).add_or_remove_sound(PadId(0), snd("a")).0;
        let after = grid.cycle_current_sound(PadId(0), CycleDirection::Forward);
        assert_eq!(after, grid);
        let empty = PadGrid::new(4, 4);
        assert_eq!(empty.cycle_current_sound(PadId(0), CycleDirection::Backward), empty);
    }

    #[test]
    fn out_of_range_pad_is_ignored() {
        let grid = PadGrid::new(2, 2);
        assert_eq!(grid.toggle_active(PadId(99)), grid);
        assert_eq!(grid.add_or_remove_sound(PadId(99), snd("a")).1, SoundToggle::NoSuchPad);
    }

    #[test]
    fn index_invariant_survives_random_edits() {
        let mut rng = oorandom::Rand32::new(7);
        let ids = ["a", "b", "c", "d", "e"];
        let mut grid = PadGrid::new(2, 2);
        for _ in 0..2000 {
            let pad = PadId(rng.rand_range(0..4) as usize);
            grid = match rng.rand_range(0..3) {
                0 => grid.add_or_remove_sound(pad, snd(ids[rng.rand_range(0..5) as usize])).0,
                1 => grid.cycle_current_sound(pad, CycleDirection::Forward),
                _ => grid.cycle_current_sound(pad, CycleDirection::Backward),
            };
            assert!(invariant_holds(&grid));
        }
    }

    #[test]
    fn silly_dimensions_fall_back_to_the_default() {
        assert_eq!(PadGrid::new(usize::MAX, 2).len(), 16);
        assert_eq!(PadGrid::new(0, 4).len(), 16);
        assert_eq!(PadGrid::new(100_000, 100_000).len(), 16);
        assert_eq!(PadGrid::new(8, 8).len(), MAX_PADS);
        let grid = PadGrid::from_pads(1 << 40, 1 << 40, Vec::new());
        assert_eq!((grid.rows(), grid.cols(), grid.len()), (DEFAULT_ROWS, DEFAULT_COLS, 16));
    }

    #[test]
    fn from_pads_repairs_bad_input() {
        let mut pad = Pad::new(PadId(42));
        pad.sounds.push(snd("a"));
        pad.current_sound_index = 9;
        let grid = PadGrid::from_pads(2, 2, vec![pad]);
        assert_eq!(grid.len(), 4);
        let p0 = grid.pad(PadId(0)).unwrap();
        assert_eq!(p0.id, PadId(0));
        assert_eq!(p0.current_sound_index, 0);
        assert!(invariant_holds(&grid));
    }
}
