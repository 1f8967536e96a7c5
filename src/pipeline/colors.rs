//! Stable per-sound colors.
//!
//! Each sound id gets a color the first time it shows up on a pad, drawn at
//! random from the colors nobody holds yet. Once every palette color is
//! taken the pool is refilled from the full palette, so two sounds can end
//! up sharing a color. That is accepted degradation, never an error.
//! Assignments live as long as the allocator; nothing is released when a
//! sound leaves its last pad.

use std::collections::HashMap;

pub const PALETTE: [&str; 12] = [
    "#FF6B6B", // coral
    "#FFA94D", // orange
    "#FFD43B", // yellow
    "#A9E34B", // lime
    "#51CF66", // green
    "#38D9A9", // teal
    "#3BC9DB", // cyan
    "#4DABF7", // sky
    "#748FFC", // indigo
    "#9775FA", // violet
    "#DA77F2", // grape
    "#F783AC", // pink
];

#[derive(Debug)]
pub struct ColorAllocator {
    palette: Vec<String>,
    pool: Vec<String>,
    assigned: HashMap<String, String>,
    rng: oorandom::Rand32,
}

impl Default for ColorAllocator {
    fn default() -> Self {
        Self::new(PALETTE.iter().map(|c| c.to_string()).collect(), random_seed())
    }
}

impl ColorAllocator {
    /// Pass the same seed to get the same color sequence back; handy in tests.
    pub fn new(palette: Vec<String>, seed: u64) -> Self {
        Self {
            pool: palette.clone(),
            palette,
            assigned: HashMap::new(),
            rng: oorandom::Rand32::new(seed),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(PALETTE.iter().map(|c| c.to_string()).collect(), seed)
    }

    /// The color for `sound_id`, assigning one on first sight.
    pub fn color_for(&mut self, sound_id: &str) -> String {
        if let Some(color) = self.assigned.get(sound_id) {
            return color.clone();
        }
        if self.pool.is_empty() {
            log::debug!(
                "color pool exhausted after {} sounds, reusing palette",
                self.assigned.len()
            );
            self.pool = self.palette.clone();
        }
        let color = match self.pool.len() {
            0 => String::new(), // empty palette, nothing to hand out
            n => {
                let pick = self.rng.rand_range(0..n as u32) as usize;
                self.pool.swap_remove(pick)
            }
        };
        self.assigned.insert(sound_id.to_string(), color.clone());
        color
    }

    pub fn peek(&self, sound_id: &str) -> Option<&str> {
        self.assigned.get(sound_id).map(String::as_str)
    }

    pub fn assigned(&self) -> usize {
        self.assigned.len()
    }
}

fn random_seed() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(e) => {
            // colors only need to look shuffled, any seed will do
            log::warn!("getrandom failed ({e}), seeding colors from the clock");
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x5eed)
        }
    }
}
