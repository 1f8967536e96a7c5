//! The step clock
//!
//! Walks a loop of `total_steps` steps at a tempo, one step per beat. Like
//! the gesture classifier it owns no timer: the owner calls [`Sequencer::poll`]
//! with the current time and gets back every step that came due, in order.
//! A late poll gets all the missed steps at once rather than skipping any.

use std::time::Duration;

use crate::shared::{DEFAULT_BPM, MAX_BPM};

pub mod player;

pub use player::{Player, Trigger, TriggerOutcome};

/// Keep a tempo inside (0, MAX_BPM]. Nonsense (zero, negative, NaN) falls
/// back to the default rather than erroring.
pub fn sanitize_bpm(bpm: f32) -> f32 {
    if !bpm.is_finite() || bpm <= 0.0 {
        log::debug!("tempo {bpm} is not usable, using {DEFAULT_BPM}");
        return DEFAULT_BPM;
    }
    bpm.min(MAX_BPM)
}

/// Tempo from user text. Empty or unparsable input gives the default.
pub fn parse_bpm(input: &str) -> f32 {
    match input.trim().parse::<f32>() {
        Ok(bpm) => sanitize_bpm(bpm),
        Err(_) => {
            log::debug!("tempo input {input:?} is not a number, using {DEFAULT_BPM}");
            DEFAULT_BPM
        }
    }
}

pub fn step_duration(bpm: f32) -> Duration {
    Duration::from_nanos((60e9 / sanitize_bpm(bpm) as f64).round() as u64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_step: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTick {
    pub step: usize,
    pub due: Duration,
}

#[derive(Clone, Debug)]
pub struct Sequencer {
    total_steps: usize,
    bpm: f32,
    is_playing: bool,
    current_step: Option<usize>,
    next_tick_at: Option<Duration>, // the pending tick; None means no timer
}

impl Sequencer {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            bpm: DEFAULT_BPM,
            is_playing: false,
            current_step: None,
            next_tick_at: None,
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn step_duration(&self) -> Duration {
        step_duration(self.bpm)
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing,
            current_step: self.current_step,
        }
    }

    /// Start from step 0, which fires immediately.
    pub fn start(&mut self, bpm: f32, now: Duration) -> Option<StepTick> {
        self.bpm = sanitize_bpm(bpm);
        if self.total_steps == 0 {
            log::warn!("nothing to sequence, not starting");
            return None;
        }
        self.is_playing = true;
        self.current_step = Some(0);
        self.next_tick_at = Some(now + self.step_duration());
        Some(StepTick { step: 0, due: now })
    }

    /// Every step that came due up to `now`, oldest first.
    pub fn poll(&mut self, now: Duration) -> Vec<StepTick> {
        let mut ticks = Vec::new();
        let step_len = self.step_duration();
        while let Some(due) = self.next_tick_at.filter(|&at| at <= now) {
            let step = self.current_step.map_or(0, |s| (s + 1) % self.total_steps);
            self.current_step = Some(step);
            self.next_tick_at = Some(due + step_len);
            ticks.push(StepTick { step, due });
        }
        if ticks.len() > 1 {
            log::debug!("sequencer caught up {} steps at once", ticks.len());
        }
        ticks
    }

    /// Cancel the pending tick and forget where we were.
    pub fn stop(&mut self) {
        self.is_playing = false;
        self.current_step = None;
        self.next_tick_at = None;
    }

    /// Change tempo. While playing this restarts the loop, so the phase goes
    /// back to step 0.
    pub fn set_tempo(&mut self, bpm: f32, now: Duration) -> Option<StepTick> {
        if self.is_playing {
            self.start(bpm, now)
        } else {
            self.bpm = sanitize_bpm(bpm);
            None
        }
    }
}
