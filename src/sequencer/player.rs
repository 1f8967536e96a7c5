//! A playback surface: one fragment being played.
//!
//! Ties the step clock to the pads, the per-view sound resolver and the
//! shared [`AudioEngine`]. On each step the pad with that index plays if it
//! is armed and has sounds. Nothing here ever waits: a sound whose url or
//! buffer isn't ready yet becomes a pending trigger that is re-checked on
//! later ticks. What happens when it finally shows up depends on the
//! [`LatePolicy`]: `Drop` discards anything that arrives after its step
//! window (one step long), `Play` plays it on arrival no matter how late.
//! The window applies to the steps themselves too: when a stalled frame
//! makes the clock catch up on several steps at once, `Drop` lets the
//! missed ones go instead of firing them in one burst.
//! A failing sound only ever affects itself; the loop keeps ticking.

use std::sync::Arc;
use std::time::Duration;

use super::{PlaybackState, Sequencer, StepTick};
use crate::audio::{AudioEngine, LoadStatus};
use crate::config::{LatePolicy, LayerMode, PlaybackSettings};
use crate::loader::resolver::{Resolution, ResolverService};
use crate::loader::signer::UrlSigner;
use crate::pipeline::grid::PadGrid;
use crate::pipeline::sound::PadSound;
use crate::shared::PadId;

const LAYER_GAIN: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    Played,     // handed to the output
    Deferred,   // waiting on resolution or loading
    Unplayable, // no source could be resolved
    Dropped,    // arrived after its step window
    Failed,     // fetch or decode failed
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trigger {
    pub pad: PadId,
    pub step: usize,
    pub sound_id: String,
    pub at: Duration,
    pub outcome: TriggerOutcome,
}

#[derive(Debug)]
struct PendingTrigger {
    pad: PadId,
    step: usize,
    sound: PadSound,
    url: Option<String>,
    deadline: Duration,
}

pub struct Player {
    sequencer: Sequencer,
    resolver: ResolverService,
    pending: Vec<PendingTrigger>,
    layer_mode: LayerMode,
    late_policy: LatePolicy,
}

impl Player {
    pub fn new(signer: Arc<dyn UrlSigner>, total_steps: usize, settings: &PlaybackSettings) -> Self {
        let mut sequencer = Sequencer::new(total_steps);
        sequencer.set_tempo(settings.default_bpm, Duration::ZERO);
        Self {
            sequencer,
            resolver: ResolverService::new(signer),
            pending: Vec::new(),
            layer_mode: settings.layer_mode,
            late_policy: settings.late_policy,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.sequencer.state()
    }

    pub fn bpm(&self) -> f32 {
        self.sequencer.bpm()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Get resolution and loading going for every sound on the grid, so the
    /// first pass through the loop has a chance of being on time.
    pub fn prepare(&mut self, grid: &PadGrid, engine: &AudioEngine) {
        for sound in grid.pads().iter().flat_map(|p| p.sounds.iter()) {
            if let Some(Resolution::Playable(url)) = self.resolver.request(sound) {
                engine.load(&url);
            }
        }
    }

    /// `prepare`, then block until everything has resolved and loaded or
    /// `timeout` runs out. For headless use and tests, not for the UI thread.
    pub fn warm_up(&mut self, grid: &PadGrid, engine: &AudioEngine, timeout: Duration) {
        self.prepare(grid, engine);
        self.resolver.wait_idle(timeout);
        self.prepare(grid, engine);
        for sound in grid.pads().iter().flat_map(|p| p.sounds.iter()) {
            if let Some(Resolution::Playable(url)) = self.resolver.resolver().peek(&sound.sound_id) {
                engine.cache().wait_for(&url, timeout);
            }
        }
    }

    pub fn start(
        &mut self,
        grid: &PadGrid,
        bpm: f32,
        now: Duration,
        engine: &AudioEngine,
    ) -> Vec<Trigger> {
        self.pending.clear();
        let mut out = Vec::new();
        if let Some(first) = self.sequencer.start(bpm, now) {
            log::info!("playing at {} bpm", self.sequencer.bpm());
            self.fire_step(first, now, grid, engine, &mut out);
        }
        out
    }

    pub fn stop(&mut self) {
        if self.sequencer.state().is_playing {
            log::info!("stopped");
        }
        self.sequencer.stop();
        self.pending.clear();
    }

    /// While playing this restarts the loop from step 0.
    pub fn set_tempo(
        &mut self,
        bpm: f32,
        grid: &PadGrid,
        now: Duration,
        engine: &AudioEngine,
    ) -> Vec<Trigger> {
        let mut out = Vec::new();
        if let Some(first) = self.sequencer.set_tempo(bpm, now) {
            self.pending.clear();
            self.fire_step(first, now, grid, engine, &mut out);
        }
        out
    }

    /// Fire every step that's due, then settle whatever was waiting.
    pub fn tick(&mut self, grid: &PadGrid, now: Duration, engine: &AudioEngine) -> Vec<Trigger> {
        let mut out = Vec::new();
        for tick in self.sequencer.poll(now) {
            self.fire_step(tick, now, grid, engine, &mut out);
        }
        self.service_pending(now, engine, &mut out);
        out
    }

    /// Stop and let go of the resolver thread. The player is done after this.
    pub fn teardown(&mut self) {
        self.stop();
        self.resolver.shutdown();
    }

    fn fire_step(
        &mut self,
        tick: StepTick,
        now: Duration,
        grid: &PadGrid,
        engine: &AudioEngine,
        out: &mut Vec<Trigger>,
    ) {
        let Some(pad) = grid.pad(PadId(tick.step)) else {
            return;
        };
        if !pad.is_sounding() {
            return;
        }
        let layers: Vec<&PadSound> = match self.layer_mode {
            LayerMode::Current => pad.current_sound().into_iter().collect(),
            LayerMode::All => pad.sounds.iter().collect(),
        };
        let deadline = tick.due + self.sequencer.step_duration();
        let missed = self.late_policy == LatePolicy::Drop && now > deadline;
        if missed {
            log::debug!("step {} fired {:?} past its window, dropping it", tick.step, now - deadline);
        }
        for sound in layers {
            let outcome = self.trigger_sound(pad.id, tick.step, sound, deadline, missed, engine);
            out.push(Trigger {
                pad: pad.id,
                step: tick.step,
                sound_id: sound.sound_id.clone(),
                at: tick.due,
                outcome,
            });
        }
    }

    fn trigger_sound(
        &mut self,
        pad: PadId,
        step: usize,
        sound: &PadSound,
        deadline: Duration,
        missed: bool,
        engine: &AudioEngine,
    ) -> TriggerOutcome {
        // resolve even a missed step, so the next pass finds the url cached
        let url = match self.resolver.request(sound) {
            Some(Resolution::Unplayable) => return TriggerOutcome::Unplayable,
            Some(Resolution::Playable(_)) if missed => return TriggerOutcome::Dropped,
            Some(Resolution::Playable(url)) => url,
            None if missed => return TriggerOutcome::Dropped,
            None => {
                self.defer(pad, step, sound, None, deadline);
                return TriggerOutcome::Deferred;
            }
        };
        match engine.load(&url) {
            LoadStatus::Ready(buffer) => {
                engine.play(buffer, LAYER_GAIN);
                TriggerOutcome::Played
            }
            LoadStatus::Loading => {
                self.defer(pad, step, sound, Some(url), deadline);
                TriggerOutcome::Deferred
            }
            LoadStatus::Failed(_) => TriggerOutcome::Failed,
        }
    }

    fn defer(&mut self, pad: PadId, step: usize, sound: &PadSound, url: Option<String>, deadline: Duration) {
        self.pending.push(PendingTrigger {
            pad,
            step,
            sound: sound.clone(),
            url,
            deadline,
        });
    }

    fn service_pending(&mut self, now: Duration, engine: &AudioEngine, out: &mut Vec<Trigger>) {
        // finished resolutions land in the resolver's cache; we read them via peek
        self.resolver.poll();
        if self.pending.is_empty() {
            return;
        }

        let mut still_waiting = Vec::with_capacity(self.pending.len());
        for mut p in std::mem::take(&mut self.pending) {
            let outcome = match self.settle(&mut p, now, engine) {
                Some(outcome) => outcome,
                None => {
                    still_waiting.push(p);
                    continue;
                }
            };
            out.push(Trigger {
                pad: p.pad,
                step: p.step,
                sound_id: p.sound.sound_id,
                at: now,
                outcome,
            });
        }
        self.pending = still_waiting;
    }

    // Some(outcome) once the trigger is finished with, None to keep waiting
    fn settle(&self, p: &mut PendingTrigger, now: Duration, engine: &AudioEngine) -> Option<TriggerOutcome> {
        if self.late_policy == LatePolicy::Drop && now > p.deadline {
            log::debug!(
                "{} on {} missed step {} by {:?}, dropping it",
                p.sound.sound_id,
                p.pad,
                p.step,
                now - p.deadline
            );
            return Some(TriggerOutcome::Dropped);
        }

        if p.url.is_none() {
            match self.resolver.resolver().peek(&p.sound.sound_id) {
                None => return None,
                Some(Resolution::Unplayable) => return Some(TriggerOutcome::Unplayable),
                Some(Resolution::Playable(url)) => p.url = Some(url),
            }
        }
        let url = p.url.as_deref()?;

        match engine.cache().status(url) {
            Some(LoadStatus::Ready(buffer)) => {
                engine.play(buffer, LAYER_GAIN);
                Some(TriggerOutcome::Played)
            }
            Some(LoadStatus::Failed(_)) => Some(TriggerOutcome::Failed),
            Some(LoadStatus::Loading) => None,
            None => match engine.load(url) {
                LoadStatus::Ready(buffer) => {
                    engine.play(buffer, LAYER_GAIN);
                    Some(TriggerOutcome::Played)
                }
                LoadStatus::Loading => None,
                LoadStatus::Failed(_) => Some(TriggerOutcome::Failed),
            },
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.sequencer.stop();
    }
}
