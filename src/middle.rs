// The middle layer: everything between the host (TUI) and the core pieces.
//
// One `PadSession` is one open fragment in the editor. It owns the grid
// snapshot, the color allocator, a gesture classifier per pointer and the
// player, and it's the only thing that replaces the grid. The host pushes
// `InputEvent`s in, calls `tick()` every frame, and draws `display_state()`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioEngine;
use crate::config::{Config, GestureSettings};
use crate::gesture::{Gesture, GestureClassifier, HorizontalThreshold};
use crate::loader::signer::UrlSigner;
use crate::pipeline::catalog::SoundCatalog;
use crate::pipeline::colors::ColorAllocator;
use crate::pipeline::fragment::FragmentRecord;
use crate::pipeline::grid::{PadGrid, SoundToggle};
use crate::sequencer::{self, Player, Trigger, TriggerOutcome};
use crate::shared::{DisplayState, InputEvent, PadEvent, PadId, PadView, PointerId};

pub struct PadSession {
    grid: PadGrid,
    colors: ColorAllocator,
    gestures: HashMap<PointerId, GestureClassifier>,
    gesture_settings: GestureSettings,
    player: Player,
    catalog: Box<dyn SoundCatalog>,
    bpm: f32,
    title: String,
    fragment_id: Option<String>,
    display_text: String,
}

impl PadSession {
    /// A blank grid sized from the config.
    pub fn new(config: &Config, catalog: Box<dyn SoundCatalog>, signer: Arc<dyn UrlSigner>) -> Self {
        let grid = PadGrid::new(config.grid.rows, config.grid.cols);
        let bpm = sequencer::sanitize_bpm(config.playback.default_bpm);
        Self::with_grid(grid, bpm, ColorAllocator::default(), config, catalog, signer)
    }

    /// Reopen a saved fragment. Sounds the catalog no longer knows are dropped.
    pub fn from_record(
        record: &FragmentRecord,
        config: &Config,
        catalog: Box<dyn SoundCatalog>,
        signer: Arc<dyn UrlSigner>,
    ) -> Self {
        let mut colors = ColorAllocator::default();
        let grid = record.to_grid(catalog.as_ref(), &mut colors);
        let bpm = sequencer::sanitize_bpm(record.bpm);
        let mut session = Self::with_grid(grid, bpm, colors, config, catalog, signer);
        session.title = record.title.clone();
        session.fragment_id = record.id.clone();
        session
    }

    fn with_grid(
        grid: PadGrid,
        bpm: f32,
        colors: ColorAllocator,
        config: &Config,
        catalog: Box<dyn SoundCatalog>,
        signer: Arc<dyn UrlSigner>,
    ) -> Self {
        let player = Player::new(signer, grid.len(), &config.playback);
        Self {
            grid,
            colors,
            gestures: HashMap::new(),
            gesture_settings: config.gesture.clone(),
            player,
            catalog,
            bpm,
            title: String::new(),
            fragment_id: None,
            display_text: String::new(),
        }
    }

    pub fn grid(&self) -> &PadGrid {
        &self.grid
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn catalog(&self) -> &dyn SoundCatalog {
        self.catalog.as_ref()
    }

    /// The color a sound already got, if it's been used in this session.
    pub fn color_of(&self, sound_id: &str) -> Option<&str> {
        self.colors.peek(sound_id)
    }

    pub fn fragment_id(&self) -> Option<&str> {
        self.fragment_id.as_deref()
    }

    pub fn set_fragment_id(&mut self, id: impl Into<String>) {
        self.fragment_id = Some(id.into());
    }

    pub fn to_record(&self) -> FragmentRecord {
        let mut record = FragmentRecord::from_grid(&self.grid, self.bpm, self.title.clone());
        record.id = self.fragment_id.clone();
        record
    }

    /// Start resolving and loading everything on the grid.
    pub fn prepare(&mut self, engine: &AudioEngine) {
        self.player.prepare(&self.grid, engine);
    }

    /// Like `prepare`, but waits (up to `timeout`) for it all to be ready.
    pub fn warm_up(&mut self, engine: &AudioEngine, timeout: Duration) {
        self.player.warm_up(&self.grid, engine, timeout);
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Duration, engine: &mut AudioEngine) -> Vec<PadEvent> {
        let mut events = Vec::new();
        match event {
            InputEvent::PointerDown { pointer, pad, x } => {
                if self.grid.pad(pad).is_none() {
                    log::debug!("pointer {} went down outside the grid ({pad})", pointer.0);
                    return events;
                }
                let settings = &self.gesture_settings;
                self.gestures
                    .entry(pointer)
                    .or_insert_with(|| classifier(settings))
                    .press(pad, x, now);
            }
            InputEvent::PointerMove { pointer, x } => {
                let gesture = self.gestures.get_mut(&pointer).and_then(|g| g.move_to(x, now));
                if let Some(gesture) = gesture {
                    events.push(self.apply_gesture(gesture));
                }
            }
            InputEvent::PointerUp { pointer } => {
                let gesture = self.gestures.remove(&pointer).and_then(|mut g| g.release(now));
                if let Some(gesture) = gesture {
                    events.push(self.apply_gesture(gesture));
                }
            }
            InputEvent::PointerCancel { pointer } => {
                if let Some(mut g) = self.gestures.remove(&pointer) {
                    g.cancel();
                }
            }

            InputEvent::TapPad(pad) => events.push(self.apply_gesture(Gesture::Tap(pad))),
            InputEvent::CyclePad(pad, direction) => {
                events.push(self.apply_gesture(Gesture::Swipe(pad, direction)))
            }
            InputEvent::ToggleSound { pad, sound_id } => {
                events.push(self.toggle_sound(pad, sound_id, engine))
            }
            InputEvent::ClearPad(pad) => {
                self.grid = self.grid.clear_pad(pad);
                self.display_text = format!("cleared {pad}");
            }

            InputEvent::TogglePlay => {
                if self.player.state().is_playing {
                    self.player.stop();
                    self.display_text = "stopped".to_string();
                    events.push(PadEvent::PlaybackChanged { playing: false });
                } else {
                    let triggers = self.player.start(&self.grid, self.bpm, now, engine);
                    self.display_text = format!("playing {} bpm", self.bpm);
                    events.push(PadEvent::PlaybackChanged { playing: true });
                    self.report(triggers, &mut events);
                }
            }
            InputEvent::SetTempo(text) => {
                self.set_bpm(sequencer::parse_bpm(&text), now, engine, &mut events);
            }
            InputEvent::NudgeTempo(delta) => {
                // nudging can't fall through to the default, it stops at 1
                let bpm = sequencer::sanitize_bpm((self.bpm + delta).max(1.0));
                self.set_bpm(bpm, now, engine, &mut events);
            }
            InputEvent::ToggleMute => {
                let muted = !engine.is_muted();
                engine.set_muted(muted);
                self.display_text = if muted { "muted" } else { "unmuted" }.to_string();
                events.push(PadEvent::MuteChanged { muted });
            }

            InputEvent::Quit => {} // the host deals with this
        }
        events
    }

    /// Advance pending long-presses and the step clock up to `now`.
    pub fn tick(&mut self, now: Duration, engine: &AudioEngine) -> Vec<PadEvent> {
        let fired: Vec<Gesture> = self.gestures.values_mut().filter_map(|g| g.poll(now)).collect();
        let mut events: Vec<PadEvent> = fired.into_iter().map(|g| self.apply_gesture(g)).collect();

        let triggers = self.player.tick(&self.grid, now, engine);
        self.report(triggers, &mut events);
        events
    }

    /// Stop playback and forget every pointer, so no long-press can fire
    /// after the view is gone.
    pub fn teardown(&mut self) {
        for g in self.gestures.values_mut() {
            g.cancel();
        }
        self.gestures.clear();
        self.player.teardown();
        log::debug!("session torn down");
    }

    pub fn display_state(&self, engine: &AudioEngine) -> DisplayState {
        let pads = self
            .grid
            .pads()
            .iter()
            .map(|pad| {
                let current = pad.current_sound();
                PadView {
                    id: pad.id,
                    active: pad.is_active,
                    sounding: pad.is_sounding(),
                    color: current.map(|s| s.color.clone()),
                    label: current.map(|s| s.sound_name.clone()),
                    layers: pad.sounds.len(),
                    current: pad.current_sound_index,
                }
            })
            .collect();
        let state = self.player.state();
        DisplayState {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            pads,
            playing_step: state.current_step,
            playing: state.is_playing,
            muted: engine.is_muted(),
            bpm: self.bpm,
            display_text: self.display_text.clone(),
        }
    }

    fn apply_gesture(&mut self, gesture: Gesture) -> PadEvent {
        match gesture {
            Gesture::Tap(pad) => {
                self.grid = self.grid.toggle_active(pad);
                let active = self.grid.pad(pad).is_some_and(|p| p.is_active);
                PadEvent::Tapped { pad, active }
            }
            Gesture::LongPress(pad) => PadEvent::LongPressed { pad },
            Gesture::Swipe(pad, direction) => {
                self.grid = self.grid.cycle_current_sound(pad, direction);
                let current = self.grid.pad(pad).map_or(0, |p| p.current_sound_index);
                PadEvent::Swiped { pad, direction, current }
            }
        }
    }

    fn toggle_sound(&mut self, pad: PadId, sound_id: String, engine: &AudioEngine) -> PadEvent {
        let Some(info) = self.catalog.lookup(&sound_id) else {
            log::warn!("no sound {sound_id} in the catalog");
            self.display_text = format!("unknown sound {sound_id}");
            return PadEvent::SoundRejected { pad, sound_id };
        };
        let sound = info.to_pad_sound(&mut self.colors);
        let (grid, outcome) = self.grid.add_or_remove_sound(pad, sound);
        self.grid = grid;
        match outcome {
            SoundToggle::Added => {
                self.display_text = format!("{} on {pad}", info.name);
                self.player.prepare(&self.grid, engine);
                PadEvent::SoundToggled { pad, sound_id, added: true }
            }
            SoundToggle::Removed => {
                self.display_text = format!("{} off {pad}", info.name);
                PadEvent::SoundToggled { pad, sound_id, added: false }
            }
            SoundToggle::PadFull => {
                self.display_text = format!("{pad} is full");
                PadEvent::SoundRejected { pad, sound_id }
            }
            SoundToggle::NoSuchPad => PadEvent::SoundRejected { pad, sound_id },
        }
    }

    fn set_bpm(&mut self, bpm: f32, now: Duration, engine: &AudioEngine, events: &mut Vec<PadEvent>) {
        self.bpm = bpm;
        let triggers = self.player.set_tempo(bpm, &self.grid, now, engine);
        self.display_text = format!("{bpm} bpm");
        events.push(PadEvent::TempoChanged { bpm });
        self.report(triggers, events);
    }

    fn report(&mut self, triggers: Vec<Trigger>, events: &mut Vec<PadEvent>) {
        for t in triggers {
            match t.outcome {
                TriggerOutcome::Played => events.push(PadEvent::Triggered {
                    pad: t.pad,
                    step: t.step,
                    sound_id: t.sound_id,
                }),
                TriggerOutcome::Deferred | TriggerOutcome::Dropped => {}
                TriggerOutcome::Unplayable => {
                    self.display_text = format!("can't play {} on {}", t.sound_id, t.pad);
                }
                TriggerOutcome::Failed => {
                    self.display_text = format!("{} failed to load", t.sound_id);
                }
            }
        }
    }
}

fn classifier(settings: &GestureSettings) -> GestureClassifier {
    GestureClassifier::new(
        settings.long_press(),
        HorizontalThreshold { threshold: settings.swipe_threshold_px },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_buffer::wav_bytes;
    use crate::audio_api::RecordingSink;
    use crate::error::{LoadError, LoadResult};
    use crate::loader::fetch::Fetch;
    use crate::loader::signer::NoSigner;
    use crate::pipeline::catalog::{DirectoryCatalog, SoundInfo};
    use crate::pipeline::sound::SourceKind;
    use crate::shared::CycleDirection;

    const P: PointerId = PointerId(1);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Wavs;

    impl Fetch for Wavs {
        fn fetch(&self, url: &str) -> LoadResult<Vec<u8>> {
            if url.starts_with("sounds/") {
                Ok(wav_bytes(8000, 1, &[0.1; 32]))
            } else {
                Err(LoadError::Fetch { url: url.into(), reason: "404".into() })
            }
        }
    }

    fn engine() -> (AudioEngine, RecordingSink) {
        let sink = RecordingSink::new();
        (AudioEngine::with_output(Box::new(sink.clone()), Arc::new(Wavs), 8000, 1), sink)
    }

    fn catalog() -> Box<dyn SoundCatalog> {
        let entries = (0..10)
            .map(|i| SoundInfo {
                id: format!("s{i}"),
                name: format!("Sound {i}"),
                stored_path: Some(format!("sounds/s{i}.wav")),
                kind: SourceKind::Predefined,
            })
            .collect();
        Box::new(DirectoryCatalog::from_entries(entries))
    }

    fn session() -> PadSession {
        PadSession::new(&Config::default(), catalog(), Arc::new(NoSigner))
    }

    fn down(pad: usize, x: f32) -> InputEvent {
        InputEvent::PointerDown { pointer: P, pad: PadId(pad), x }
    }

    fn with_sounds(s: &mut PadSession, e: &mut AudioEngine, pad: usize, ids: &[&str]) {
        for id in ids {
            s.handle_input(InputEvent::ToggleSound { pad: PadId(pad), sound_id: id.to_string() }, ms(0), e);
        }
    }

    #[test]
    fn quick_press_release_is_a_tap() {
        let (mut e, _) = engine();
        let mut s = session();
        assert!(s.handle_input(down(3, 0.0), ms(0), &mut e).is_empty());
        let events = s.handle_input(InputEvent::PointerUp { pointer: P }, ms(120), &mut e);
        assert_eq!(events, vec![PadEvent::Tapped { pad: PadId(3), active: true }]);
        assert!(s.grid().pad(PadId(3)).unwrap().is_active);
    }

    #[test]
    fn held_press_long_presses_once_and_never_taps() {
        let (mut e, _) = engine();
        let mut s = session();
        s.handle_input(down(2, 0.0), ms(0), &mut e);
        assert!(s.tick(ms(499), &e).is_empty());
        assert_eq!(s.tick(ms(500), &e), vec![PadEvent::LongPressed { pad: PadId(2) }]);
        assert!(s.tick(ms(900), &e).is_empty());
        assert!(s.handle_input(InputEvent::PointerUp { pointer: P }, ms(1000), &mut e).is_empty());
        assert!(!s.grid().pad(PadId(2)).unwrap().is_active);
    }

    #[test]
    fn dragging_left_cycles_forward_repeatedly() {
        let (mut e, _) = engine();
        let mut s = session();
        with_sounds(&mut s, &mut e, 0, &["s0", "s1", "s2"]); // current = 2
        s.handle_input(down(0, 100.0), ms(0), &mut e);

        let first = s.handle_input(InputEvent::PointerMove { pointer: P, x: 70.0 }, ms(50), &mut e);
        assert_eq!(
            first,
            vec![PadEvent::Swiped { pad: PadId(0), direction: CycleDirection::Forward, current: 0 }]
        );
        let second = s.handle_input(InputEvent::PointerMove { pointer: P, x: 40.0 }, ms(80), &mut e);
        assert_eq!(
            second,
            vec![PadEvent::Swiped { pad: PadId(0), direction: CycleDirection::Forward, current: 1 }]
        );
        // swiped, so no long press and no tap
        assert!(s.tick(ms(2000), &e).is_empty());
        assert!(s.handle_input(InputEvent::PointerUp { pointer: P }, ms(2100), &mut e).is_empty());
    }

    #[test]
    fn leaving_the_pad_cancels_everything() {
        let (mut e, _) = engine();
        let mut s = session();
        s.handle_input(down(1, 0.0), ms(0), &mut e);
        s.handle_input(InputEvent::PointerCancel { pointer: P }, ms(100), &mut e);
        assert!(s.tick(ms(1000), &e).is_empty());
        assert!(s.handle_input(InputEvent::PointerUp { pointer: P }, ms(1100), &mut e).is_empty());
        assert!(!s.grid().pad(PadId(1)).unwrap().is_active);
    }

    #[test]
    fn pointers_are_independent() {
        let (mut e, _) = engine();
        let mut s = session();
        let other = PointerId(2);
        s.handle_input(down(0, 0.0), ms(0), &mut e);
        s.handle_input(InputEvent::PointerDown { pointer: other, pad: PadId(9), x: 0.0 }, ms(300), &mut e);
        assert_eq!(s.tick(ms(500), &e), vec![PadEvent::LongPressed { pad: PadId(0) }]);
        let up = s.handle_input(InputEvent::PointerUp { pointer: other }, ms(600), &mut e);
        assert_eq!(up, vec![PadEvent::Tapped { pad: PadId(9), active: true }]);
    }

    #[test]
    fn sound_toggling_and_limits() {
        let (mut e, _) = engine();
        let mut s = session();
        let toggle = |id: &str| InputEvent::ToggleSound { pad: PadId(4), sound_id: id.to_string() };

        let got = s.handle_input(toggle("nope"), ms(0), &mut e);
        assert_eq!(got, vec![PadEvent::SoundRejected { pad: PadId(4), sound_id: "nope".into() }]);

        for i in 0..8 {
            s.handle_input(toggle(&format!("s{i}")), ms(0), &mut e);
        }
        let full = s.handle_input(toggle("s8"), ms(0), &mut e);
        assert_eq!(full, vec![PadEvent::SoundRejected { pad: PadId(4), sound_id: "s8".into() }]);

        let removed = s.handle_input(toggle("s3"), ms(0), &mut e);
        assert_eq!(
            removed,
            vec![PadEvent::SoundToggled { pad: PadId(4), sound_id: "s3".into(), added: false }]
        );
        assert_eq!(s.grid().pad(PadId(4)).unwrap().sounds.len(), 7);
    }

    #[test]
    fn play_triggers_armed_pads() {
        let (mut e, sink) = engine();
        let mut s = session();
        with_sounds(&mut s, &mut e, 0, &["s0"]);
        s.handle_input(InputEvent::TapPad(PadId(0)), ms(0), &mut e);
        s.warm_up(&e, Duration::from_secs(5));

        let started = s.handle_input(InputEvent::TogglePlay, ms(0), &mut e);
        assert_eq!(
            started,
            vec![
                PadEvent::PlaybackChanged { playing: true },
                PadEvent::Triggered { pad: PadId(0), step: 0, sound_id: "s0".into() },
            ]
        );
        assert_eq!(s.display_state(&e).playing_step, Some(0));
        assert!(s.tick(ms(7999), &e).is_empty());
        let wrapped = s.tick(ms(8000), &e);
        assert_eq!(wrapped, vec![PadEvent::Triggered { pad: PadId(0), step: 0, sound_id: "s0".into() }]);
        assert_eq!(sink.plays(), 2);

        let stopped = s.handle_input(InputEvent::TogglePlay, ms(8100), &mut e);
        assert_eq!(stopped, vec![PadEvent::PlaybackChanged { playing: false }]);
        assert_eq!(s.display_state(&e).playing_step, None);
    }

    #[test]
    fn tempo_text_and_nudges() {
        let (mut e, _) = engine();
        let mut s = session();
        s.handle_input(InputEvent::SetTempo("abc".into()), ms(0), &mut e);
        assert_eq!(s.bpm(), 120.0);
        s.handle_input(InputEvent::SetTempo("290".into()), ms(0), &mut e);
        s.handle_input(InputEvent::NudgeTempo(50.0), ms(0), &mut e);
        assert_eq!(s.bpm(), 300.0);
        s.handle_input(InputEvent::SetTempo("3".into()), ms(0), &mut e);
        s.handle_input(InputEvent::NudgeTempo(-5.0), ms(0), &mut e);
        assert_eq!(s.bpm(), 1.0);
    }

    #[test]
    fn mute_is_on_the_engine() {
        let (mut e, sink) = engine();
        let mut s = session();
        let got = s.handle_input(InputEvent::ToggleMute, ms(0), &mut e);
        assert_eq!(got, vec![PadEvent::MuteChanged { muted: true }]);
        assert!(e.is_muted());
        assert!(s.display_state(&e).muted);
        assert!(sink
            .commands()
            .iter()
            .any(|c| matches!(c, crate::audio_api::AudioCommand::SetMuted { muted: true })));
    }

    #[test]
    fn teardown_cancels_pending_long_press() {
        let (mut e, _) = engine();
        let mut s = session();
        s.handle_input(down(0, 0.0), ms(0), &mut e);
        s.handle_input(InputEvent::TogglePlay, ms(0), &mut e);
        s.teardown();
        assert!(s.tick(ms(5000), &e).is_empty());
        assert!(!s.display_state(&e).playing);
    }

    #[test]
    fn record_round_trip_keeps_pads() {
        let (mut e, _) = engine();
        let mut s = session();
        with_sounds(&mut s, &mut e, 5, &["s1", "s2"]);
        s.handle_input(InputEvent::TapPad(PadId(5)), ms(0), &mut e);
        s.handle_input(InputEvent::SetTempo("96".into()), ms(0), &mut e);
        s.set_fragment_id("frag-000007");

        let record = s.to_record();
        assert_eq!(record.id.as_deref(), Some("frag-000007"));
        let reopened = PadSession::from_record(&record, &Config::default(), catalog(), Arc::new(NoSigner));
        assert_eq!(reopened.bpm(), 96.0);
        let pad = reopened.grid().pad(PadId(5)).unwrap();
        assert!(pad.is_active);
        let ids: Vec<_> = pad.sounds.iter().map(|s| s.sound_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(pad.current_sound_index, 1);
        assert_eq!(reopened.fragment_id(), Some("frag-000007"));
    }
}
