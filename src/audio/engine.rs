use std::time::Duration;

use super::frame::StereoFrame;
use super::voice::Voice;
use crate::audio_api::AudioCommand;

const MAX_VOICES: usize = 32; // hard cap so we wont malloc in audio callback

/// The shared output level. Mute doesn't step the level; it ramps it over a
/// fixed number of frames so there's no click.
#[derive(Clone, Debug)]
pub struct MasterGain {
    current: f32,
    target: f32,
    step: f32,
    ramp_frames: u32,
}

impl MasterGain {
    pub fn new(sample_rate: u32, ramp: Duration) -> Self {
        let ramp_frames = (sample_rate as f64 * ramp.as_secs_f64()).round().max(1.0) as u32;
        Self {
            current: 1.0,
            target: 1.0,
            step: 0.0,
            ramp_frames,
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.target = if muted { 0.0 } else { 1.0 };
        self.step = (self.target - self.current) / self.ramp_frames as f32;
    }

    pub fn level(&self) -> f32 {
        self.current
    }

    pub fn ramp_frames(&self) -> u32 {
        self.ramp_frames
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            self.current += self.step;
            // snap once we've reached or crossed the target
            if (self.step > 0.0 && self.current >= self.target)
                || (self.step < 0.0 && self.current <= self.target)
                || self.step == 0.0
            {
                self.current = self.target;
            }
        }
        self.current
    }
}

/// The mixer. Lives on the audio thread; every play request gets its own
/// voice and they all sum into one output through the master gain.
pub struct Engine {
    voices: Vec<Option<Voice>>, // fixed pool of voices
    master: MasterGain,
}

impl Engine {
    pub fn new(sample_rate: u32, mute_ramp: Duration) -> Self {
        Self {
            voices: (0..MAX_VOICES).map(|_| None).collect(),
            master: MasterGain::new(sample_rate, mute_ramp),
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play { buffer, gain } => self.start_voice(Voice::new(buffer, gain)),
            AudioCommand::SetMuted { muted } => self.master.set_muted(muted),
            AudioCommand::StopAll => self.voices.iter_mut().for_each(|v| *v = None),
        }
    }

    fn start_voice(&mut self, voice: Voice) {
        // what slot do we write to? a free one, or steal whoever is furthest along
        let slot = self
            .voices
            .iter()
            .position(Option::is_none)
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.as_ref().map_or(0, Voice::pos))
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);
        self.voices[slot] = Some(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    pub fn master_level(&self) -> f32 {
        self.master.level()
    }

    pub fn render_block(&mut self, frames: &mut [StereoFrame]) {
        frames.fill(StereoFrame::zero());
        for slot in self.voices.iter_mut() {
            if let Some(voice) = slot {
                if !voice.render_into(frames) {
                    *slot = None;
                }
            }
        }
        for frame in frames.iter_mut() {
            *frame = frame.scaled(self.master.next());
        }
    }
}
