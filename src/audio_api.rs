use std::sync::{Arc, Mutex};

pub use crate::audio::SampleBuffer;

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't load anything itself (that would stall the audio
    // thread), so buffers arrive already decoded, straight out of the cache.
    Play { buffer: Arc<SampleBuffer>, gain: f32 },

    // Global: every fragment playing in this process goes quiet together.
    SetMuted { muted: bool },

    StopAll,
}

/// Anything that takes audio commands: the real output stream, a silent
/// stand-in when there's no device, or a recorder in tests.
pub trait AudioSink {
    fn send(&self, cmd: AudioCommand);
}

/// Swallows everything. Used when no output device could be opened.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn send(&self, cmd: AudioCommand) {
        log::trace!("no output device, dropping {:?}", std::mem::discriminant(&cmd));
    }
}

/// Keeps every command it's sent. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<AudioCommand>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<AudioCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn plays(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, AudioCommand::Play { .. }))
            .count()
    }
}

impl AudioSink for RecordingSink {
    fn send(&self, cmd: AudioCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(cmd);
        }
    }
}
