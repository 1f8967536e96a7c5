use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, AudioSink, NullSink};
use crate::config::Config;
use crate::error::AudioError;
use crate::loader::fetch::{DefaultFetcher, Fetch};

pub mod cache;
mod engine;
mod frame;
pub mod sample_buffer;
mod voice;

pub use cache::{AudioCache, LoadStatus};
pub use engine::{Engine, MasterGain};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;

/// Everything audio that a process shares: the buffer cache, the output
/// stage and the one global mute switch. Build it once with
/// [`AudioEngine::init`], pass it by reference to whatever plays fragments,
/// and [`dispose`](AudioEngine::dispose) it on the way out.
pub struct AudioEngine {
    cache: AudioCache,
    output: Box<dyn AudioSink>,
    sample_rate: u32,
    muted: bool,
}

impl AudioEngine {
    /// Open the default output device and start the loader pool. With no
    /// usable device we keep going silently; the sequencer still runs.
    pub fn init(config: &Config, project_dir: &Path) -> Self {
        let ramp = Duration::from_millis(config.playback.mute_ramp_ms);
        let (output, sample_rate): (Box<dyn AudioSink>, u32) = match start_output(ramp) {
            Ok(handle) => {
                let rate = handle.sample_rate;
                (Box::new(handle), rate)
            }
            Err(e) => {
                log::warn!("audio output unavailable ({e}), running silent");
                (Box::new(NullSink), config.loader.fallback_sample_rate)
            }
        };
        let fetcher = DefaultFetcher::new(
            project_dir,
            Duration::from_secs(config.storage.timeout_secs),
        );
        Self::with_output(output, Arc::new(fetcher), sample_rate, config.loader.worker_threads)
    }

    pub fn with_output(
        output: Box<dyn AudioSink>,
        fetcher: Arc<dyn Fetch>,
        sample_rate: u32,
        worker_threads: usize,
    ) -> Self {
        Self {
            cache: AudioCache::new(fetcher, sample_rate, worker_threads),
            output,
            sample_rate,
            muted: false,
        }
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn load(&self, url: &str) -> LoadStatus {
        self.cache.load(url)
    }

    /// Start a fresh voice for `buffer` right away. Overlapping calls are fine.
    pub fn play(&self, buffer: Arc<SampleBuffer>, gain: f32) {
        self.output.send(AudioCommand::Play { buffer, gain });
    }

    /// Ramp the shared output down to silence (or back up). Affects every
    /// fragment playing through this engine.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            log::debug!("master {}", if muted { "muted" } else { "unmuted" });
        }
        self.muted = muted;
        self.output.send(AudioCommand::SetMuted { muted });
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn dispose(mut self) {
        self.output.send(AudioCommand::StopAll);
        self.cache.shutdown();
        log::info!("audio engine disposed");
    }
}

// ── Output stream ─────────────────────────────────────────────────

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioSink for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!("audio command queue full, dropping command");
        }
    }
}

pub fn start_output(mute_ramp: Duration) -> Result<AudioHandle, AudioError> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::Config(e.to_string()))?;

    let sample_rate: u32 = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(
                &device,
                &config.into(),
                rx,
                channels,
                Engine::new(sample_rate, mute_ramp),
            )?;
            stream
                .play()
                .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
            log::info!("audio output: {} Hz, {} channels", sample_rate, channels);

            Ok(AudioHandle {
                tx,
                sample_rate,
                _output_stream: stream,
            })
        }
        other => Err(AudioError::UnsupportedFormat(format!(
            "{other:?} (only f32 supported for now)"
        ))),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    channels: usize,
    mut engine: Engine,
) -> Result<cpal::Stream, AudioError> {
    let err_fn = |err| log::error!("audio output stream error: {err}");

    // scratch space for the mixer; sized generously so the callback doesn't allocate
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(16384);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = rx.try_recv() {
                    engine.handle_cmd(cmd);
                }

                let n_frames = data.len() / channels.max(1);
                scratch.resize(n_frames, StereoFrame::zero());
                engine.render_block(&mut scratch);

                for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(&scratch) {
                    match out.len() {
                        1 => out[0] = 0.5 * (frame.left + frame.right),
                        _ => {
                            out[0] = frame.left;
                            out[1] = frame.right;
                            out[2..].fill(0.0);
                        }
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::RecordingSink;
    use crate::error::{LoadError, LoadResult};

    struct NoFiles;
    impl Fetch for NoFiles {
        fn fetch(&self, url: &str) -> LoadResult<Vec<u8>> {
            Err(LoadError::Fetch { url: url.into(), reason: "offline".into() })
        }
    }

    #[test]
    fn mute_is_forwarded_to_the_output() {
        let sink = RecordingSink::new();
        let mut engine = AudioEngine::with_output(Box::new(sink.clone()), Arc::new(NoFiles), 44100, 1);
        assert!(!engine.is_muted());
        engine.set_muted(true);
        assert!(engine.is_muted());
        assert!(matches!(
            sink.commands().last(),
            Some(AudioCommand::SetMuted { muted: true })
        ));
        engine.dispose();
        assert!(matches!(sink.commands().last(), Some(AudioCommand::StopAll)));
    }

    #[test]
    fn play_goes_straight_to_the_output() {
        let sink = RecordingSink::new();
        let engine = AudioEngine::with_output(Box::new(sink.clone()), Arc::new(NoFiles), 44100, 1);
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::zero(); 4], sample_rate: 44100 });
        engine.play(buffer.clone(), 1.0);
        engine.play(buffer, 0.5);
        assert_eq!(sink.plays(), 2);
    }
}
