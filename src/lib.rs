//! padloop: a 4x4 sample-pad loop sequencer.
//!
//! Pads hold stacks of sounds, gestures on a pad toggle it, cycle its sound
//! or open its sound sheet, and a step clock walks the grid one pad per beat,
//! playing whichever armed pads it lands on. The terminal front end lives in
//! the binary; everything here is host independent and driven by explicit
//! time so it can be tested without a clock.

pub mod audio;
pub mod audio_api;
pub mod clock;
pub mod config;
pub mod error;
pub mod gesture;
pub mod loader;
pub mod middle;
pub mod pipeline;
pub mod sequencer;
pub mod shared;

pub use audio::AudioEngine;
pub use middle::PadSession;
