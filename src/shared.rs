// Types shared between the core and whatever is hosting it (the TUI for now).
//
// The idea of the rendering process is the same as it always was:
//   - Only the middle layer (`PadSession`) owns pad, gesture and playback state.
//   - The host feeds it `InputEvent`s and calls `tick()` every frame.
//   - Each frame the host asks for a `DisplayState` and just draws it: pad
//     colors, the playhead, the tempo, the mute icon and the sound sheet.
//   - Anything the host needs to react to (open a sheet, show a toast) comes
//     back as a `PadEvent`.

use std::fmt;

pub const DEFAULT_ROWS: usize = 4;
pub const DEFAULT_COLS: usize = 4;
pub const MAX_PADS: usize = 64;
pub const MAX_SOUNDS_PER_PAD: usize = 8;

pub const DEFAULT_BPM: f32 = 120.0;
pub const MAX_BPM: f32 = 300.0;

// ye olde types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PadId(pub usize);

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad {}", self.0)
    }
}

/// Identifies one pointer contact (a mouse button, a finger).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PointerId(pub u32);

/// Which way a swipe moves the pad's current sound index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleDirection {
    Forward,
    Backward,
}

impl CycleDirection {
    pub fn step(self) -> isize {
        match self {
            CycleDirection::Forward => 1,
            CycleDirection::Backward => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // raw pointer contact on a pad, x in pixels
    PointerDown { pointer: PointerId, pad: PadId, x: f32 },
    PointerMove { pointer: PointerId, x: f32 },
    PointerUp { pointer: PointerId },
    PointerCancel { pointer: PointerId }, // mouse-leave / touch-cancel

    // already-resolved intents, e.g. from keybinds
    TapPad(PadId),
    CyclePad(PadId, CycleDirection),
    ToggleSound { pad: PadId, sound_id: String },
    ClearPad(PadId),

    // transport
    TogglePlay,
    SetTempo(String), // raw text, sanitised by the sequencer
    NudgeTempo(f32),
    ToggleMute,

    Quit,
}

/// Things the host may want to react to. The session has already applied
/// the pad mutation by the time it hands one of these out.
#[derive(Clone, Debug, PartialEq)]
pub enum PadEvent {
    Tapped { pad: PadId, active: bool },
    LongPressed { pad: PadId }, // host opens the sound sheet for this pad
    Swiped { pad: PadId, direction: CycleDirection, current: usize },
    SoundToggled { pad: PadId, sound_id: String, added: bool },
    SoundRejected { pad: PadId, sound_id: String }, // unknown id or pad full
    Triggered { pad: PadId, step: usize, sound_id: String },
    PlaybackChanged { playing: bool },
    TempoChanged { bpm: f32 },
    MuteChanged { muted: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PadView {
    pub id: PadId,
    pub active: bool,
    pub sounding: bool, // active and has at least one sound
    pub color: Option<String>, // color of the current sound
    pub label: Option<String>, // name of the current sound
    pub layers: usize,
    pub current: usize,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub rows: usize,
    pub cols: usize,
    pub pads: Vec<PadView>,
    pub playing_step: Option<usize>,
    pub playing: bool,
    pub muted: bool,
    pub bpm: f32,
    pub display_text: String, // last thing worth telling the user about
}
