// Types shared between the instrument core, the audio engine and the host
// console. The console only ever reads a `DisplayState`; everything that
// changes playback goes through a patch.

pub const MIN_BPM: f64 = 30.0;
pub const MAX_BPM: f64 = 220.0;
pub const MAX_SWING: f64 = 0.4;

// audio time between "start" and the first step
pub const START_DELAY: f64 = 0.03;
// how far ahead of the audio clock steps are turned into commands
pub const LOOKAHEAD: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BusId(pub u8);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    #[default]
    Normal,
    Stutter,
    Freeze,
    Chop,
    Reverse,
}

impl PlaybackMode {
    pub const NAMES: [&'static str; 6] = ["normal", "stutter", "freeze", "chop", "reverse", "screw"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(PlaybackMode::Normal),
            "stutter" => Some(PlaybackMode::Stutter),
            "freeze" => Some(PlaybackMode::Freeze),
            "chop" => Some(PlaybackMode::Chop),
            "reverse" | "screw" => Some(PlaybackMode::Reverse),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Normal => "NORMAL",
            PlaybackMode::Stutter => "STUTTER",
            PlaybackMode::Freeze => "FREEZE",
            PlaybackMode::Chop => "CHOP",
            PlaybackMode::Reverse => "REVERSE",
        }
    }
}

// What Shift+Space does while held. Most variants swap the playback mode;
// `Slow` and `Screw` also drop the playback rate until release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HoldMacro {
    #[default]
    Freeze,
    Stutter,
    Chop,
    Slow,
    Screw,
    Invert,
}

impl HoldMacro {
    pub const NAMES: [&'static str; 6] = ["freeze", "stutter", "chop", "slow", "screw", "invert"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "freeze" => Some(HoldMacro::Freeze),
            "stutter" => Some(HoldMacro::Stutter),
            "chop" => Some(HoldMacro::Chop),
            "slow" => Some(HoldMacro::Slow),
            "screw" => Some(HoldMacro::Screw),
            "invert" => Some(HoldMacro::Invert),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HoldMacro::Freeze => "freeze",
            HoldMacro::Stutter => "stutter",
            HoldMacro::Chop => "chop",
            HoldMacro::Slow => "slow",
            HoldMacro::Screw => "screw",
            HoldMacro::Invert => "invert",
        }
    }

    // None keeps whatever mode is patched in
    pub fn mode(self) -> Option<PlaybackMode> {
        match self {
            HoldMacro::Freeze => Some(PlaybackMode::Freeze),
            HoldMacro::Stutter => Some(PlaybackMode::Stutter),
            HoldMacro::Chop => Some(PlaybackMode::Chop),
            HoldMacro::Screw | HoldMacro::Invert => Some(PlaybackMode::Reverse),
            HoldMacro::Slow => None,
        }
    }

    /// Rate multiplier while held. `slowdown` is the patched step divider;
    /// slow divides by it, at least by two.
    pub fn rate_factor(self, slowdown: u32) -> f32 {
        match self {
            HoldMacro::Slow => 1.0 / slowdown.max(2) as f32,
            HoldMacro::Screw => 0.5,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub running: bool,
    pub loaded: bool,       // sample decoded and sliced
    pub frozen: bool,       // hold macro engaged
    pub step: u64,          // steps fired so far
    pub last_slice: Option<usize>,
    pub slice_count: usize,
    pub pattern: String,
    pub mode: PlaybackMode,
    pub bpm: f64,
    pub swing: f64,
}
