// The one mutable record of a running instrument. Only the patch applier
// and the step counter write to it.

use tracing::debug;

use crate::pipeline::clock::steps_per_second;
use crate::pipeline::params::{self, Param, ParamValue, Patch};
use crate::pipeline::slices::SliceStrategy;
use crate::shared::{HoldMacro, PlaybackMode};

#[derive(Clone, Debug, PartialEq)]
pub struct EngineState {
    pub bpm: f64,
    pub steps_per_beat: u32,
    pub swing: f64,
    pub pattern: String,
    pub mode: PlaybackMode,
    pub invert: bool,
    pub glitch: f64,
    pub density: f64,
    pub seed: Option<u32>,
    pub map_onset: bool, // onset map vs even grid
    pub grid: usize,
    pub slowdown: u32,
    pub freeze_len: f64,
    pub chop_len: f64,
    pub gain_db: f64,
    pub hpf: f64,
    pub lpf: f64,
    pub crush: f64,
    pub human_ms: f64,
    pub source_bpm: f64,
    pub hold: HoldMacro,
    pub duck: f64,
    pub debug: bool,

    pub step: u64, // monotonic, never reset by a patch
}

// What a patch touched, so the caller knows which derived things to redo
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub tempo: bool,
    pub slicing: bool,
    pub pattern: bool,
    pub bus: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.tempo || self.slicing || self.pattern || self.bus
    }
}

impl Default for EngineState {
    fn default() -> Self {
        let mut state = Self {
            bpm: 0.0,
            steps_per_beat: 0,
            swing: 0.0,
            pattern: String::new(),
            mode: PlaybackMode::Normal,
            invert: false,
            glitch: 0.0,
            density: 0.0,
            seed: None,
            map_onset: true,
            grid: 0,
            slowdown: 1,
            freeze_len: 0.0,
            chop_len: 0.0,
            gain_db: 0.0,
            hpf: 0.0,
            lpf: 0.0,
            crush: 0.0,
            human_ms: 0.0,
            source_bpm: 0.0,
            hold: HoldMacro::Freeze,
            duck: 1.0,
            debug: false,
            step: 0,
        };
        state.apply(&params::defaults());
        state
    }
}

impl EngineState {
    pub fn from_params(initial: &Patch) -> Self {
        let mut state = Self::default();
        state.apply(initial);
        state
    }

    pub fn apply(&mut self, patch: &Patch) -> Changes {
        let mut changes = Changes::default();
        for (key, raw) in patch {
            let Some(spec) = params::lookup(key) else {
                debug!(key = %key, "ignoring unknown parameter");
                continue;
            };
            match spec.normalize(raw) {
                Some(value) => self.assign(spec.param, &value, &mut changes),
                None => debug!(key = %key, ?raw, "ignoring unreadable value"),
            }
        }
        changes
    }

    fn assign(&mut self, param: Param, value: &ParamValue, changes: &mut Changes) {
        // normalize() already guarantees the value's shape for each kind
        let num = value.as_f64().unwrap_or_default();
        let flag = value.as_bool().unwrap_or_default();
        match param {
            Param::Bpm => { self.bpm = num; changes.tempo = true; }
            Param::Division => { self.steps_per_beat = num as u32; changes.tempo = true; }
            Param::Swing => self.swing = num,
            Param::Pattern => { self.pattern = value.as_text(); changes.pattern = true; }
            Param::Mode => {
                if let Some(mode) = PlaybackMode::from_name(&value.as_text()) {
                    self.mode = mode;
                }
            }
            Param::Invert => self.invert = flag,
            Param::Glitch => self.glitch = num,
            Param::Density => self.density = num,
            Param::Seed => {
                self.seed = if num >= 1.0 { Some(num as u32) } else { None };
            }
            Param::Map => {
                self.map_onset = value.as_text() == "onset";
                changes.slicing = true;
            }
            Param::Grid => { self.grid = num as usize; changes.slicing = true; }
            Param::Slowdown => self.slowdown = num as u32,
            Param::FreezeLen => self.freeze_len = num,
            Param::ChopLen => self.chop_len = num,
            Param::Gain => { self.gain_db = num; changes.bus = true; }
            Param::Hpf => { self.hpf = num; changes.bus = true; }
            Param::Lpf => { self.lpf = num; changes.bus = true; }
            Param::Crush => { self.crush = num; changes.bus = true; }
            Param::Human => self.human_ms = num,
            Param::SourceBpm => self.source_bpm = num,
            Param::Macro => {
                if let Some(hold) = HoldMacro::from_name(&value.as_text()) {
                    self.hold = hold;
                }
            }
            Param::Duck => { self.duck = num; changes.bus = true; }
            Param::Debug => self.debug = flag,
        }
    }

    pub fn steps_per_second(&self) -> f64 {
        steps_per_second(self.bpm, self.steps_per_beat)
    }

    pub fn step_duration(&self) -> f64 {
        1.0 / self.steps_per_second()
    }

    pub fn slice_strategy(&self) -> SliceStrategy {
        if self.map_onset {
            SliceStrategy::Onset
        } else {
            SliceStrategy::Grid(self.grid)
        }
    }

    // time-stretch by resampling when the source tempo is known
    pub fn playback_rate(&self) -> f32 {
        if self.source_bpm > 0.0 {
            (self.bpm / self.source_bpm).clamp(0.25, 4.0) as f32
        } else {
            1.0
        }
    }

    pub fn gain_linear(&self) -> f32 {
        10f64.powf(self.gain_db / 20.0) as f32
    }

    /// Current values as a patch, for saving a session.
    pub fn to_patch(&self) -> Patch {
        let mut patch = Patch::new();
        let mut put = |k: &str, v: ParamValue| {
            patch.insert(k.to_string(), v);
        };
        put("bpm", ParamValue::Number(self.bpm));
        put("div", ParamValue::Number(self.steps_per_beat as f64));
        put("swing", ParamValue::Number(self.swing));
        put("pattern", ParamValue::Text(self.pattern.clone()));
        put("mode", ParamValue::Text(self.mode.label().to_ascii_lowercase()));
        put("invert", ParamValue::Bool(self.invert));
        put("glitch", ParamValue::Number(self.glitch));
        put("density", ParamValue::Number(self.density));
        put("seed", ParamValue::Number(self.seed.unwrap_or(0) as f64));
        put("map", ParamValue::Text(if self.map_onset { "onset" } else { "grid" }.to_string()));
        put("grid", ParamValue::Number(self.grid as f64));
        put("slowdown", ParamValue::Number(self.slowdown as f64));
        put("freeze_len", ParamValue::Number(self.freeze_len));
        put("chop_len", ParamValue::Number(self.chop_len));
        put("gain", ParamValue::Number(self.gain_db));
        put("hpf", ParamValue::Number(self.hpf));
        put("lpf", ParamValue::Number(self.lpf));
        put("crush", ParamValue::Number(self.crush));
        put("human", ParamValue::Number(self.human_ms));
        put("source_bpm", ParamValue::Number(self.source_bpm));
        put("macro", ParamValue::Text(self.hold.name().to_string()));
        put("duck", ParamValue::Number(self.duck));
        put("debug", ParamValue::Bool(self.debug));
        patch
    }
}
