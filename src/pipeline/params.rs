// Declarative parameter schema. Every recognised key has one entry here;
// raw values from the console, a params file or the CLI are coerced and
// clamped against it before anything touches engine state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::slices::DEFAULT_GRID;
use crate::pipeline::trigger::{DEFAULT_CHOP, MAX_TAP, MIN_TAP};
use crate::shared::{HoldMacro, PlaybackMode, MAX_BPM, MAX_SWING, MIN_BPM};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Reads a console token: `on/off`, `true/false`, numerals, else text.
    pub fn coerce(raw: &str) -> Self {
        let s = raw.trim();
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" => return ParamValue::Bool(true),
            "off" | "false" => return ParamValue::Bool(false),
            _ => {}
        }
        match s.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) if n.is_finite() => Some(*n),
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Number(n) => Some(*n != 0.0),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" | "1" => Some(true),
                "off" | "false" | "no" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Number(n) => n.to_string(),
        }
    }
}

/// A partial set of named parameters.
pub type Patch = BTreeMap<String, ParamValue>;

/// Builds a patch from `key=value` tokens; tokens without `=` are skipped.
pub fn patch_from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Patch {
    pairs
        .into_iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), ParamValue::coerce(v)))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    Bpm,
    Division,
    Swing,
    Pattern,
    Mode,
    Invert,
    Glitch,
    Density,
    Seed,
    Map,
    Grid,
    Slowdown,
    FreezeLen,
    ChopLen,
    Gain,
    Hpf,
    Lpf,
    Crush,
    Human,
    SourceBpm,
    Macro,
    Duck,
    Debug,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    Number { min: f64, max: f64 },
    Int { min: i64, max: i64 },
    Bool,
    Choice(&'static [&'static str]),
    Text,
}

#[derive(Clone, Copy, Debug)]
pub enum DefaultValue {
    Number(f64),
    Bool(bool),
    Text(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub param: Param,
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: DefaultValue,
}

pub const MAP_NAMES: [&str; 2] = ["onset", "grid"];

const fn spec(param: Param, name: &'static str, kind: ParamKind, default: DefaultValue) -> ParamSpec {
    ParamSpec { param, name, kind, default }
}

use DefaultValue as D;
use ParamKind as K;

pub const SCHEMA: &[ParamSpec] = &[
    spec(Param::Bpm, "bpm", K::Number { min: MIN_BPM, max: MAX_BPM }, D::Number(142.0)),
    spec(Param::Division, "div", K::Int { min: 1, max: 8 }, D::Number(4.0)),
    spec(Param::Swing, "swing", K::Number { min: 0.0, max: MAX_SWING }, D::Number(0.0)),
    spec(Param::Pattern, "pattern", K::Text, D::Text("amen")),
    spec(Param::Mode, "mode", K::Choice(&PlaybackMode::NAMES), D::Text("normal")),
    spec(Param::Invert, "invert", K::Bool, D::Bool(false)),
    spec(Param::Glitch, "glitch", K::Number { min: 0.0, max: 1.0 }, D::Number(0.0)),
    spec(Param::Density, "density", K::Number { min: 0.0, max: 1.0 }, D::Number(0.6)),
    // 0 = unseeded
    spec(Param::Seed, "seed", K::Int { min: 0, max: u32::MAX as i64 }, D::Number(0.0)),
    spec(Param::Map, "map", K::Choice(&MAP_NAMES), D::Text("onset")),
    spec(Param::Grid, "grid", K::Int { min: 4, max: 32 }, D::Number(DEFAULT_GRID as f64)),
    spec(Param::Slowdown, "slowdown", K::Int { min: 1, max: 16 }, D::Number(1.0)),
    spec(Param::FreezeLen, "freeze_len", K::Number { min: MIN_TAP, max: MAX_TAP }, D::Number(0.2)),
    spec(Param::ChopLen, "chop_len", K::Number { min: 0.02, max: MAX_TAP }, D::Number(DEFAULT_CHOP)),
    spec(Param::Gain, "gain", K::Number { min: -60.0, max: 6.0 }, D::Number(-12.0)),
    spec(Param::Hpf, "hpf", K::Number { min: 20.0, max: 2000.0 }, D::Number(70.0)),
    spec(Param::Lpf, "lpf", K::Number { min: 200.0, max: 20000.0 }, D::Number(11000.0)),
    spec(Param::Crush, "crush", K::Number { min: 0.0, max: 1.0 }, D::Number(0.0)),
    spec(Param::Human, "human", K::Number { min: 0.0, max: 20.0 }, D::Number(0.0)),
    // 0 = play at the sample's own speed
    spec(Param::SourceBpm, "source_bpm", K::Number { min: 0.0, max: 300.0 }, D::Number(0.0)),
    spec(Param::Macro, "macro", K::Choice(&HoldMacro::NAMES), D::Text("freeze")),
    // bus level while the hold is on, 1 = no dip
    spec(Param::Duck, "duck", K::Number { min: 0.0, max: 1.0 }, D::Number(1.0)),
    spec(Param::Debug, "debug", K::Bool, D::Bool(false)),
];

// names older params files use
const ALIASES: &[(&str, &str)] = &[
    ("freezelen", "freeze_len"),
    ("choplen", "chop_len"),
    ("sourcebpm", "source_bpm"),
    ("src", "source_bpm"),
];

pub fn lookup(name: &str) -> Option<&'static ParamSpec> {
    let name = name.trim();
    let name = ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map_or(name, |(_, canonical)| *canonical);
    SCHEMA.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

impl ParamSpec {
    pub fn default_value(&self) -> ParamValue {
        match self.default {
            D::Number(n) => ParamValue::Number(n),
            D::Bool(b) => ParamValue::Bool(b),
            D::Text(s) => ParamValue::Text(s.to_string()),
        }
    }

    /// Coerces and clamps a raw value. `None` means the value can't be
    /// read as this parameter's type and should be left alone.
    pub fn normalize(&self, raw: &ParamValue) -> Option<ParamValue> {
        match self.kind {
            K::Number { min, max } => raw.as_f64().map(|n| ParamValue::Number(n.clamp(min, max))),
            K::Int { min, max } => raw
                .as_f64()
                .map(|n| ParamValue::Number((n.round() as i64).clamp(min, max) as f64)),
            K::Bool => raw.as_bool().map(ParamValue::Bool),
            K::Choice(options) => {
                let text = raw.as_text().trim().to_ascii_lowercase();
                options
                    .iter()
                    .find(|o| **o == text)
                    .map(|o| ParamValue::Text(o.to_string()))
            }
            K::Text => Some(ParamValue::Text(raw.as_text().trim().to_string())),
        }
    }
}

pub fn defaults() -> Patch {
    SCHEMA
        .iter()
        .map(|s| (s.name.to_string(), s.default_value()))
        .collect()
}
