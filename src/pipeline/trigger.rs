// Turns one resolved step into sample-playback calls. One handler per
// playback mode; reverse playback is a mirror applied on top.

use crate::pipeline::slices::Slice;
use crate::shared::{PlaybackMode, MAX_SWING};

// trimmed off normal hits so a slice never bleeds into the next step
pub const SAFETY_MARGIN: f64 = 0.005;
pub const MIN_TAP: f64 = 0.03;
pub const MAX_TAP: f64 = 0.25;
pub const DEFAULT_CHOP: f64 = 0.09;
// shortest region the engine is asked to play
const MIN_PLAY: f64 = 0.01;

pub const ACCENT_GAIN: f32 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Play {
    pub at: f64,       // audio time
    pub offset: f64,   // seconds into the (possibly reversed) sample
    pub duration: f64, // seconds of sample to play
    pub reverse: bool,
    pub gain: f32,
    pub rate: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct TriggerContext {
    pub sample_duration: f64,
    pub step_duration: f64,
    pub tap: f64,  // stutter/freeze fragment length
    pub chop: f64, // chop ceiling
    pub invert: bool,
    pub gain: f32,
    pub rate: f32,
}

// odd steps lean late
pub fn swing_delay(step: u64, swing: f64, step_duration: f64) -> f64 {
    if step % 2 == 1 {
        swing.clamp(0.0, MAX_SWING) * step_duration
    } else {
        0.0
    }
}

pub fn trigger(
    slice: Slice,
    previous: Option<Slice>,
    time: f64,
    mode: PlaybackMode,
    ctx: &TriggerContext,
) -> Vec<Play> {
    let plays = match mode {
        PlaybackMode::Normal | PlaybackMode::Reverse => {
            vec![region(ctx, time, slice.start, slice.length - SAFETY_MARGIN)]
        }
        PlaybackMode::Chop => {
            vec![region(ctx, time, slice.start, slice.length.min(ctx.chop))]
        }
        PlaybackMode::Stutter => taps(ctx, time, previous.unwrap_or(slice)),
        PlaybackMode::Freeze => taps(ctx, time, slice),
    };

    if mode == PlaybackMode::Reverse || ctx.invert {
        plays.into_iter().map(|p| mirror(p, ctx.sample_duration)).collect()
    } else {
        plays
    }
}

// fill the step window with repeats of a short fragment
fn taps(ctx: &TriggerContext, time: f64, source: Slice) -> Vec<Play> {
    let tap = ctx.tap.clamp(MIN_TAP, MAX_TAP);
    let count = ((ctx.step_duration / tap).floor() as usize).max(1);
    let length = tap.min(source.length);
    (0..count)
        .map(|k| region(ctx, time + k as f64 * tap, source.start, length))
        .collect()
}

fn region(ctx: &TriggerContext, at: f64, offset: f64, duration: f64) -> Play {
    let total = ctx.sample_duration.max(MIN_PLAY);
    let offset = offset.clamp(0.0, total - MIN_PLAY);
    let duration = duration.clamp(MIN_PLAY, total - offset);
    Play {
        at,
        offset,
        duration,
        reverse: false,
        gain: ctx.gain,
        rate: ctx.rate,
    }
}

// same region, read back to front
fn mirror(play: Play, sample_duration: f64) -> Play {
    Play {
        offset: (sample_duration - play.offset - play.duration).max(0.0),
        reverse: !play.reverse,
        ..play
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn ctx() -> TriggerContext {
        TriggerContext {
            sample_duration: 2.0,
            step_duration: 0.125,
            tap: 0.04,
            chop: DEFAULT_CHOP,
            invert: false,
            gain: 1.0,
            rate: 1.0,
        }
    }

    const SLICE: Slice = Slice { start: 0.5, length: 0.25 };

    #[test]
    fn normal_plays_once_minus_margin() {
        let plays = trigger(SLICE, None, 3.0, PlaybackMode::Normal, &ctx());
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].at, 3.0);
        assert!((plays[0].offset - 0.5).abs() < EPS);
        assert!((plays[0].duration - (0.25 - SAFETY_MARGIN)).abs() < EPS);
        assert!(!plays[0].reverse);
    }

    #[test]
    fn reverse_mirrors_the_offset() {
        let plays = trigger(SLICE, None, 0.0, PlaybackMode::Reverse, &ctx());
        assert!(plays[0].reverse);
        let d = plays[0].duration;
        assert!((plays[0].offset - (2.0 - 0.5 - d)).abs() < EPS);
    }

    #[test]
    fn invert_flag_reverses_any_mode() {
        let c = TriggerContext { invert: true, ..ctx() };
        let plays = trigger(SLICE, None, 0.0, PlaybackMode::Chop, &c);
        assert!(plays[0].reverse);
        assert!((plays[0].offset - (2.0 - 0.5 - DEFAULT_CHOP)).abs() < EPS);
    }

    #[test]
    fn chop_caps_duration() {
        let plays = trigger(SLICE, None, 0.0, PlaybackMode::Chop, &ctx());
        assert!((plays[0].duration - DEFAULT_CHOP).abs() < EPS);
        let short = Slice { start: 0.0, length: 0.05 };
        let plays = trigger(short, None, 0.0, PlaybackMode::Chop, &ctx());
        assert!((plays[0].duration - 0.05).abs() < EPS);
    }

    #[test]
    fn stutter_fills_the_step_from_the_previous_slice() {
        let prev = Slice { start: 1.0, length: 0.2 };
        let plays = trigger(SLICE, Some(prev), 10.0, PlaybackMode::Stutter, &ctx());
        // floor(0.125 / 0.04) = 3
        assert_eq!(plays.len(), 3);
        for (k, p) in plays.iter().enumerate() {
            assert!((p.at - (10.0 + 0.04 * k as f64)).abs() < EPS);
            assert!((p.offset - 1.0).abs() < EPS);
            assert!((p.duration - 0.04).abs() < EPS);
        }
    }

    #[test]
    fn freeze_uses_the_current_slice_and_clamps_tap() {
        let c = TriggerContext { tap: 5.0, ..ctx() };
        let plays = trigger(SLICE, Some(Slice { start: 1.0, length: 0.2 }), 0.0, PlaybackMode::Freeze, &c);
        // tap clamps to 250ms, longer than the step: one repeat
        assert_eq!(plays.len(), 1);
        assert!((plays[0].offset - 0.5).abs() < EPS);
        assert!((plays[0].duration - 0.25).abs() < EPS);
    }

    #[test]
    fn swing_only_delays_odd_steps() {
        assert_eq!(swing_delay(0, 0.3, 0.1), 0.0);
        assert!((swing_delay(1, 0.3, 0.1) - 0.03).abs() < EPS);
        assert!((swing_delay(3, 10.0, 0.1) - 0.04).abs() < EPS);
    }

    #[test]
    fn regions_stay_inside_the_sample() {
        let wild = Slice { start: 1.95, length: 3.0 };
        let plays = trigger(wild, None, 0.0, PlaybackMode::Normal, &ctx());
        assert!(plays[0].offset >= 0.0);
        assert!(plays[0].offset + plays[0].duration <= 2.0 + EPS);
    }
}
