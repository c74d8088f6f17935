// The instrument core. Sits between the host (ticks, patches, key macros)
// and the audio engine: everything it decides comes back out as
// AudioCommands, so it never touches a device or a file.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::audio_api::{AudioCommand, BusParams, PlayParams, SampleId};
use crate::pipeline::clock::{ClockState, StepClock};
use crate::pipeline::params::Patch;
use crate::pipeline::pattern::{resolve_density, resolve_step, PatternBank, PatternSource, Resolved};
use crate::pipeline::slices::{build_slices, Slice, SliceTable};
use crate::pipeline::state::EngineState;
use crate::pipeline::trigger::{self, swing_delay, TriggerContext, ACCENT_GAIN};
use crate::shared::{BusId, DisplayState, PlaybackMode, LOOKAHEAD, START_DELAY};

pub struct Middle {
    state: EngineState,
    slices: SliceTable,
    bank: PatternBank,
    source: PatternSource,
    clock: StepClock,
    rng: StdRng,
    bus: BusId,
    sample: Option<SampleId>, // registered with the engine
    previous: Option<Slice>,  // stutter reads from here
    last_slice: Option<usize>,
    frozen: bool,             // hold macro engaged
}

impl Middle {
    pub fn new(params: &Patch, bus: BusId, rng: StdRng) -> Self {
        let state = EngineState::from_params(params);
        let bank = PatternBank::builtin();
        let source = bank.select(&state.pattern);
        Self {
            slices: SliceTable::placeholder(state.slice_strategy()),
            clock: StepClock::new(state.steps_per_second()),
            state,
            bank,
            source,
            rng,
            bus,
            sample: None,
            previous: None,
            last_slice: None,
            frozen: false,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn slices(&self) -> &SliceTable {
        &self.slices
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.clock.state() == ClockState::Stopped
    }

    // The sample is decoded and registered: cut the real table and start
    // the clock a little ahead of the audio clock.
    pub fn sample_ready(&mut self, id: SampleId, duration: f64, now: f64) -> Vec<AudioCommand> {
        if self.is_stopped() {
            // stopped while loading; the caller still owns the registration
            return vec![AudioCommand::UnregisterSample(id)];
        }
        self.sample = Some(id);
        self.slices = build_slices(duration, self.state.slice_strategy());
        self.clock.start(now + START_DELAY);
        info!(%id, slices = self.slices.len(), duration = self.slices.duration(), "slicer started");
        vec![self.bus_command()]
    }

    // Turn every step due before now + lookahead into play commands.
    pub fn tick(&mut self, now: f64) -> Vec<AudioCommand> {
        let mut due = Vec::new();
        self.clock.poll(now, LOOKAHEAD, |t| due.push(t));

        let mut cmds = Vec::new();
        for at in due {
            self.fire_step(at, &mut cmds);
        }
        cmds
    }

    fn fire_step(&mut self, at: f64, cmds: &mut Vec<AudioCommand>) {
        let step = self.state.step;
        self.state.step += 1;

        let slowdown = self.state.slowdown.max(1) as u64;
        if step % slowdown != 0 {
            return;
        }
        let Some(id) = self.sample else {
            return;
        };

        let count = self.slices.len();
        let resolved = match &self.source {
            PatternSource::Fixed(pattern) => {
                resolve_step(step, pattern, count, self.state.glitch, &mut self.rng)
            }
            PatternSource::Density => {
                resolve_density(step, count, self.state.density, self.state.seed, &mut self.rng)
            }
        };
        let Resolved::Slice { index, accent } = resolved else {
            if self.state.debug {
                info!(step, "rest");
            }
            return;
        };
        let Some(slice) = self.slices.get(index) else {
            return;
        };

        let step_duration = self.state.step_duration();
        let mut time = at + swing_delay(step, self.state.swing, step_duration);
        if self.state.human_ms > 0.0 {
            let h = self.state.human_ms / 1000.0;
            time += self.rng.gen_range(-h..=h);
        }
        let time = time.max(at);

        let ctx = TriggerContext {
            sample_duration: self.slices.duration(),
            step_duration,
            tap: self.state.freeze_len,
            chop: self.state.chop_len,
            invert: self.state.invert,
            gain: if accent { ACCENT_GAIN } else { 1.0 },
            rate: self.state.playback_rate() * self.held_rate(),
        };
        let plays = trigger::trigger(slice, self.previous, time, self.mode(), &ctx);
        if self.state.debug {
            info!(step, slice = index, accent, mode = self.mode().label(), plays = plays.len(), time, "step");
        }

        cmds.extend(plays.into_iter().map(|p| {
            AudioCommand::Play(PlayParams {
                bus: self.bus,
                sample_id: id,
                at: p.at,
                offset: p.offset,
                duration: p.duration,
                reverse: p.reverse,
                gain: p.gain,
                rate: p.rate,
            })
        }));
        self.previous = Some(slice);
        self.last_slice = Some(index);
    }

    // the hold macro overrides whatever mode is set
    fn mode(&self) -> PlaybackMode {
        match self.frozen.then(|| self.state.hold.mode()).flatten() {
            Some(mode) => mode,
            None => self.state.mode,
        }
    }

    fn held_rate(&self) -> f32 {
        if self.frozen {
            self.state.hold.rate_factor(self.state.slowdown)
        } else {
            1.0
        }
    }

    // Apply a live patch. Takes effect from the next step; commands already
    // sent are left alone.
    pub fn apply(&mut self, patch: &Patch) -> Vec<AudioCommand> {
        let changes = self.state.apply(patch);
        let mut cmds = Vec::new();
        if changes.tempo {
            self.clock.retune(self.state.steps_per_second());
        }
        if changes.slicing {
            let strategy = self.state.slice_strategy();
            if strategy != self.slices.strategy() {
                self.slices = build_slices(self.slices.duration(), strategy);
                self.previous = None;
            }
        }
        if changes.pattern {
            self.source = self.bank.select(&self.state.pattern);
        }
        if changes.bus && self.sample.is_some() {
            cmds.push(self.bus_command());
        }
        if changes.any() {
            debug!(?changes, "patch applied");
        }
        cmds
    }

    fn bus_command(&self) -> AudioCommand {
        AudioCommand::SetBus {
            bus: self.bus,
            params: BusParams {
                gain: self.state.gain_linear() * if self.frozen { self.state.duck as f32 } else { 1.0 },
                hpf: self.state.hpf as f32,
                lpf: self.state.lpf as f32,
                crush: self.state.crush as f32,
            },
        }
    }

    // Arming or releasing the hold re-sends the bus so the duck level
    // follows it.
    pub fn set_frozen(&mut self, frozen: bool) -> Vec<AudioCommand> {
        if self.frozen == frozen {
            return Vec::new();
        }
        debug!(frozen, hold = self.state.hold.name(), "hold macro");
        self.frozen = frozen;
        if self.sample.is_some() && self.is_running() {
            vec![self.bus_command()]
        } else {
            Vec::new()
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // Halt the clock, then release what the engine holds for us. Safe to
    // call again: the second call has nothing left to release.
    pub fn stop(&mut self) -> Vec<AudioCommand> {
        let was_stopped = self.is_stopped();
        self.clock.stop();
        let mut cmds = Vec::new();
        if !was_stopped {
            cmds.push(AudioCommand::StopBus(self.bus));
        }
        if let Some(id) = self.sample.take() {
            cmds.push(AudioCommand::UnregisterSample(id));
        }
        cmds
    }

    pub fn display(&self) -> DisplayState {
        DisplayState {
            running: self.is_running(),
            loaded: self.sample.is_some(),
            frozen: self.frozen,
            step: self.state.step,
            last_slice: self.last_slice,
            slice_count: self.slices.len(),
            pattern: self.state.pattern.clone(),
            mode: self.mode(),
            bpm: self.state.bpm,
            swing: self.state.swing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::params::patch_from_pairs;
    use crate::pipeline::slices::SliceStrategy;
    use rand::SeedableRng;

    const ID: SampleId = SampleId(7);

    fn middle(pairs: &[&str]) -> Middle {
        Middle::new(&patch_from_pairs(pairs.iter().copied()), BusId(1), StdRng::seed_from_u64(1))
    }

    fn plays(cmds: &[AudioCommand]) -> Vec<PlayParams> {
        cmds.iter()
            .filter_map(|c| match c {
                AudioCommand::Play(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nothing_plays_before_the_sample_is_ready() {
        let mut m = middle(&[]);
        assert!(m.tick(5.0).is_empty());
        assert_eq!(m.slices().duration(), 2.0);
        assert!(!m.display().running);
    }

    #[test]
    fn sample_ready_rebuilds_the_table_and_starts() {
        let mut m = middle(&["map=grid", "grid=8"]);
        let cmds = m.sample_ready(ID, 4.0, 1.0);
        assert!(matches!(cmds[..], [AudioCommand::SetBus { bus: BusId(1), .. }]));
        assert_eq!(m.slices().len(), 8);
        assert_eq!(m.slices().duration(), 4.0);

        // first step lands START_DELAY after "now"
        let first = plays(&m.tick(1.0));
        assert!(!first.is_empty());
        assert!((first[0].at - (1.0 + START_DELAY)).abs() < 1e-9);
        assert_eq!(first[0].sample_id, ID);
        assert_eq!(first[0].bus, BusId(1));
    }

    #[test]
    fn rests_do_not_play() {
        let mut m = middle(&["pattern=0 - 2 3", "bpm=120", "div=4"]);
        m.sample_ready(ID, 2.0, 0.0);
        // 8 steps/s from 0.03: steps 0..=4 are due before 0.5 + lookahead
        let fired = plays(&m.tick(0.5));
        assert_eq!(m.state().step, 5);
        assert_eq!(fired.len(), 4);
        assert_eq!(m.display().last_slice, Some(0));
    }

    #[test]
    fn pattern_swap_keeps_the_step_counter() {
        let mut m = middle(&[]);
        m.sample_ready(ID, 2.0, 0.0);
        m.tick(1.0);
        let before = m.state().step;
        assert!(before > 0);
        m.apply(&patch_from_pairs(["pattern=half"]));
        assert_eq!(m.state().step, before);
        assert_eq!(m.display().pattern, "half");
    }

    #[test]
    fn tempo_patch_retunes_without_restart() {
        let mut m = middle(&["bpm=142"]);
        m.sample_ready(ID, 2.0, 0.0);
        m.tick(0.0);
        let step = m.state().step;
        m.apply(&patch_from_pairs(["bpm=90"]));
        assert!(m.is_running());
        assert_eq!(m.state().step, step);
        assert!((m.state().step_duration() - (60.0 / 90.0) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn swing_patch_is_clamped() {
        let mut m = middle(&[]);
        m.apply(&patch_from_pairs(["swing=10"]));
        assert!(m.display().swing <= 0.4);
    }

    #[test]
    fn slicing_patch_swaps_the_table() {
        let mut m = middle(&[]);
        m.sample_ready(ID, 3.0, 0.0);
        assert_eq!(m.slices().strategy(), SliceStrategy::Onset);
        m.apply(&patch_from_pairs(["map=grid", "grid=4"]));
        assert_eq!(m.slices().strategy(), SliceStrategy::Grid(4));
        assert_eq!(m.slices().duration(), 3.0);
        assert!((m.slices().slices()[1].start - 0.75).abs() < 1e-9);
    }

    #[test]
    fn bus_patch_sends_one_set_bus() {
        let mut m = middle(&[]);
        m.sample_ready(ID, 2.0, 0.0);
        let cmds = m.apply(&patch_from_pairs(["lpf=800", "crush=0.5", "gain=0"]));
        assert_eq!(cmds.len(), 1);
        let AudioCommand::SetBus { params, .. } = &cmds[0] else {
            panic!("expected SetBus");
        };
        assert_eq!(params.lpf, 800.0);
        assert_eq!(params.crush, 0.5);
        assert!((params.gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn freeze_macro_overrides_mode() {
        let mut m = middle(&["mode=chop", "freeze_len=0.03", "bpm=120"]);
        m.sample_ready(ID, 2.0, 0.0);
        m.set_frozen(true);
        assert_eq!(m.display().mode, PlaybackMode::Freeze);
        let cmds = m.tick(0.0);
        // 0.125s step / 0.03s taps
        assert_eq!(plays(&cmds).len(), 4);
        m.set_frozen(false);
        assert_eq!(m.display().mode, PlaybackMode::Chop);
    }

    fn bus_gain(cmds: &[AudioCommand]) -> f32 {
        match cmds {
            [AudioCommand::SetBus { params, .. }] => params.gain,
            other => panic!("expected one SetBus, got {other:?}"),
        }
    }

    #[test]
    fn hold_macro_picks_the_held_mode() {
        let mut m = middle(&["macro=stutter", "mode=chop"]);
        m.sample_ready(ID, 2.0, 0.0);
        m.set_frozen(true);
        assert_eq!(m.display().mode, PlaybackMode::Stutter);

        m.apply(&patch_from_pairs(["macro=invert"]));
        assert_eq!(m.display().mode, PlaybackMode::Reverse);

        // slow leaves the mode alone
        m.apply(&patch_from_pairs(["macro=slow"]));
        assert_eq!(m.display().mode, PlaybackMode::Chop);
    }

    #[test]
    fn screw_and_slow_drop_the_rate_until_release() {
        let mut m = middle(&["macro=screw", "bpm=120"]);
        m.sample_ready(ID, 2.0, 0.0);
        m.set_frozen(true);
        let held = plays(&m.tick(0.0));
        assert!(!held.is_empty());
        assert!(held.iter().all(|p| p.rate == 0.5 && p.reverse));

        m.apply(&patch_from_pairs(["macro=slow", "slowdown=1"]));
        let slow = plays(&m.tick(0.5));
        assert!(!slow.is_empty());
        assert!(slow.iter().all(|p| p.rate == 0.5 && !p.reverse));

        m.set_frozen(false);
        let after = plays(&m.tick(1.0));
        assert!(!after.is_empty());
        assert!(after.iter().all(|p| p.rate == 1.0));
    }

    #[test]
    fn duck_dips_the_bus_while_held() {
        let mut m = middle(&["gain=0", "duck=0.25"]);
        m.sample_ready(ID, 2.0, 0.0);
        assert!((bus_gain(&m.set_frozen(true)) - 0.25).abs() < 1e-6);
        // no change, nothing sent
        assert!(m.set_frozen(true).is_empty());
        // a gain patch while held keeps the dip
        let cmds = m.apply(&patch_from_pairs(["gain=-6"]));
        assert!((bus_gain(&cmds) - 0.25 * 10f32.powf(-6.0 / 20.0)).abs() < 1e-6);
        let cmds = m.set_frozen(false);
        assert!((bus_gain(&cmds) - 10f32.powf(-6.0 / 20.0)).abs() < 1e-6);
    }

    #[test]
    fn hold_before_the_sample_sends_nothing() {
        let mut m = middle(&["duck=0.5"]);
        assert!(m.set_frozen(true).is_empty());
        assert!(m.is_frozen());
    }

    #[test]
    fn blank_pattern_runs_the_density_model() {
        let mut m = middle(&["pattern=", "density=0.3", "seed=5", "bpm=120"]);
        assert!(matches!(m.source, PatternSource::Density));
        m.sample_ready(ID, 2.0, 0.0);
        let cmds = m.tick(2.0);
        let fired = m.state().step as usize;
        let played = plays(&cmds).len();
        assert!(played > 0);
        assert!(played < fired);
    }

    #[test]
    fn slowdown_skips_steps_but_counts_them() {
        let mut m = middle(&["slowdown=4", "bpm=120"]);
        m.sample_ready(ID, 2.0, 0.0);
        let cmds = m.tick(0.5);
        let fired = m.state().step;
        assert_eq!(plays(&cmds).len() as u64, fired.div_ceil(4));
    }

    #[test]
    fn stop_is_ordered_and_idempotent() {
        let mut m = middle(&[]);
        m.sample_ready(ID, 2.0, 0.0);
        let cmds = m.stop();
        assert!(matches!(
            cmds[..],
            [AudioCommand::StopBus(BusId(1)), AudioCommand::UnregisterSample(ID)]
        ));
        assert!(m.stop().is_empty());
        assert!(m.tick(10.0).is_empty());
    }

    #[test]
    fn stop_before_the_sample_is_ready() {
        let mut m = middle(&[]);
        let cmds = m.stop();
        assert!(matches!(cmds[..], [AudioCommand::StopBus(_)]));
        // a load that finishes afterwards is handed straight back
        let cmds = m.sample_ready(ID, 2.0, 0.0);
        assert!(matches!(cmds[..], [AudioCommand::UnregisterSample(ID)]));
        assert!(!m.is_running());
        assert!(m.tick(5.0).is_empty());
    }

    #[test]
    fn seeded_density_is_reproducible() {
        let run = |rng_seed: u64| {
            let patch = patch_from_pairs(["pattern=density", "seed=99", "density=0.5"]);
            let mut m = Middle::new(&patch, BusId(0), StdRng::seed_from_u64(rng_seed));
            m.sample_ready(ID, 2.0, 0.0);
            plays(&m.tick(2.0)).iter().map(|p| p.at).collect::<Vec<_>>()
        };
        assert_eq!(run(1), run(2));
    }
}
