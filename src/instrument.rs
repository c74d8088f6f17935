// Instrument entry point: load the sample, wire the hold macro, start the
// clock, and hand back a controller the host drives.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context as _;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::audio_api::{AudioCommand, AudioOut};
use crate::events::{self, EventBus, Subscription};
use crate::loader::sample_loader;
use crate::middle::Middle;
use crate::pipeline::params::Patch;
use crate::pipeline::state::EngineState;
use crate::shared::{BusId, DisplayState};

pub struct Context<'a> {
    pub audio: Rc<dyn AudioOut>,
    pub params: Patch, // initial configuration
    pub sample: PathBuf,
    pub bus: BusId,
    pub events: Option<&'a dyn EventBus>,
}

pub struct Controller {
    audio: Rc<dyn AudioOut>,
    middle: Middle,
    frozen: Rc<Cell<bool>>, // written by the hold macro
    subscriptions: Vec<Subscription>,
    stopped: bool,
}

// a seed makes glitch and humanize repeatable too
fn rng_for(params: &Patch) -> StdRng {
    match EngineState::from_params(params).seed {
        Some(seed) => StdRng::seed_from_u64(seed as u64),
        None => StdRng::from_entropy(),
    }
}

/// Loads the sample and starts playing. A sample that can't be read is an
/// error and nothing is started.
pub fn start(ctx: Context<'_>) -> anyhow::Result<Controller> {
    let sample = sample_loader::load(&ctx.sample, ctx.audio.sample_rate())
        .with_context(|| format!("loading sample {}", ctx.sample.display()))?;

    let mut middle = Middle::new(&ctx.params, ctx.bus, rng_for(&ctx.params));
    let frozen = Rc::new(Cell::new(false));
    let subscriptions = match ctx.events {
        Some(bus) => events::hold_macro(bus, frozen.clone()),
        None => Vec::new(),
    };

    let id = sample.id;
    ctx.audio.send(AudioCommand::RegisterSample { id, buffer: sample.buffer });
    for cmd in middle.sample_ready(id, sample.duration, ctx.audio.now()) {
        ctx.audio.send(cmd);
    }
    info!(bus = ctx.bus.0, pattern = %middle.state().pattern, bpm = middle.state().bpm, "instrument started");

    Ok(Controller {
        audio: ctx.audio,
        middle,
        frozen,
        subscriptions,
        stopped: false,
    })
}

impl Controller {
    /// Applies a live patch from the next step on. False once stopped.
    pub fn update(&mut self, patch: &Patch) -> bool {
        if self.stopped {
            return false;
        }
        for cmd in self.middle.apply(patch) {
            self.audio.send(cmd);
        }
        true
    }

    // called by the host loop, often enough to stay inside the lookahead
    pub fn tick(&mut self) {
        if self.stopped {
            return;
        }
        for cmd in self.middle.set_frozen(self.frozen.get()) {
            self.audio.send(cmd);
        }
        for cmd in self.middle.tick(self.audio.now()) {
            self.audio.send(cmd);
        }
    }

    // clock first, then audio resources, then subscriptions
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for cmd in self.middle.stop() {
            self.audio.send(cmd);
        }
        for sub in self.subscriptions.iter_mut() {
            sub.unsubscribe();
        }
        self.subscriptions.clear();
        info!("instrument stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && self.middle.is_running()
    }

    pub fn display(&self) -> DisplayState {
        self.middle.display()
    }

    // current params, for saving the session
    pub fn session(&self) -> Patch {
        self.middle.state().to_patch()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, HostEvent, Key, LocalBus};
    use crate::pipeline::params::patch_from_pairs;
    use crate::test_utils::{plays_in, write_click_wav, RecordingOut};

    const RATE: u32 = 8000;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("break.wav");
        write_click_wav(&path, RATE, 2.0, 16).unwrap();
        (dir, path)
    }

    fn context<'a>(out: &Rc<RecordingOut>, sample: PathBuf, pairs: &[&str], events: Option<&'a dyn EventBus>) -> Context<'a> {
        Context {
            audio: out.clone(),
            params: patch_from_pairs(pairs.iter().copied()),
            sample,
            bus: BusId(0),
            events,
        }
    }

    #[test]
    fn start_registers_then_configures_the_bus() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let ctrl = start(context(&out, path, &[], None)).unwrap();
        let sent = out.take();
        assert!(matches!(sent[0], AudioCommand::RegisterSample { .. }));
        assert!(matches!(sent[1], AudioCommand::SetBus { .. }));
        assert!(ctrl.is_running());
        assert_eq!(ctrl.display().slice_count, 16);
    }

    #[test]
    fn missing_sample_fails_without_sending_anything() {
        let out = Rc::new(RecordingOut::new(RATE));
        let result = start(context(&out, PathBuf::from("/nope/break.wav"), &[], None));
        assert!(result.is_err());
        assert!(out.take().is_empty());
    }

    #[test]
    fn stop_twice_is_fine_and_update_reports_it() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let mut ctrl = start(context(&out, path, &[], None)).unwrap();
        out.take();

        ctrl.stop();
        let released = out.take();
        assert!(matches!(released[..], [AudioCommand::StopBus(_), AudioCommand::UnregisterSample(_)]));
        ctrl.stop();
        drop(ctrl);
        assert!(out.take().is_empty());
    }

    #[test]
    fn update_after_stop_is_refused() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let mut ctrl = start(context(&out, path, &[], None)).unwrap();
        assert!(ctrl.update(&patch_from_pairs(["bpm=100"])));
        ctrl.stop();
        assert!(!ctrl.update(&patch_from_pairs(["bpm=120"])));
        assert!(!ctrl.is_running());
    }

    #[test]
    fn hold_macro_freezes_and_detaches_on_stop() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let bus = LocalBus::new();
        let mut ctrl = start(context(&out, path, &[], Some(&bus))).unwrap();
        assert_eq!(bus.handler_count(), 2);

        let chord = HostEvent { key: Key::Space, shift: true, console_focused: true };
        bus.emit(EventKind::KeyDown, &chord);
        ctrl.tick();
        assert!(ctrl.display().frozen);

        bus.emit(EventKind::KeyUp, &chord);
        ctrl.tick();
        assert!(!ctrl.display().frozen);

        ctrl.stop();
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn held_macro_ducks_and_screws_until_release() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let bus = LocalBus::new();
        let pairs = ["gain=0", "duck=0.35", "macro=screw", "bpm=120"];
        let mut ctrl = start(context(&out, path, &pairs, Some(&bus))).unwrap();
        out.take();

        let chord = HostEvent { key: Key::Space, shift: true, console_focused: true };
        bus.emit(EventKind::KeyDown, &chord);
        ctrl.tick();
        let sent = out.take();
        let AudioCommand::SetBus { params, .. } = &sent[0] else {
            panic!("expected the duck first, got {:?}", sent[0]);
        };
        assert!((params.gain - 0.35).abs() < 1e-6);
        let held = plays_in(&sent);
        assert!(!held.is_empty());
        assert!(held.iter().all(|p| p.reverse && p.rate == 0.5));

        bus.emit(EventKind::KeyUp, &chord);
        out.advance(0.2);
        ctrl.tick();
        let sent = out.take();
        let AudioCommand::SetBus { params, .. } = &sent[0] else {
            panic!("expected the bus restored, got {:?}", sent[0]);
        };
        assert!((params.gain - 1.0).abs() < 1e-6);
        let after = plays_in(&sent);
        assert!(!after.is_empty());
        assert!(after.iter().all(|p| !p.reverse && p.rate == 1.0));
    }

    #[test]
    fn session_reflects_live_patches() {
        let (_dir, path) = fixture();
        let out = Rc::new(RecordingOut::new(RATE));
        let mut ctrl = start(context(&out, path, &["bpm=120"], None)).unwrap();
        ctrl.update(&patch_from_pairs(["pattern=dnb2", "swing=0.2"]));
        let session = ctrl.session();
        assert_eq!(session["pattern"].as_text(), "dnb2");
        assert_eq!(session["bpm"].as_f64(), Some(120.0));
        assert_eq!(session["swing"].as_f64(), Some(0.2));
    }
}
