use std::path::PathBuf;
use std::rc::Rc;

use basalt::audio_api::{AudioCommand, AudioOut};
use basalt::pipeline::params::patch_from_pairs;
use basalt::shared::{BusId, START_DELAY};
use basalt::test_utils::{write_click_wav, RecordingOut};
use basalt::{start, Context, Controller};

const RATE: u32 = 8000;
const EPS: f64 = 1e-9;

struct Rig {
    _dir: tempfile::TempDir,
    out: Rc<RecordingOut>,
    ctrl: Controller,
}

fn rig(pairs: &[&str]) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let sample: PathBuf = dir.path().join("amen.wav");
    write_click_wav(&sample, RATE, 2.0, 16).unwrap();
    let out = Rc::new(RecordingOut::new(RATE));
    let ctrl = start(Context {
        audio: out.clone(),
        params: patch_from_pairs(pairs.iter().copied()),
        sample,
        bus: BusId(2),
        events: None,
    })
    .unwrap();
    out.take();
    Rig { _dir: dir, out, ctrl }
}

// drive the host loop in small hops up to `until`
fn run_to(rig: &mut Rig, until: f64) {
    while rig.out.now() < until {
        rig.out.advance(0.01);
        rig.ctrl.tick();
    }
}

#[test]
fn grid_slices_play_in_pattern_order() {
    let mut r = rig(&["map=grid", "grid=16", "bpm=120"]);
    run_to(&mut r, 0.5);
    let plays = r.out.plays();
    assert!(plays.len() >= 4);
    for (i, p) in plays.iter().take(4).enumerate() {
        assert!((p.offset - i as f64 * 0.125).abs() < EPS, "step {i} offset {}", p.offset);
        assert!((p.at - (START_DELAY + i as f64 * 0.125)).abs() < EPS);
        assert_eq!(p.bus, BusId(2));
    }
}

#[test]
fn retune_mid_run_changes_the_gap_without_skip_or_repeat() {
    let mut r = rig(&["bpm=142", "div=4"]);
    run_to(&mut r, 0.4);
    r.ctrl.update(&patch_from_pairs(["bpm=90"]));
    run_to(&mut r, 1.5);

    let times: Vec<f64> = r.out.plays().iter().map(|p| p.at).collect();
    let fast = (60.0 / 142.0) / 4.0;
    let slow = (60.0 / 90.0) / 4.0;
    let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();

    // every gap is one of the two periods, fast ones first
    assert!(gaps.iter().all(|g| (g - fast).abs() < 1e-6 || (g - slow).abs() < 1e-6));
    let first_slow = gaps.iter().position(|g| (g - slow).abs() < 1e-6).unwrap();
    assert!(first_slow > 0);
    assert!(gaps[first_slow..].iter().all(|g| (g - slow).abs() < 1e-6));
}

#[test]
fn pattern_swap_is_seamless() {
    let mut r = rig(&["bpm=120"]);
    run_to(&mut r, 0.3);
    let before = r.ctrl.display().step;
    r.out.take();
    r.ctrl.update(&patch_from_pairs(["pattern=half"]));
    assert_eq!(r.ctrl.display().step, before);

    run_to(&mut r, 1.0);
    // half: hits on even steps only, so the next hit is on an even step
    let plays = r.out.plays();
    assert!(!plays.is_empty());
    let step_of = |at: f64| ((at - START_DELAY) / 0.125).round() as u64;
    assert!(plays.iter().all(|p| step_of(p.at) % 2 == 0));
    assert!(step_of(plays[0].at) >= before);
}

#[test]
fn swing_delays_odd_steps_only() {
    let mut r = rig(&["bpm=120", "swing=10", "map=grid"]);
    run_to(&mut r, 0.6);
    let plays = r.out.plays();
    // swing clamps to 0.4 of a 0.125s step
    let late = 0.4 * 0.125;
    for (i, p) in plays.iter().enumerate() {
        let grid = START_DELAY + i as f64 * 0.125;
        let expect = if i % 2 == 1 { grid + late } else { grid };
        assert!((p.at - expect).abs() < EPS, "step {i}");
    }
}

#[test]
fn stutter_fills_the_step_from_the_previous_slice() {
    let mut r = rig(&["bpm=120", "map=grid", "mode=stutter", "freeze_len=0.04"]);
    run_to(&mut r, 0.3);
    let plays = r.out.plays();
    // floor(0.125 / 0.04) = 3 taps per step
    assert_eq!(plays.len() % 3, 0);
    // step 1 replays slice 0
    assert!((plays[3].offset - 0.0).abs() < EPS);
    assert!((plays[4].at - plays[3].at - 0.04).abs() < EPS);
}

#[test]
fn invert_mirrors_offsets() {
    let mut r = rig(&["bpm=120", "map=grid", "invert=on"]);
    run_to(&mut r, 0.2);
    let p = &r.out.plays()[0];
    assert!(p.reverse);
    assert!((p.offset + p.duration - 2.0).abs() < EPS);
}

#[test]
fn chop_caps_each_hit() {
    let mut r = rig(&["bpm=120", "map=grid", "grid=4", "mode=chop"]);
    run_to(&mut r, 0.5);
    assert!(r.out.plays().iter().all(|p| p.duration <= 0.09 + EPS));
}

#[test]
fn seeded_density_reproduces() {
    let take = || {
        let mut r = rig(&["pattern=density", "density=0.4", "seed=1234", "bpm=160"]);
        run_to(&mut r, 2.0);
        r.out.plays().iter().map(|p| (p.at, p.offset)).collect::<Vec<_>>()
    };
    let a = take();
    assert!(!a.is_empty());
    assert_eq!(a, take());
}

#[test]
fn unknown_keys_do_not_disturb_playback() {
    let mut r = rig(&["bpm=120"]);
    run_to(&mut r, 0.2);
    assert!(r.ctrl.update(&patch_from_pairs(["wobble=11", "mode=sideways"])));
    run_to(&mut r, 0.5);
    assert!(r.ctrl.is_running());
    assert_eq!(r.ctrl.display().mode.label(), "NORMAL");
}

#[test]
fn stop_halts_and_releases_once() {
    let mut r = rig(&["bpm=120"]);
    run_to(&mut r, 0.3);
    r.ctrl.stop();
    r.ctrl.stop();
    let released: Vec<_> = r
        .out
        .take()
        .into_iter()
        .filter(|c| !matches!(c, AudioCommand::Play(_)))
        .collect();
    assert!(matches!(
        released[..],
        [AudioCommand::StopBus(BusId(2)), AudioCommand::UnregisterSample(_)]
    ));
    run_to(&mut r, 1.0);
    assert!(r.out.take().is_empty());
}

#[test]
fn blank_pattern_plays_the_density_model() {
    let mut r = rig(&["pattern=", "density=0.3", "seed=5", "bpm=120"]);
    run_to(&mut r, 2.0);
    let played = r.out.plays().len() as u64;
    assert!(played > 0);
    assert!(played < r.ctrl.display().step);
}
