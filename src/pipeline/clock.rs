// Free-running step clock. It owns no thread: the host polls it with the
// current audio time and it reports every step due inside the lookahead
// window, each with its exact scheduled time.

use crate::shared::{MIN_BPM, MAX_BPM};

pub fn steps_per_second(bpm: f64, steps_per_beat: u32) -> f64 {
    (bpm.clamp(MIN_BPM, MAX_BPM) / 60.0) * steps_per_beat.max(1) as f64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    Stopped, // terminal
}

#[derive(Clone, Debug)]
pub struct StepClock {
    rate: f64,     // steps per second
    next_due: f64, // audio time of the next step
    state: ClockState,
}

impl StepClock {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: sane_rate(rate),
            next_due: 0.0,
            state: ClockState::Idle,
        }
    }

    pub fn start(&mut self, at: f64) {
        if self.state != ClockState::Idle {
            return;
        }
        self.next_due = at;
        self.state = ClockState::Running;
    }

    // Only the gap after the already scheduled step changes.
    pub fn retune(&mut self, rate: f64) {
        self.rate = sane_rate(rate);
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }

    pub fn state(&self) -> ClockState { self.state }
    pub fn is_running(&self) -> bool { self.state == ClockState::Running }
    pub fn rate(&self) -> f64 { self.rate }
    pub fn period(&self) -> f64 { 1.0 / self.rate }
    pub fn next_due(&self) -> f64 { self.next_due }

    pub fn poll(&mut self, now: f64, lookahead: f64, mut on_tick: impl FnMut(f64)) {
        if !self.is_running() {
            return;
        }
        let horizon = now + lookahead.max(0.0);
        while self.next_due < horizon {
            let due = self.next_due;
            self.next_due += self.period();
            on_tick(due);
        }
    }
}

// floor the rate so a zero or garbage tempo can't spin the poll loop
fn sane_rate(rate: f64) -> f64 {
    let floor = steps_per_second(MIN_BPM, 1);
    if rate.is_finite() { rate.max(floor) } else { floor }
}
