// Fakes shared by unit and integration tests. Built for `cargo test` and
// behind the `test-utils` feature, never into a release library.

use std::cell::{Cell, RefCell};
use std::path::Path;

use crate::audio_api::{AudioCommand, AudioOut, PlayParams};

/// Audio sink that records every command against a hand-driven clock.
pub struct RecordingOut {
    sent: RefCell<Vec<AudioCommand>>,
    now: Cell<f64>,
    sample_rate: u32,
}

impl RecordingOut {
    pub fn new(sample_rate: u32) -> Self {
        Self { sent: RefCell::new(Vec::new()), now: Cell::new(0.0), sample_rate }
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set_now(&self, now: f64) {
        self.now.set(now);
    }

    // drains what was sent so far
    pub fn take(&self) -> Vec<AudioCommand> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn plays(&self) -> Vec<PlayParams> {
        plays_in(&self.sent.borrow())
    }
}

pub fn plays_in(cmds: &[AudioCommand]) -> Vec<PlayParams> {
    cmds.iter()
        .filter_map(|c| match c {
            AudioCommand::Play(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

impl AudioOut for RecordingOut {
    fn send(&self, cmd: AudioCommand) {
        self.sent.borrow_mut().push(cmd);
    }

    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Writes a mono 16-bit click track: one short burst every `1 / clicks` of the file.
pub fn write_click_wav(path: &Path, sample_rate: u32, seconds: f64, clicks: usize) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (seconds * sample_rate as f64) as usize;
    let every = (frames / clicks.max(1)).max(1);
    let mut w = hound::WavWriter::create(path, spec)?;
    for i in 0..frames {
        let s = if i % every < 64 { i16::MAX / 2 } else { 0 };
        w.write_sample(s)?;
    }
    w.finalize()?;
    Ok(())
}
