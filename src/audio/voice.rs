use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::SampleId;
use crate::shared::BusId;

// short ramps at both ends so cut regions don't click
const FADE_FRAMES: f32 = 64.0;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[derive(Clone, Debug)]
pub struct Voice {
    pub sample_id: SampleId,
    pub bus: BusId,
    pub pos: f32, // frames from trim_start
    pub pitch: f32,
    pub gain: f32,
    pub active: bool,
    pub reverse: bool,
    trim_start: usize,
    length: usize,
    wait: usize, // frames of silence before the first read
}

impl Voice {
    pub fn new(
        sample_id: SampleId,
        bus: BusId,
        trim_start: usize,
        length: usize,
        pitch: f32,
        gain: f32,
        reverse: bool,
    ) -> Self {
        let pos = if reverse && length > 0 {
            (length - 1) as f32
        } else {
            0.0
        };
        Self {
            sample_id,
            bus,
            pos,
            pitch: pitch.max(0.01),
            gain,
            active: length > 0,
            reverse,
            trim_start,
            length,
            wait: 0,
        }
    }

    pub fn delayed(mut self, frames: usize) -> Self {
        self.wait = frames;
        self
    }

    fn envelope(&self) -> f32 {
        let done = if self.reverse {
            self.length as f32 - 1.0 - self.pos
        } else {
            self.pos
        };
        let left = self.length as f32 - done;
        (done / FADE_FRAMES).min(left / FADE_FRAMES).clamp(0.0, 1.0)
    }

    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        let available = buffer.data.len().saturating_sub(self.trim_start);
        self.length = self.length.min(available);
        if self.length == 0 {
            self.active = false;
            return;
        }

        let data = &buffer.data;
        for frame in out.iter_mut() {
            if self.wait > 0 {
                self.wait -= 1;
                continue;
            }
            if self.pos < 0.0 || self.pos >= self.length as f32 {
                self.active = false;
                break;
            }

            let i = self.pos as usize;
            let frac = self.pos - i as f32;
            let idx = self.trim_start + i;
            let s0 = data[idx];
            let s1 = data.get(idx + 1).copied().unwrap_or(s0);
            let sample = StereoFrame {
                left: lerp(s0.left, s1.left, frac),
                right: lerp(s0.right, s1.right, frac),
            };
            frame.mix(sample.scaled(self.gain * self.envelope()));

            if self.reverse {
                self.pos -= self.pitch;
            } else {
                self.pos += self.pitch;
            }
        }
    }
}
