use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio_api::{AudioCommand, PlayParams};
use crate::shared::BusId;

use super::effect::{BusChain, Effect};
use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;
use super::SampleId;

// hard caps so the callback never grows a Vec
const MAX_VOICES: usize = 64;
const MAX_PENDING: usize = 256;
const MAX_SAMPLES: usize = 16;
pub const NUM_BUSES: usize = 4;
// render in chunks of at most this many frames
const CHUNK_FRAMES: usize = 1024;

// a play that was sent ahead of time and hasn't reached its start frame yet
#[derive(Clone, Debug)]
struct Pending {
    start_frame: u64,
    voice: Voice,
}

struct Bus {
    chain: BusChain,
    scratch: Vec<StereoFrame>,
}

pub struct Engine {
    sample_rate: f32,
    frames: u64, // frames rendered so far: the audio clock
    clock: Arc<AtomicU64>,
    samples: Vec<(SampleId, SampleBuffer)>,
    pending: Vec<Pending>,
    voices: Vec<Voice>,
    buses: Vec<Bus>,
}

impl Engine {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>) -> Self {
        let sample_rate = sample_rate as f32;
        let buses = (0..NUM_BUSES)
            .map(|_| Bus {
                chain: BusChain::new(sample_rate),
                scratch: vec![StereoFrame::zero(); CHUNK_FRAMES],
            })
            .collect();
        Self {
            sample_rate,
            frames: 0,
            clock,
            samples: Vec::with_capacity(MAX_SAMPLES),
            pending: Vec::with_capacity(MAX_PENDING),
            voices: Vec::with_capacity(MAX_VOICES),
            buses,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                if self.samples.len() < MAX_SAMPLES {
                    self.samples.push((id, buffer));
                }
            }
            AudioCommand::UnregisterSample(id) => {
                self.samples.retain(|(sid, _)| *sid != id);
                self.pending.retain(|p| p.voice.sample_id != id);
                self.voices.retain(|v| v.sample_id != id);
            }
            AudioCommand::Play(p) => self.schedule(p),
            AudioCommand::SetBus { bus, params } => {
                if let Some(b) = self.buses.get_mut(bus.0 as usize) {
                    b.chain.set(params);
                }
            }
            AudioCommand::StopBus(bus) => {
                self.pending.retain(|p| p.voice.bus != bus);
                self.voices.retain(|v| v.bus != bus);
            }
        }
    }

    fn schedule(&mut self, p: PlayParams) {
        if self.pending.len() >= MAX_PENDING || p.bus.0 as usize >= NUM_BUSES {
            return;
        }
        let Some(buffer) = self.buffer(p.sample_id) else {
            return;
        };
        let rate = buffer.sample_rate as f64;
        let total = buffer.data.len();

        // reversed offsets count from the end of the sample
        let length = ((p.duration * rate) as usize).min(total);
        let offset = ((p.offset * rate) as usize).min(total);
        let trim_start = if p.reverse {
            total.saturating_sub(offset + length)
        } else {
            offset
        };

        let voice = Voice::new(p.sample_id, p.bus, trim_start, length, p.rate, p.gain, p.reverse);
        let start_frame = (p.at.max(0.0) * self.sample_rate as f64).round() as u64;
        self.pending.push(Pending { start_frame, voice });
    }

    fn buffer(&self, id: SampleId) -> Option<&SampleBuffer> {
        self.samples.iter().find(|(sid, _)| *sid == id).map(|(_, b)| b)
    }

    pub fn bus_params(&self, bus: BusId) -> Option<super::BusParams> {
        self.buses.get(bus.0 as usize).map(|b| b.chain.params())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for chunk in out.chunks_mut(CHUNK_FRAMES) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        let chunk_start = self.frames;
        let chunk_end = chunk_start + n as u64;

        // promote plays that start inside this chunk
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_frame < chunk_end {
                let p = self.pending.swap_remove(i);
                if self.voices.len() < MAX_VOICES {
                    let wait = p.start_frame.saturating_sub(chunk_start) as usize;
                    self.voices.push(p.voice.delayed(wait));
                }
            } else {
                i += 1;
            }
        }

        for bus in self.buses.iter_mut() {
            bus.scratch[..n].fill(StereoFrame::zero());
        }
        for voice in self.voices.iter_mut() {
            let Some(buffer) = self.samples.iter().find(|(id, _)| *id == voice.sample_id).map(|(_, b)| b) else {
                voice.active = false;
                continue;
            };
            if let Some(bus) = self.buses.get_mut(voice.bus.0 as usize) {
                voice.render_into(buffer, &mut bus.scratch[..n]);
            }
        }
        self.voices.retain(|v| v.active);

        out.fill(StereoFrame::zero());
        for bus in self.buses.iter_mut() {
            let scratch = &mut bus.scratch[..n];
            bus.chain.process(scratch);
            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                o.mix(*s);
            }
        }

        self.frames = chunk_end;
        self.clock.store(self.frames, Ordering::Release);
    }
}
