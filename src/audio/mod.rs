use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::audio_api::{AudioCommand, AudioOut};

mod effect;
mod engine;
mod frame;
mod sample_buffer;
mod sample_id;
mod voice;

pub use effect::{BusParams, Effect};
pub use engine::{Engine, NUM_BUSES};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use sample_id::{next_sample_id, SampleId};

const COMMAND_QUEUE: usize = 1024;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: Arc<AtomicU64>, // frames rendered, written by the callback
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioOut for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping command");
        }
    }

    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let sample_rate: u32 = config.sample_rate;
    let channels = config.channels as usize;

    if sample_format != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported sample format {sample_format:?} (only f32 supported for now)");
    }

    let clock = Arc::new(AtomicU64::new(0));
    let stream = build_output_stream_f32(&device, &config, rx, clock.clone(), sample_rate, channels)?;
    stream.play().context("failed to play output stream")?;
    info!(sample_rate, channels, "audio output running");

    Ok(AudioHandle {
        tx,
        clock,
        sample_rate,
        _output_stream: stream,
    })
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate, clock);
    // interleaving scratch for devices that aren't plain stereo
    let mut frames: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if channels == 2 {
                // SAFETY: StereoFrame is repr(C) with two f32 fields, and the
                // slice holds exactly n_frames interleaved pairs
                let out: &mut [StereoFrame] = unsafe {
                    std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut StereoFrame, n_frames)
                };
                engine.render_block(out);
                return;
            }

            if frames.len() < n_frames {
                frames.resize(n_frames, StereoFrame::zero());
            }
            let out = &mut frames[..n_frames];
            engine.render_block(out);
            for (chunk, f) in data.chunks_exact_mut(channels).zip(out.iter()) {
                if channels == 1 {
                    chunk[0] = 0.5 * (f.left + f.right);
                } else {
                    chunk[0] = f.left;
                    chunk[1] = f.right;
                    chunk[2..].fill(0.0);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
