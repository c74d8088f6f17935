use std::path::Path;

use tracing::info;

use crate::audio::{next_sample_id, SampleBuffer, SampleId};

// A decoded sample, ready to hand to the engine
pub struct LoadedSample {
    pub id: SampleId,
    pub buffer: SampleBuffer,
    pub duration: f64, // seconds at the engine rate
}

// Load a WAV from disk, prepare for registration with the engine
pub fn load(path: &Path, target_rate: u32) -> anyhow::Result<LoadedSample> {
    let buffer = SampleBuffer::load_wav(path, target_rate)?;
    let id = next_sample_id();
    let duration = buffer.duration();
    info!(%id, path = %path.display(), duration, "sample loaded");
    Ok(LoadedSample { id, buffer, duration })
}
