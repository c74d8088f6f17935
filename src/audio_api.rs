pub use crate::audio::{BusParams, SampleBuffer, SampleId};
use crate::shared::BusId;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayParams {
    pub bus: BusId,
    pub sample_id: SampleId,
    pub at: f64,       // audio clock time to start at
    pub offset: f64,   // seconds into the sample, counted from the end when reversed
    pub duration: f64, // seconds of sample
    pub reverse: bool,
    pub gain: f32,
    pub rate: f32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't decode files (that would stall the callback), so
    // buffers are decoded on the control side and handed over by id
    RegisterSample { id: SampleId, buffer: SampleBuffer },
    UnregisterSample(SampleId),

    Play(PlayParams),
    SetBus { bus: BusId, params: BusParams },

    // silence a bus: drops its scheduled plays and running voices
    StopBus(BusId),
}

/// The handle an instrument gets to the sound engine.
pub trait AudioOut {
    fn send(&self, cmd: AudioCommand);

    /// Seconds of audio rendered so far; the timeline every `at` refers to.
    fn now(&self) -> f64;

    fn sample_rate(&self) -> u32;
}
