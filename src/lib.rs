pub mod audio;
pub mod audio_api;
pub mod events;
pub mod instrument;
pub mod loader;
pub mod middle;
pub mod pipeline;
pub mod shared;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use instrument::{start, Context, Controller};
