pub mod clock;
pub mod params;
pub mod pattern;
pub mod persistence;
pub mod slices;
pub mod state;
pub mod trigger;
