// Cuts a sample into playable regions. A table is never edited once built;
// changing the strategy or the sample means building a new one.

use std::sync::Arc;

// Hand-tuned transient positions of the Amen break, normalized 0..1
pub const AMEN_ONSETS: [f64; 16] = [
    0.000, 0.071, 0.118, 0.176,
    0.226, 0.277, 0.329, 0.382,
    0.441, 0.493, 0.545, 0.595,
    0.644, 0.701, 0.753, 0.808,
];

pub const DEFAULT_GRID: usize = 16;

// used until the real sample length is known
pub const PLACEHOLDER_DURATION: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slice {
    pub start: f64,  // seconds into the sample
    pub length: f64, // seconds
}

impl Slice {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceStrategy {
    Onset,
    Grid(usize),
}

#[derive(Clone, Debug)]
pub struct SliceTable {
    duration: f64,
    strategy: SliceStrategy,
    slices: Arc<[Slice]>,
}

impl SliceTable {
    pub fn placeholder(strategy: SliceStrategy) -> Self {
        build_slices(PLACEHOLDER_DURATION, strategy)
    }

    pub fn duration(&self) -> f64 { self.duration }
    pub fn strategy(&self) -> SliceStrategy { self.strategy }
    pub fn len(&self) -> usize { self.slices.len() }
    pub fn is_empty(&self) -> bool { self.slices.is_empty() }
    pub fn slices(&self) -> &[Slice] { &self.slices }

    pub fn get(&self, index: usize) -> Option<Slice> {
        self.slices.get(index).copied()
    }
}

pub fn build_slices(duration: f64, strategy: SliceStrategy) -> SliceTable {
    let duration = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        PLACEHOLDER_DURATION
    };

    let slices: Vec<Slice> = match strategy {
        SliceStrategy::Onset => {
            let n = AMEN_ONSETS.len();
            (0..n)
                .map(|i| {
                    let start = AMEN_ONSETS[i] * duration;
                    // last slice runs to the very end of the sample
                    let end = if i + 1 < n { AMEN_ONSETS[i + 1] * duration } else { duration };
                    Slice { start, length: end - start }
                })
                .collect()
        }
        SliceStrategy::Grid(n) => {
            let n = n.max(1);
            let step = duration / n as f64;
            (0..n)
                .map(|i| Slice { start: i as f64 * step, length: step })
                .collect()
        }
    };

    SliceTable {
        duration,
        strategy,
        slices: slices.into(),
    }
}
