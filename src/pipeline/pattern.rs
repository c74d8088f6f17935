// Step -> slice resolution: fixed named patterns, optional glitch
// substitution, and the density model for when no pattern is chosen.

use std::sync::Arc;

use rand::Rng;

pub const DEFAULT_PATTERN: &str = "amen";
pub const DENSITY_PATTERN: &str = "density";

// salt mixed into the density hash so other voices could share a seed
const DENSITY_SALT: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepCell {
    Rest,
    Hit { slice: usize, accent: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Rest,
    Slice { index: usize, accent: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    name: String,
    cells: Vec<StepCell>,
}

impl Pattern {
    /// Negative entries are rests.
    pub fn from_indices(name: &str, indices: &[i32]) -> Self {
        let cells = indices
            .iter()
            .map(|&i| {
                if i < 0 {
                    StepCell::Rest
                } else {
                    StepCell::Hit { slice: i as usize, accent: false }
                }
            })
            .collect();
        Self { name: name.to_string(), cells }
    }

    /// Parses a step list like `"0 1 2! - 4 ~ 6 7"`. Integers are slice
    /// indices, a trailing `!` accents the step, and `-`, `.` or `~` rest.
    /// Returns `None` if any token is not understood or the list is empty.
    pub fn parse(name: &str, text: &str) -> Option<Self> {
        let mut cells = Vec::new();
        for token in text.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            match token {
                "-" | "." | "~" => cells.push(StepCell::Rest),
                _ => {
                    let (digits, accent) = match token.strip_suffix('!') {
                        Some(d) => (d, true),
                        None => (token, false),
                    };
                    let slice = digits.parse::<usize>().ok()?;
                    cells.push(StepCell::Hit { slice, accent });
                }
            }
        }
        if cells.is_empty() {
            return None;
        }
        Some(Self { name: name.to_string(), cells })
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
    pub fn cells(&self) -> &[StepCell] { &self.cells }

    pub fn cell(&self, step: u64) -> StepCell {
        if self.cells.is_empty() {
            return StepCell::Rest;
        }
        self.cells[(step % self.cells.len() as u64) as usize]
    }
}

// What the resolver reads from each step
#[derive(Clone, Debug)]
pub enum PatternSource {
    Fixed(Arc<Pattern>),
    Density,
}

#[derive(Clone, Debug)]
pub struct PatternBank {
    patterns: Vec<Arc<Pattern>>,
}

impl PatternBank {
    pub fn builtin() -> Self {
        const R: i32 = -1;
        let patterns = vec![
            Pattern::from_indices("amen", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]),
            Pattern::from_indices("dnb2", &[
                0, 1, 1, 3, 4, 5, 5, 7, 8, 9, 9, 11, 12, 13, 14, 14,
                0, 1, 2, 2, 4, 4, 6, 7, 8, 8, 10, 11, 12, 12, 14, 15,
            ]),
            Pattern::from_indices("half", &[0, R, 4, R, 8, R, 12, R, 0, R, 4, R, 8, R, 12, R]),
            Pattern::from_indices("sparse", &[0, R, 2, R, 4, R, 6, R, 8, R, 10, R, 12, R, 14, R]),
            Pattern::from_indices("fill", &[
                0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
                15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0,
            ]),
            Pattern::from_indices("screw", &[
                0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
                15, 15, 14, 14, 13, 13, 12, 12, 11, 11, 10, 10, 9, 9, 8, 8,
            ]),
        ];
        Self { patterns: patterns.into_iter().map(Arc::new).collect() }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Pattern>> {
        self.patterns
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn default_pattern(&self) -> Arc<Pattern> {
        match self.get(DEFAULT_PATTERN) {
            Some(p) => p,
            None => Arc::new(Pattern::from_indices(DEFAULT_PATTERN, &[0])),
        }
    }

    // blank or "density" picks the density model; otherwise a bank name,
    // then an inline step list, else the default
    pub fn select(&self, name: &str) -> PatternSource {
        let name = name.trim();
        if name.is_empty() {
            return PatternSource::Density;
        }
        if let Some(p) = self.get(name) {
            return PatternSource::Fixed(p);
        }
        if name.eq_ignore_ascii_case(DENSITY_PATTERN) {
            return PatternSource::Density;
        }
        match Pattern::parse("custom", name) {
            Some(p) => PatternSource::Fixed(Arc::new(p)),
            None => PatternSource::Fixed(self.default_pattern()),
        }
    }
}

pub fn resolve_step<R: Rng>(
    step: u64,
    pattern: &Pattern,
    slice_count: usize,
    glitch: f64,
    rng: &mut R,
) -> Resolved {
    if slice_count == 0 {
        return Resolved::Rest;
    }
    let (slice, accent) = match pattern.cell(step) {
        StepCell::Rest => return Resolved::Rest,
        StepCell::Hit { slice, accent } => (slice.min(slice_count - 1), accent),
    };

    // substitution is applied to the looked-up index only
    let glitch = glitch.clamp(0.0, 1.0);
    if glitch > 0.0 && rng.gen_bool(glitch) {
        let index = if rng.gen_bool(0.5) {
            let delta = if rng.gen_bool(0.5) { slice_count - 1 } else { 1 };
            (slice + delta) % slice_count
        } else {
            rng.gen_range(0..slice_count)
        };
        return Resolved::Slice { index, accent };
    }
    Resolved::Slice { index: slice, accent }
}

// xorshift hash of an integer into [0, 1)
fn frac32(x: u32) -> f64 {
    let mut t = x;
    t ^= t << 13;
    t ^= t >> 17;
    t ^= t << 5;
    (t % 100_000) as f64 / 100_000.0
}

pub fn density_value(seed: u32, step: u64, salt: u32) -> f64 {
    let mixed = seed
        ^ (step as u32).wrapping_mul(73_856_093)
        ^ salt.wrapping_mul(19_349_663);
    frac32(mixed)
}

pub fn resolve_density<R: Rng>(
    step: u64,
    slice_count: usize,
    density: f64,
    seed: Option<u32>,
    rng: &mut R,
) -> Resolved {
    if slice_count == 0 {
        return Resolved::Rest;
    }
    let value = match seed {
        Some(seed) => density_value(seed, step, DENSITY_SALT),
        None => rng.r#gen::<f64>(),
    };
    if value < density.clamp(0.0, 1.0) {
        Resolved::Slice { index: (step % slice_count as u64) as usize, accent: false }
    } else {
        Resolved::Rest
    }
}
