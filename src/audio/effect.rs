use std::f32::consts::TAU;

use super::frame::StereoFrame;

// Master chain settings for one output bus
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BusParams {
    pub gain: f32,  // linear
    pub hpf: f32,   // Hz
    pub lpf: f32,   // Hz
    pub crush: f32, // 0 = dry, 1 = fully crushed
}

impl Default for BusParams {
    fn default() -> Self {
        Self { gain: 1.0, hpf: 20.0, lpf: 20000.0, crush: 0.0 }
    }
}

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

// more crush means fewer levels: 0 -> 8 bits, 1 -> 3 bits
fn crush_levels(amount: f32) -> f32 {
    let bits = (8.0 - 5.0 * amount.clamp(0.0, 1.0)).round();
    2f32.powf(bits)
}

pub struct Bitcrusher {
    levels: f32,
    wet: f32,
}

impl Bitcrusher {
    pub fn new(amount: f32) -> Self {
        Self { levels: crush_levels(amount), wet: amount.clamp(0.0, 1.0) }
    }
}

impl Effect for Bitcrusher {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        if self.wet <= 0.0 {
            return;
        }
        let scale = (self.levels - 1.0) * 0.5;
        let inv = 1.0 / scale;
        let dry = 1.0 - self.wet;
        for f in buf.iter_mut() {
            let l = (f.left.clamp(-1.0, 1.0) * scale).round() * inv;
            let r = (f.right.clamp(-1.0, 1.0) * scale).round() * inv;
            f.left = f.left * dry + l * self.wet;
            f.right = f.right * dry + r * self.wet;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

// one-pole, 6dB/oct
pub struct OnePole {
    kind: FilterKind,
    coeff: f32,
    state: StereoFrame,
}

impl OnePole {
    pub fn new(kind: FilterKind, cutoff: f32, sample_rate: f32) -> Self {
        let mut f = Self { kind, coeff: 0.0, state: StereoFrame::zero() };
        f.set_cutoff(cutoff, sample_rate);
        f
    }

    pub fn set_cutoff(&mut self, cutoff: f32, sample_rate: f32) {
        let nyquist = sample_rate * 0.5;
        let fc = cutoff.clamp(1.0, nyquist * 0.99);
        self.coeff = 1.0 - (-TAU * fc / sample_rate).exp();
    }
}

impl Effect for OnePole {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            self.state.left += self.coeff * (f.left - self.state.left);
            self.state.right += self.coeff * (f.right - self.state.right);
            if self.kind == FilterKind::LowPass {
                *f = self.state;
            } else {
                f.left -= self.state.left;
                f.right -= self.state.right;
            }
        }
    }
}

// hpf -> lpf -> crush -> gain
pub struct BusChain {
    sample_rate: f32,
    params: BusParams,
    hpf: OnePole,
    lpf: OnePole,
    crush: Bitcrusher,
}

impl BusChain {
    pub fn new(sample_rate: f32) -> Self {
        let params = BusParams::default();
        Self {
            sample_rate,
            params,
            hpf: OnePole::new(FilterKind::HighPass, params.hpf, sample_rate),
            lpf: OnePole::new(FilterKind::LowPass, params.lpf, sample_rate),
            crush: Bitcrusher::new(params.crush),
        }
    }

    pub fn set(&mut self, params: BusParams) {
        self.params = params;
        self.hpf.set_cutoff(params.hpf, self.sample_rate);
        self.lpf.set_cutoff(params.lpf, self.sample_rate);
        self.crush = Bitcrusher::new(params.crush);
    }

    pub fn params(&self) -> BusParams {
        self.params
    }
}

impl Effect for BusChain {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        self.hpf.process(buf);
        self.lpf.process(buf);
        self.crush.process(buf);
        let gain = self.params.gain;
        for f in buf.iter_mut() {
            *f = f.scaled(gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_crusher_is_transparent() {
        let mut c = Bitcrusher::new(0.0);
        let mut buf = vec![StereoFrame::mono(0.123); 8];
        c.process(&mut buf);
        assert!(buf.iter().all(|f| f.left == 0.123));
    }

    #[test]
    fn full_crush_quantizes() {
        let mut c = Bitcrusher::new(1.0); // 3 bits
        let mut buf = vec![StereoFrame::mono(0.123)];
        c.process(&mut buf);
        let step = 2.0 / 7.0;
        let q = buf[0].left / step;
        assert!((q - q.round()).abs() < 1e-5);
    }

    #[test]
    fn highpass_removes_dc() {
        let mut f = OnePole::new(FilterKind::HighPass, 100.0, 44100.0);
        let mut buf = vec![StereoFrame::mono(1.0); 44100];
        f.process(&mut buf);
        assert!(buf.last().unwrap().left.abs() < 1e-3);
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = OnePole::new(FilterKind::LowPass, 1000.0, 44100.0);
        let mut buf = vec![StereoFrame::mono(1.0); 4410];
        f.process(&mut buf);
        assert!((buf.last().unwrap().left - 1.0).abs() < 1e-3);
    }
}
