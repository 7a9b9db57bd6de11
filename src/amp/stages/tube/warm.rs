use crate::amp::stages::Stage;
use crate::amp::stages::common::{DcBlocker, OnePole};

const DRIVE: f32 = 1.3;
const BIAS: f32 = 0.2;
const OUTPUT_GAIN: f32 = 0.7;
const SMOOTHING_HZ: f32 = 9_000.0;
const COUPLING_HZ: f32 = 10.0;

/// Soft, biased tube. Shifting the operating point along the `tanh` curve
/// makes the two half-waves saturate differently, which adds even harmonics.
#[derive(Debug, Clone)]
pub struct WarmTube {
    coupling: DcBlocker,
    smoother: OnePole,
}

impl WarmTube {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            coupling: DcBlocker::new(COUPLING_HZ, sample_rate),
            smoother: OnePole::new(SMOOTHING_HZ, sample_rate),
        }
    }
}

impl Stage for WarmTube {
    fn process(&mut self, input: f32) -> f32 {
        let coupled = self.coupling.process(input);
        // Recentre so that silence stays silent.
        let shaped = DRIVE.mul_add(coupled, BIAS).tanh() - BIAS.tanh();
        self.smoother.process(shaped) * OUTPUT_GAIN
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coupling = DcBlocker::new(COUPLING_HZ, sample_rate);
        self.smoother.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.coupling.reset();
        self.smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_waves_saturate_differently() {
        let mut pos = WarmTube::new(48_000.0);
        let mut neg = WarmTube::new(48_000.0);
        let p = pos.process(0.9);
        let n = neg.process(-0.9);
        assert!(p > 0.0 && n < 0.0);
        assert!((p + n).abs() > 1e-3, "expected asymmetry, got {p} / {n}");
    }

    #[test]
    fn sample_rate_change_keeps_output_bounded() {
        let mut tube = WarmTube::new(44_100.0);
        tube.set_sample_rate(192_000.0);
        for i in 0..1000 {
            let x = if i % 3 == 0 { 1.0 } else { -0.7 };
            let y = tube.process(x);
            assert!(y.is_finite() && y.abs() <= 1.0);
        }
    }
}
