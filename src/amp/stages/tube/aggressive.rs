use crate::amp::stages::Stage;
use crate::amp::stages::common::{EnvelopeFollower, OnePole};

const BASE_DRIVE: f32 = 3.0;
/// Fraction of the drive lost at full supply sag.
const SAG_DEPTH: f32 = 0.4;
const SAG_ATTACK_MS: f32 = 2.0;
const SAG_RELEASE_MS: f32 = 60.0;
/// Extra squash applied to the negative half-wave.
const NEGATIVE_SCALE: f32 = 0.85;
const OUTPUT_GAIN: f32 = 0.45;
const SMOOTHING_HZ: f32 = 12_000.0;
/// Keeps `x / (1 + |x|)` away from `inf / inf`.
const DRIVEN_LIMIT: f32 = 1e9;

/// Hard-driven tube with power-supply sag: loud passages pull the drive down,
/// so sustained notes compress while transients bite.
#[derive(Debug, Clone)]
pub struct AggressiveTube {
    sag: EnvelopeFollower,
    smoother: OnePole,
}

impl AggressiveTube {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sag: EnvelopeFollower::from_ms(SAG_ATTACK_MS, SAG_RELEASE_MS, sample_rate),
            smoother: OnePole::new(SMOOTHING_HZ, sample_rate),
        }
    }

    /// Effective drive after sag.
    pub fn drive(&self) -> f32 {
        BASE_DRIVE * SAG_DEPTH.mul_add(-self.sag.value().min(1.0), 1.0)
    }
}

impl Stage for AggressiveTube {
    fn process(&mut self, input: f32) -> f32 {
        let driven = (input * self.drive()).clamp(-DRIVEN_LIMIT, DRIVEN_LIMIT);
        self.sag.process(input);

        let clipped = driven / (1.0 + driven.abs());
        let shaped = if clipped < 0.0 {
            clipped * NEGATIVE_SCALE
        } else {
            clipped
        };
        self.smoother.process(shaped) * OUTPUT_GAIN
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sag = EnvelopeFollower::from_ms(SAG_ATTACK_MS, SAG_RELEASE_MS, sample_rate);
        self.smoother.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.sag.reset();
        self.smoother.reset();
    }
}
