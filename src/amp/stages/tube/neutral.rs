use crate::amp::stages::Stage;
use crate::amp::stages::common::OnePole;

const DRIVE: f32 = 1.0;
const OUTPUT_GAIN: f32 = 0.92;
const SMOOTHING_HZ: f32 = 16_000.0;

/// Near-linear tube: a gentle symmetric `tanh` knee that only rounds off peaks.
#[derive(Debug, Clone)]
pub struct NeutralTube {
    smoother: OnePole,
}

impl NeutralTube {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            smoother: OnePole::new(SMOOTHING_HZ, sample_rate),
        }
    }
}

impl Stage for NeutralTube {
    fn process(&mut self, input: f32) -> f32 {
        let shaped = (input * DRIVE).tanh() * OUTPUT_GAIN;
        self.smoother.process(shaped)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.smoother.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.smoother.reset();
    }
}
