use crate::amp::stages::common::DcBlocker;

/// Internal oversampling ratio around the clipper.
pub const OVERSAMPLE_FACTOR: usize = 4;

/// Fractional positions of the interpolated sub-samples between the previous
/// and current input.
const POSITIONS: [f32; OVERSAMPLE_FACTOR] = [0.25, 0.5, 0.75, 1.0];

/// Per-channel 4x oversampler.
///
/// Upsampling is linear interpolation from the previous input, so it adds no
/// latency. Downsampling averages the four sub-samples and runs the result
/// through a DC blocker to remove the offset left by asymmetric clipping.
#[derive(Debug, Clone, Default)]
pub struct Oversampler {
    last_sample: f32,
    dc_blocker: DcBlocker,
}

impl Oversampler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn upsample(&mut self, input: f32) -> [f32; OVERSAMPLE_FACTOR] {
        let prev = self.last_sample;
        let delta = input - prev;
        let mut out = POSITIONS.map(|t| delta.mul_add(t, prev));
        // Land exactly on the input at position 1.0.
        out[OVERSAMPLE_FACTOR - 1] = input;
        self.last_sample = input;
        out
    }

    #[inline]
    pub fn downsample(&mut self, samples: [f32; OVERSAMPLE_FACTOR]) -> f32 {
        let average = samples.iter().sum::<f32>() * 0.25;
        self.dc_blocker.process(average)
    }

    pub fn reset(&mut self) {
        self.last_sample = 0.0;
        self.dc_blocker.reset();
    }
}
