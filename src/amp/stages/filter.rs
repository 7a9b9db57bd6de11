use std::f64::consts::PI;

/// Corner frequency of the pre-distortion high-pass.
pub const PRE_EMPHASIS_CUTOFF_HZ: f64 = 75.0;
/// Butterworth Q for the pre-distortion high-pass.
pub const PRE_EMPHASIS_Q: f64 = 0.707;

/// Normalized biquad coefficients (`a0` folded into the others).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Pass-through coefficients, used before a sample rate is known.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// RBJ Audio EQ Cookbook high-pass.
    ///
    /// The design math runs in `f64` so the coefficients stay accurate for a
    /// 75 Hz corner at high sample rates. The cutoff is kept below Nyquist.
    pub fn highpass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let cutoff = cutoff_hz.min(sample_rate * 0.45);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (((1.0 + cos_w0) / 2.0) / a0) as f32,
            b1: (-(1.0 + cos_w0) / a0) as f32,
            b2: (((1.0 + cos_w0) / 2.0) / a0) as f32,
            a1: ((-2.0 * cos_w0) / a0) as f32,
            a2: ((1.0 - alpha) / a0) as f32,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct Form I history for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl BiquadState {
    /// `y = b0*x + b1*x1 + b2*x2 - a1*y1 - a2*y2`, then shift the history.
    #[inline]
    pub fn process(&mut self, c: &BiquadCoefficients, input: f32) -> f32 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2
            - c.a1 * self.y1
            - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Fixed high-pass applied ahead of the drive stage to keep low rumble out of
/// the clipper. Holds only the coefficients; each channel owns a [`BiquadState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PreEmphasis {
    coeffs: BiquadCoefficients,
}

impl PreEmphasis {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            coeffs: BiquadCoefficients::highpass(
                PRE_EMPHASIS_CUTOFF_HZ,
                PRE_EMPHASIS_Q,
                sample_rate,
            ),
        }
    }

    pub const fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    #[inline]
    pub fn apply(&self, input: f32, state: &mut BiquadState) -> f32 {
        state.process(&self.coeffs, input)
    }
}
