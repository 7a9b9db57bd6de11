use std::f32::consts::PI;

/// Values below this are flushed to zero in feedback paths.
pub const DENORMAL_THRESHOLD: f32 = 1e-20;

/// Convert linear amplitude to decibels, floored at `floor_db`.
#[inline]
pub fn lin_to_db(lin: f32, floor_db: f32) -> f32 {
    if lin > 1e-10 {
        (20.0 * lin.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// Calculate a one-pole smoothing coefficient from a time constant in milliseconds.
///
/// Returns `exp(-1 / (sample_rate * time_ms * 0.001))`.
/// Useful for attack/release envelopes and sag filters.
#[inline]
pub fn calculate_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (sample_rate * 0.001 * time_ms)).exp()
}

#[inline]
fn flush_denormal(value: f32) -> f32 {
    if value.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        value
    }
}

/// DC blocker using a first-order high-pass filter.
///
/// `y[n] = x[n] - x[n-1] + R * y[n-1]`
///
/// Reference: <https://ccrma.stanford.edu/~jos/fp/DC_Blocker.html>
#[derive(Clone, Debug)]
pub struct DcBlocker {
    x_prev: f32,
    y_prev: f32,
    coeff: f32,
}

impl DcBlocker {
    /// Pole radius used after the oversampling decimator.
    pub const DEFAULT_COEFF: f32 = 0.995;

    pub const fn with_coefficient(coeff: f32) -> Self {
        Self {
            x_prev: 0.0,
            y_prev: 0.0,
            coeff,
        }
    }

    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        Self::with_coefficient((-2.0 * PI * cutoff_hz / sample_rate).exp())
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.coeff.mul_add(self.y_prev, input - self.x_prev);
        self.x_prev = input;
        self.y_prev = flush_denormal(output);
        output
    }

    pub const fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::with_coefficient(Self::DEFAULT_COEFF)
    }
}

/// One-pole low-pass used to smooth the output of the saturation curves.
#[derive(Clone, Debug)]
pub struct OnePole {
    cutoff_hz: f32,
    coeff: f32,
    state: f32,
}

impl OnePole {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            cutoff_hz,
            coeff: 0.0,
            state: 0.0,
        };
        filter.set_sample_rate(sample_rate);
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        // Keep the pole inside the unit circle for rates below 2 * cutoff.
        let cutoff = self.cutoff_hz.min(sample_rate * 0.45);
        self.coeff = (-2.0 * PI * cutoff / sample_rate).exp();
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(self.coeff.mul_add(self.state - input, input));
        self.state
    }

    pub const fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// One-pole envelope follower with configurable attack and release coefficients.
#[derive(Clone, Debug)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Create from pre-computed coefficients.
    pub const fn new(attack_coeff: f32, release_coeff: f32) -> Self {
        Self {
            envelope: 0.0,
            attack_coeff,
            release_coeff,
        }
    }

    /// Create from attack/release times in milliseconds.
    pub fn from_ms(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self::new(
            calculate_coefficient(attack_ms, sample_rate),
            calculate_coefficient(release_ms, sample_rate),
        )
    }

    pub const fn value(&self) -> f32 {
        self.envelope
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = flush_denormal(coeff.mul_add(self.envelope, (1.0 - coeff) * abs_input));
        self.envelope
    }

    pub const fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
