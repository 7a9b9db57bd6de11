/// Positive clip level with no extra drive.
const POSITIVE_BASE: f32 = 0.7;
/// Negative clip level with no extra drive.
const NEGATIVE_BASE: f32 = 0.8;
/// How far each threshold moves per unit of drive amount.
const THRESHOLD_SLOPE: f32 = 0.60;

/// Asymmetric hard clipper.
///
/// The positive side clips earlier than the negative side. Both thresholds
/// tighten as the tube gain rises above unity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clipper {
    positive: f32,
    negative: f32,
}

impl Clipper {
    /// Map tube gain (0.0..=2.0) to drive amount: unity and below give 0.0,
    /// 2.0 gives 0.5.
    #[inline]
    pub fn drive_amount(tube_gain: f32) -> f32 {
        ((tube_gain - 1.0) * 0.5).max(0.0)
    }

    #[inline]
    pub fn for_gain(tube_gain: f32) -> Self {
        let drive = Self::drive_amount(tube_gain);
        Self {
            positive: drive.mul_add(-THRESHOLD_SLOPE, POSITIVE_BASE),
            negative: drive.mul_add(-THRESHOLD_SLOPE, NEGATIVE_BASE),
        }
    }

    pub const fn positive_threshold(&self) -> f32 {
        self.positive
    }

    /// Magnitude of the negative clip level.
    pub const fn negative_threshold(&self) -> f32 {
        self.negative
    }

    #[inline]
    pub fn process(&self, sample: f32) -> f32 {
        if sample > self.positive {
            self.positive
        } else if sample < -self.negative {
            -self.negative
        } else {
            sample
        }
    }

    #[inline]
    pub fn process_oversampled<const N: usize>(&self, samples: [f32; N]) -> [f32; N] {
        samples.map(|s| self.process(s))
    }
}

/// Clip a single sample at the thresholds for `tube_gain`.
#[inline]
pub fn clip(sample: f32, tube_gain: f32) -> f32 {
    Clipper::for_gain(tube_gain).process(sample)
}
