//! Tube saturation units.
//!
//! Three independent voicings, each a [`Stage`](crate::amp::stages::Stage):
//! a near-linear neutral tube, a biased warm tube and a sagging aggressive
//! tube. Every unit is continuous, keeps its output within ±1 and carries its
//! own smoothing state, so the kernel keeps one set per channel.

pub mod aggressive;
pub mod neutral;
pub mod warm;

pub use aggressive::AggressiveTube;
pub use neutral::NeutralTube;
pub use warm::WarmTube;

use crate::amp::stages::Stage;

/// Identity of a tube unit, in blend order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TubeModel {
    Neutral,
    Warm,
    Aggressive,
}

impl TubeModel {
    /// Blend order through the tube bank.
    pub const ALL: [Self; 3] = [Self::Neutral, Self::Warm, Self::Aggressive];
}

impl std::fmt::Display for TubeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "Neutral"),
            Self::Warm => write!(f, "Warm"),
            Self::Aggressive => write!(f, "Aggressive"),
        }
    }
}

/// Blend a stage's output into `input` by `mix`.
///
/// A mix of zero or less leaves the stage untouched, which makes the result
/// identical to an identity blend.
#[inline]
pub fn blend<S: Stage>(stage: &mut S, input: f32, mix: f32) -> f32 {
    if mix > 0.0 {
        let processed = stage.process(input);
        (processed - input).mul_add(mix, input)
    } else {
        input
    }
}

/// One instance of each tube unit, owned by a single channel.
#[derive(Debug, Clone)]
pub struct TubeBank {
    neutral: NeutralTube,
    warm: WarmTube,
    aggressive: AggressiveTube,
}

/// Mix amounts for the three units, in blend order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TubeMix {
    pub neutral: f32,
    pub warm: f32,
    pub aggressive: f32,
}

impl TubeBank {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            neutral: NeutralTube::new(sample_rate),
            warm: WarmTube::new(sample_rate),
            aggressive: AggressiveTube::new(sample_rate),
        }
    }

    /// Neutral, then warm, then aggressive. Each stage sees the previous blend.
    #[inline]
    pub fn process(&mut self, input: f32, mix: &TubeMix) -> f32 {
        let signal = blend(&mut self.neutral, input, mix.neutral);
        let signal = blend(&mut self.warm, signal, mix.warm);
        blend(&mut self.aggressive, signal, mix.aggressive)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.neutral.set_sample_rate(sample_rate);
        self.warm.set_sample_rate(sample_rate);
        self.aggressive.set_sample_rate(sample_rate);
    }

    pub fn reset(&mut self) {
        self.neutral.reset();
        self.warm.reset();
        self.aggressive.reset();
    }
}
