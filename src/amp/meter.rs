use std::sync::Arc;

use crate::amp::params::SharedParameters;
use crate::amp::stages::common::lin_to_db;

/// Per-sample decay applied while the signal stays below the held peak.
pub const METER_DECAY: f32 = 0.9995;

const CLIP_THRESHOLD: f32 = 0.95;
const FLOOR_DB: f32 = -100.0;
/// Minimum glow of a lit meter, so quiet signals still register.
const GLOW_FLOOR: f32 = 0.15;

/// Peak-hold meter with exponential decay.
///
/// New peaks are taken immediately; otherwise the level decays by
/// [`METER_DECAY`] per sample.
#[derive(Debug, Clone, Default)]
pub struct SignalMeter {
    level: f32,
}

impl SignalMeter {
    pub const fn new() -> Self {
        Self { level: 0.0 }
    }

    #[inline]
    pub fn update(&mut self, output: f32) {
        let abs_output = output.abs();
        if abs_output > self.level {
            self.level = abs_output;
        } else {
            self.level *= METER_DECAY;
        }
    }

    pub fn process(&mut self, samples: &[f32]) {
        for &s in samples {
            self.update(s);
        }
    }

    pub const fn read(&self) -> f32 {
        self.level
    }

    pub const fn reset(&mut self) {
        self.level = 0.0;
    }
}

/// Meter snapshot for display.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterInfo {
    pub level: f32,
    pub level_db: f32,
    pub is_clipping: bool,
    /// Display brightness in `0.0..=1.0`; the square root lifts quiet signals.
    pub glow: f32,
}

impl MeterInfo {
    pub fn from_level(level: f32) -> Self {
        let glow = if level > 0.0 {
            level.sqrt().mul_add(1.0 - GLOW_FLOOR, GLOW_FLOOR).min(1.0)
        } else {
            0.0
        };

        Self {
            level,
            level_db: lin_to_db(level, FLOOR_DB),
            is_clipping: level >= CLIP_THRESHOLD,
            glow,
        }
    }
}

/// Control-thread view of the meter. Reads may trail the audio thread by one
/// render block.
#[derive(Debug, Clone)]
pub struct MeterHandle {
    params: Arc<SharedParameters>,
}

impl MeterHandle {
    pub(crate) const fn new(params: Arc<SharedParameters>) -> Self {
        Self { params }
    }

    pub fn level(&self) -> f32 {
        self.params.signal_level()
    }

    pub fn info(&self) -> MeterInfo {
        MeterInfo::from_level(self.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_is_instant() {
        let mut meter = SignalMeter::new();
        meter.update(-0.6);
        assert_eq!(meter.read(), 0.6);
        meter.update(0.9);
        assert_eq!(meter.read(), 0.9);
    }

    #[test]
    fn decay_follows_power_law() {
        let mut meter = SignalMeter::new();
        meter.update(1.0);
        let start = meter.read();

        let mut prev = start;
        for n in 1..=2000 {
            meter.update(0.0);
            let level = meter.read();
            assert!(level <= prev, "meter rose at sample {n}");
            assert!(level > 0.0);

            let expected = start * METER_DECAY.powi(n);
            assert!(
                (level - expected).abs() <= expected * 1e-3,
                "sample {n}: {level} vs {expected}"
            );
            prev = level;
        }
    }

    #[test]
    fn quieter_samples_do_not_hold() {
        let mut meter = SignalMeter::new();
        meter.update(0.8);
        meter.update(0.5);
        assert!((meter.read() - 0.8 * METER_DECAY).abs() < 1e-7);
    }

    #[test]
    fn block_process_and_reset() {
        let mut meter = SignalMeter::new();
        meter.process(&[0.1, -0.7, 0.2]);
        assert!((meter.read() - 0.7 * METER_DECAY).abs() < 1e-7);
        meter.reset();
        assert_eq!(meter.read(), 0.0);
    }

    #[test]
    fn info_derives_display_values() {
        let silent = MeterInfo::from_level(0.0);
        assert_eq!(silent.level_db, -100.0);
        assert_eq!(silent.glow, 0.0);
        assert!(!silent.is_clipping);

        let full = MeterInfo::from_level(1.0);
        assert!(full.level_db.abs() < 1e-6);
        assert!(full.is_clipping);
        assert!((full.glow - 1.0).abs() < 1e-6);

        let quiet = MeterInfo::from_level(0.01);
        assert!((quiet.glow - (0.15 + 0.085)).abs() < 1e-5);
        assert!((quiet.level_db + 40.0).abs() < 1e-3);
    }

    #[test]
    fn handle_reads_published_level() {
        let params = Arc::new(SharedParameters::default());
        let handle = MeterHandle::new(Arc::clone(&params));
        assert_eq!(handle.level(), 0.0);

        params.publish_signal_level(0.5);
        assert_eq!(handle.info().level, 0.5);
    }
}
