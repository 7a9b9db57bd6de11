use atomic_float::AtomicF32;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::amp::stages::tube::TubeMix;

/// Closed set of parameter addresses understood by the kernel.
///
/// The discriminants are the raw addresses a host uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ParameterAddress {
    TubeGain = 0,
    Bypass = 1,
    NeutralTube = 2,
    WarmTube = 3,
    AggressiveTube = 4,
    OutputVolume = 5,
    SignalLevel = 6,
}

impl ParameterAddress {
    pub const ALL: [Self; 7] = [
        Self::TubeGain,
        Self::Bypass,
        Self::NeutralTube,
        Self::WarmTube,
        Self::AggressiveTube,
        Self::OutputVolume,
        Self::SignalLevel,
    ];

    pub const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::TubeGain),
            1 => Some(Self::Bypass),
            2 => Some(Self::NeutralTube),
            3 => Some(Self::WarmTube),
            4 => Some(Self::AggressiveTube),
            5 => Some(Self::OutputVolume),
            6 => Some(Self::SignalLevel),
            _ => None,
        }
    }

    pub const fn raw(self) -> u64 {
        self as u64
    }

    /// Stable identifier used in settings files and on the command line.
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::TubeGain => "tubegain",
            Self::Bypass => "bypass",
            Self::NeutralTube => "neutraltube",
            Self::WarmTube => "warmtube",
            Self::AggressiveTube => "aggressivetube",
            Self::OutputVolume => "outputvolume",
            Self::SignalLevel => "signallevel",
        }
    }

    /// Valid range as `(min, max)`.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::TubeGain | Self::OutputVolume => (0.0, 2.0),
            Self::Bypass | Self::NeutralTube | Self::WarmTube | Self::AggressiveTube => {
                (0.0, 1.0)
            }
            Self::SignalLevel => (0.0, f32::MAX),
        }
    }

    pub const fn default_value(self) -> f32 {
        match self {
            Self::TubeGain | Self::OutputVolume => 1.0,
            _ => 0.0,
        }
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::SignalLevel)
    }

    pub fn contains(self, value: f32) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }
}

impl std::fmt::Display for ParameterAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl FromStr for ParameterAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.identifier() == wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown parameter '{s}'"))
    }
}

/// A parameter change scheduled at a frame offset inside a render block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterEvent {
    /// Frames from the start of the block.
    pub sample_offset: usize,
    /// Raw address. Unknown addresses are ignored when the event is applied.
    pub address: u64,
    pub value: f32,
}

impl ParameterEvent {
    pub const fn new(sample_offset: usize, address: ParameterAddress, value: f32) -> Self {
        Self {
            sample_offset,
            address: address.raw(),
            value,
        }
    }
}

/// Bypass is stored as a flag; any value at or above this turns it on.
const BYPASS_ON_THRESHOLD: f32 = 0.5;

/// Values of every writable parameter, plus the published meter level.
///
/// Each value is an independent relaxed atomic: a reader can see a value that
/// is one block stale but never a torn one.
#[derive(Debug)]
pub struct SharedParameters {
    tube_gain: AtomicF32,
    output_volume: AtomicF32,
    neutral_tube: AtomicF32,
    warm_tube: AtomicF32,
    aggressive_tube: AtomicF32,
    bypass: AtomicBool,
    signal_level: AtomicF32,
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self {
            tube_gain: AtomicF32::new(ParameterAddress::TubeGain.default_value()),
            output_volume: AtomicF32::new(ParameterAddress::OutputVolume.default_value()),
            neutral_tube: AtomicF32::new(ParameterAddress::NeutralTube.default_value()),
            warm_tube: AtomicF32::new(ParameterAddress::WarmTube.default_value()),
            aggressive_tube: AtomicF32::new(ParameterAddress::AggressiveTube.default_value()),
            bypass: AtomicBool::new(false),
            signal_level: AtomicF32::new(0.0),
        }
    }
}

impl SharedParameters {
    /// Write a parameter. Read-only addresses are ignored.
    pub fn set(&self, address: ParameterAddress, value: f32) {
        match address {
            ParameterAddress::TubeGain => self.tube_gain.store(value, Ordering::Relaxed),
            ParameterAddress::OutputVolume => self.output_volume.store(value, Ordering::Relaxed),
            ParameterAddress::NeutralTube => self.neutral_tube.store(value, Ordering::Relaxed),
            ParameterAddress::WarmTube => self.warm_tube.store(value, Ordering::Relaxed),
            ParameterAddress::AggressiveTube => {
                self.aggressive_tube.store(value, Ordering::Relaxed);
            }
            ParameterAddress::Bypass => self.set_bypass(value >= BYPASS_ON_THRESHOLD),
            ParameterAddress::SignalLevel => {}
        }
    }

    pub fn get(&self, address: ParameterAddress) -> f32 {
        match address {
            ParameterAddress::TubeGain => self.tube_gain.load(Ordering::Relaxed),
            ParameterAddress::OutputVolume => self.output_volume.load(Ordering::Relaxed),
            ParameterAddress::NeutralTube => self.neutral_tube.load(Ordering::Relaxed),
            ParameterAddress::WarmTube => self.warm_tube.load(Ordering::Relaxed),
            ParameterAddress::AggressiveTube => self.aggressive_tube.load(Ordering::Relaxed),
            ParameterAddress::Bypass => {
                if self.is_bypassed() {
                    1.0
                } else {
                    0.0
                }
            }
            ParameterAddress::SignalLevel => self.signal_level(),
        }
    }

    pub fn set_raw(&self, address: u64, value: f32) {
        if let Some(address) = ParameterAddress::from_raw(address) {
            self.set(address, value);
        }
    }

    /// Unknown addresses read as 0.0.
    pub fn get_raw(&self, address: u64) -> f32 {
        ParameterAddress::from_raw(address).map_or(0.0, |a| self.get(a))
    }

    pub fn set_bypass(&self, bypassed: bool) {
        self.bypass.store(bypassed, Ordering::Relaxed);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_signal_level(&self, level: f32) {
        self.signal_level.store(level, Ordering::Relaxed);
    }

    /// Last published meter level; always 0.0 while bypassed.
    pub fn signal_level(&self) -> f32 {
        if self.is_bypassed() {
            0.0
        } else {
            self.signal_level.load(Ordering::Relaxed)
        }
    }

    /// Plain copy of the values the render loop needs.
    #[inline]
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            tube_gain: self.tube_gain.load(Ordering::Relaxed),
            output_volume: self.output_volume.load(Ordering::Relaxed),
            mix: TubeMix {
                neutral: self.neutral_tube.load(Ordering::Relaxed),
                warm: self.warm_tube.load(Ordering::Relaxed),
                aggressive: self.aggressive_tube.load(Ordering::Relaxed),
            },
            bypassed: self.is_bypassed(),
        }
    }
}

/// Parameter values as seen by one render segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub tube_gain: f32,
    pub output_volume: f32,
    pub mix: TubeMix,
    pub bypassed: bool,
}

/// Control-thread view of the kernel parameters.
#[derive(Debug, Clone)]
pub struct ParameterHandle {
    params: Arc<SharedParameters>,
}

impl ParameterHandle {
    pub(crate) const fn new(params: Arc<SharedParameters>) -> Self {
        Self { params }
    }

    pub fn set(&self, address: ParameterAddress, value: f32) {
        self.params.set(address, value);
    }

    pub fn get(&self, address: ParameterAddress) -> f32 {
        self.params.get(address)
    }

    pub fn set_raw(&self, address: u64, value: f32) {
        self.params.set_raw(address, value);
    }

    pub fn get_raw(&self, address: u64) -> f32 {
        self.params.get_raw(address)
    }

    pub fn set_bypass(&self, bypassed: bool) {
        self.params.set_bypass(bypassed);
    }

    pub fn is_bypassed(&self) -> bool {
        self.params.is_bypassed()
    }
}
