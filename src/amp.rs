//! Tube saturation DSP: stages, parameters, metering and the render kernel.

pub mod kernel;
pub mod meter;
pub mod params;
pub mod stages;

pub use kernel::{KernelState, TubeKernel};
pub use meter::{MeterHandle, MeterInfo};
pub use params::{ParameterAddress, ParameterEvent, ParameterHandle};
