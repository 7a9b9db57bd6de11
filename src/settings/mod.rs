use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::amp::TubeKernel;
use crate::amp::kernel::DEFAULT_MAX_FRAMES;
use crate::amp::params::ParameterAddress;

impl std::fmt::Display for RenderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Block Size: {}", self.block_size)?;
        writeln!(f, "Maximum Frames: {}", self.max_frames)?;
        writeln!(f, "Render Directory: {}", self.render_dir)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderSettings {
    /// Frames handed to the kernel per call.
    pub block_size: usize,
    /// Upper bound the kernel enforces on a single call.
    pub max_frames: usize,
    /// Where renders go when no output path is given.
    pub render_dir: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            block_size: 512,
            max_frames: DEFAULT_MAX_FRAMES,
            render_dir: "./renders".to_string(),
        }
    }
}

impl std::fmt::Display for ParameterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tube Gain: {}", self.tube_gain)?;
        writeln!(f, "Neutral Tube: {}", self.neutral_tube)?;
        writeln!(f, "Warm Tube: {}", self.warm_tube)?;
        writeln!(f, "Aggressive Tube: {}", self.aggressive_tube)?;
        writeln!(f, "Output Volume: {}", self.output_volume)?;
        writeln!(f, "Bypass: {}", self.bypass)?;
        Ok(())
    }
}

/// Starting values for the kernel parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParameterSettings {
    pub tube_gain: f32,
    pub neutral_tube: f32,
    pub warm_tube: f32,
    pub aggressive_tube: f32,
    pub output_volume: f32,
    pub bypass: bool,
}

impl Default for ParameterSettings {
    fn default() -> Self {
        Self {
            tube_gain: ParameterAddress::TubeGain.default_value(),
            neutral_tube: ParameterAddress::NeutralTube.default_value(),
            warm_tube: ParameterAddress::WarmTube.default_value(),
            aggressive_tube: ParameterAddress::AggressiveTube.default_value(),
            output_volume: ParameterAddress::OutputVolume.default_value(),
            bypass: false,
        }
    }
}

impl ParameterSettings {
    fn values(&self) -> [(ParameterAddress, f32); 5] {
        [
            (ParameterAddress::TubeGain, self.tube_gain),
            (ParameterAddress::NeutralTube, self.neutral_tube),
            (ParameterAddress::WarmTube, self.warm_tube),
            (ParameterAddress::AggressiveTube, self.aggressive_tube),
            (ParameterAddress::OutputVolume, self.output_volume),
        ]
    }

    /// Check every value against its parameter range.
    pub fn validate(&self) -> Result<()> {
        for (address, value) in self.values() {
            let (min, max) = address.range();
            anyhow::ensure!(
                address.contains(value),
                "{address} = {value} is outside {min}..={max}"
            );
        }
        Ok(())
    }

    /// Push these values into a kernel.
    pub fn apply(&self, kernel: &mut TubeKernel) {
        for (address, value) in self.values() {
            kernel.set(address, value);
        }
        kernel.set_bypass(self.bypass);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub render: RenderSettings,
    pub parameters: ParameterSettings,
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "------------------------------")?;

        writeln!(f, "Render Settings:")?;
        writeln!(f, "{}", self.render)?;

        writeln!(f, "Parameters:")?;
        writeln!(f, "{}", self.parameters)?;
        Ok(())
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path();

        if settings_path.exists() {
            Self::load_from(&settings_path)
        } else {
            info!("No settings file found, using defaults");
            let settings = Self::default();
            // Try to save defaults, but don't fail if we can't
            let _ = settings.save();
            Ok(settings)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read settings file")?;
        let settings: Self = serde_json::from_str(&contents).context("Failed to parse settings")?;
        settings.validate()?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure the config directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, json).context("Failed to write settings file")?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.render.block_size > 0, "block size must be positive");
        anyhow::ensure!(
            self.render.block_size <= self.render.max_frames,
            "block size {} exceeds maximum frames {}",
            self.render.block_size,
            self.render.max_frames
        );
        self.parameters.validate()
    }

    fn get_settings_path() -> PathBuf {
        const SETTINGS_FILENAME: &str = "settings.json";

        // Try to use XDG config directory on Linux
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir)
                .join("tubecity")
                .join(SETTINGS_FILENAME)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("tubecity")
                .join(SETTINGS_FILENAME)
        } else {
            // Fallback to current directory
            PathBuf::from(".").join(SETTINGS_FILENAME)
        }
    }
}
