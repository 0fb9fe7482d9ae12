//! Configuration loading for the machine runner
//!
//! Supports JSON configuration files for:
//! - The machine-wide clock source (frequency)
//! - The timing loop (step size, step count, traffic seed)
//! - Comparing timers wired to interrupt lines

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use vtime_core::{Frequency, Ticks};

/// Root configuration for a machine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine name/identifier
    #[serde(default = "default_machine_name")]
    pub name: String,

    /// Frequency of the machine-wide clock source, in Hz
    #[serde(default = "default_clock_frequency")]
    pub clock_frequency_hz: Frequency,

    /// Source ticks per `advance` call
    #[serde(default = "default_step_ticks")]
    pub step_ticks: Ticks,

    /// Number of `advance` calls per run
    #[serde(default = "default_steps")]
    pub steps: u64,

    /// Seed for the emulated CPU's register traffic
    #[serde(default)]
    pub seed: u64,

    /// Chance that the CPU moves a timer's compare value after servicing its interrupt
    #[serde(default = "default_retarget_probability")]
    pub retarget_probability: f64,

    /// Timers to create
    #[serde(default)]
    pub timers: Vec<TimerConfig>,
}

fn default_machine_name() -> String {
    "vtime machine".to_string()
}

fn default_clock_frequency() -> Frequency {
    vtime_clock::DEFAULT_FREQUENCY_HZ
}

fn default_step_ticks() -> Ticks {
    1_000
}

fn default_steps() -> u64 {
    1_000
}

fn default_retarget_probability() -> f64 {
    0.25
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: default_machine_name(),
            clock_frequency_hz: default_clock_frequency(),
            step_ticks: default_step_ticks(),
            steps: default_steps(),
            seed: 0,
            retarget_probability: default_retarget_probability(),
            timers: Vec::new(),
        }
    }
}

impl MachineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create with a system tick timer and a slower watchdog-style timer
    pub fn with_default_timers() -> Self {
        let timers = vec![
            TimerConfig::new("systick", 1_000_000, 500, 1_000),
            TimerConfig::new("watchdog", 32_768, 30_000, 32_767),
        ];

        Self {
            timers,
            ..Default::default()
        }
    }

    /// Check the values serde cannot: frequencies, step size, timer bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_frequency_hz == 0 {
            return Err(ConfigError::Invalid(
                "clock_frequency_hz must be non-zero".to_string(),
            ));
        }
        if self.step_ticks == 0 {
            return Err(ConfigError::Invalid(
                "step_ticks must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retarget_probability) {
            return Err(ConfigError::Invalid(format!(
                "retarget_probability {} outside [0, 1]",
                self.retarget_probability
            )));
        }

        let mut names = HashSet::new();
        for timer in &self.timers {
            if !names.insert(timer.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate timer name '{}'",
                    timer.name
                )));
            }
            timer.validate()?;
        }
        Ok(())
    }
}

/// One comparing timer and its interrupt line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Timer (and interrupt line) name
    pub name: String,
    /// Counting frequency, in Hz
    pub frequency_hz: Frequency,
    #[serde(default)]
    pub compare: Ticks,
    pub limit: Ticks,
    /// Whether the timer starts counting at power-on
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TimerConfig {
    pub fn new(name: impl Into<String>, frequency_hz: Frequency, compare: Ticks, limit: Ticks) -> Self {
        Self {
            name: name.into(),
            frequency_hz,
            compare,
            limit,
            enabled: true,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::Invalid(format!(
                "timer '{}': frequency_hz must be non-zero",
                self.name
            )));
        }
        if self.compare > self.limit {
            return Err(ConfigError::Invalid(format!(
                "timer '{}': compare {} higher than limit {}",
                self.name, self.compare, self.limit
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid machine config: {0}")]
    Invalid(String),
}
