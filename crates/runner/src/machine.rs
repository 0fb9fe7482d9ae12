//! Machine - owns the clock source and the peripherals hanging off it
//!
//! ```text
//!   ┌──────────────────────────────────────────────┐
//!   │                   Machine                    │
//!   │                                              │
//!   │   BaseClockSource ◄──── obtain_clock_source  │
//!   │        │                                     │
//!   │        ├── ComparingTimer "systick" ─► IRQ   │
//!   │        └── ComparingTimer "watchdog" ─► IRQ  │
//!   └──────────────────────────────────────────────┘
//! ```

use crate::config::{ConfigError, MachineConfig};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use vtime_clock::{BaseClockSource, ClockSource};
use vtime_core::{EntrySnapshot, Frequency, Ticks};
use vtime_ports::{Peripheral, TimerError};
use vtime_timers::{ComparingTimer, InterruptLine};

/// Timer model used by the machine: compare matches raise an interrupt line
pub type MachineTimer = ComparingTimer<InterruptLine>;

#[derive(Error, Debug)]
pub enum MachineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Timer '{name}' could not be created: {source}")]
    Timer {
        name: String,
        #[source]
        source: TimerError,
    },

    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Point-in-time view of the clock source, for dumps and debugging
#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    pub name: String,
    pub clock_frequency_hz: Frequency,
    pub elapsed_ticks: Ticks,
    pub entries: Vec<EntrySnapshot>,
}

pub struct Machine {
    name: String,
    clock: Arc<BaseClockSource>,
    timers: Vec<Arc<MachineTimer>>,
    peripherals: Vec<Arc<dyn Peripheral>>,
}

impl Machine {
    /// Build the clock source and every configured timer
    pub fn new(config: &MachineConfig) -> Result<Self, MachineError> {
        config.validate()?;

        let mut machine = Self {
            name: config.name.clone(),
            clock: Arc::new(BaseClockSource::with_frequency(config.clock_frequency_hz)),
            timers: Vec::with_capacity(config.timers.len()),
            peripherals: Vec::new(),
        };

        for timer_config in &config.timers {
            let timer = ComparingTimer::new(
                machine.obtain_clock_source(),
                timer_config.frequency_hz,
                timer_config.compare,
                timer_config.limit,
                InterruptLine::new(timer_config.name.clone()),
            )
            .and_then(|timer| {
                timer.set_enabled(timer_config.enabled)?;
                Ok(timer)
            })
            .map_err(|source| MachineError::Timer {
                name: timer_config.name.clone(),
                source,
            })?;

            debug!(
                "Machine {}: timer '{}' on {}",
                machine.name,
                timer_config.name,
                timer.handler_id()
            );
            machine.register_peripheral(timer.clone());
            machine.timers.push(timer);
        }

        info!(
            "Machine {} built: {} Hz clock, {} timer(s)",
            machine.name,
            config.clock_frequency_hz,
            machine.timers.len()
        );
        Ok(machine)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The machine-wide clock source every peripheral counts on
    pub fn obtain_clock_source(&self) -> Arc<dyn ClockSource> {
        self.clock.clone()
    }

    /// Concrete clock source, for the driving loop and diagnostics
    pub fn clock(&self) -> &Arc<BaseClockSource> {
        &self.clock
    }

    pub fn timers(&self) -> &[Arc<MachineTimer>] {
        &self.timers
    }

    /// Look up a timer by its interrupt line name
    pub fn timer(&self, name: &str) -> Option<&Arc<MachineTimer>> {
        self.timers.iter().find(|timer| timer.hook().name() == name)
    }

    /// Add a peripheral to the reset chain
    pub fn register_peripheral(&mut self, peripheral: Arc<dyn Peripheral>) {
        self.peripherals.push(peripheral);
    }

    /// Reset every registered peripheral, in registration order
    pub fn reset(&self) {
        info!(
            "Machine {}: resetting {} peripheral(s)",
            self.name,
            self.peripherals.len()
        );
        for peripheral in &self.peripherals {
            peripheral.reset();
        }
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            name: self.name.clone(),
            clock_frequency_hz: self.clock.frequency(),
            elapsed_ticks: self.clock.elapsed_ticks(),
            entries: self
                .clock
                .entries()
                .iter()
                .map(|entry| entry.snapshot())
                .collect(),
        }
    }

    pub fn snapshot_json(&self) -> Result<String, MachineError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}
