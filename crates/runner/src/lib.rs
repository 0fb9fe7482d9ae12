//! vtime Runner - Machine Orchestration
//!
//! Builds a machine from configuration and drives its virtual time:
//!
//! - **Config**: JSON machine description (clock, timing loop, timers)
//! - **Machine**: the shared clock source, its timers, and the reset chain
//! - **Simulation**: the timing loop plus an emulated CPU touching registers
//!
//! ## Architecture
//!
//! ```text
//!   MachineConfig (JSON)
//!          │
//!          ▼
//!   ┌─────────────┐   advance(step)   ┌──────────────────┐
//!   │ Clock task  │ ────────────────► │ BaseClockSource  │
//!   └──────┬──────┘                   └────────┬─────────┘
//!          │ step / ack                        │ crossings
//!          ▼                                   ▼
//!   ┌─────────────┐   registers      ┌──────────────────┐
//!   │  CPU task   │ ◄──────────────► │ ComparingTimer(s)│
//!   └─────────────┘   IRQ ack        └──────────────────┘
//! ```

pub mod config;
pub mod machine;
pub mod simulation;

pub use config::{ConfigError, MachineConfig, TimerConfig};
pub use machine::{Machine, MachineError, MachineSnapshot, MachineTimer};
pub use simulation::{Simulation, SimulationResults};
