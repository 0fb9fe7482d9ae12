//! vtime Clock Infrastructure
//!
//! The scheduler at the heart of the emulator's virtual time:
//!
//! ## Flow
//!
//! ```text
//! driving loop ── advance(ticks) ──► BaseClockSource
//!                                       │ per entry, registration order:
//!                                       │   delta = ticks * ratio (truncated)
//!                                       │   value + delta >= period ?
//!                                       ▼
//!                                    handler()  (lock released)
//!                                       │
//!                                       └─► exchange_clock_entry_with(own id, ..)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use vtime_clock::{BaseClockSource, ClockSource};
//! use vtime_core::{ClockEntry, ClockHandler};
//!
//! let source = BaseClockSource::new();
//! let handler = ClockHandler::new(|| println!("tick"));
//! source.add_clock_entry(ClockEntry::periodic(2, handler))?;
//! source.advance(4); // prints twice
//! ```

mod base;

pub use base::{BaseClockSource, DEFAULT_FREQUENCY_HZ};

// Re-export the port traits for convenience
pub use vtime_ports::{ClockSource, ClockSourceExt};
