//! vtime Core Domain
//!
//! Value types shared by every part of the virtual-time engine.
//! This crate contains no locking, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{Callback, ClockEntry, ClockHandler, EntrySnapshot, HandlerId, WorkMode};
pub use values::{Frequency, Ratio, Ticks};
