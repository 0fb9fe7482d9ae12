//! vtime Ports
//!
//! Port definitions (traits) for the virtual-time engine.
//! These define the boundaries between the scheduler and the peripheral
//! models that consume it.

mod clock;
mod error;
mod peripheral;

pub use clock::{ClockSource, ClockSourceExt, RegistryLock};
pub use error::{ClockError, ClockResult, TimerError, TimerResult};
pub use peripheral::{Peripheral, Timer};
