use vtime_core::Ticks;

use crate::error::TimerResult;

/// Lifecycle shared by every emulated device
pub trait Peripheral: Send + Sync {
    /// Return the device to its power-on state (invoked on machine reset)
    fn reset(&self);
}

/// Register-level view common to counter-style timers
pub trait Timer: Peripheral {
    fn enabled(&self) -> TimerResult<bool>;

    fn set_enabled(&self, enabled: bool) -> TimerResult<()>;

    /// Current counter value
    fn value(&self) -> TimerResult<Ticks>;

    /// Load the counter register
    fn set_value(&self, value: Ticks) -> TimerResult<()>;
}
