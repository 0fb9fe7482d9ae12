use thiserror::Error;
use vtime_core::{HandlerId, Ticks};

/// Registry misuse on a clock source
///
/// Both variants are programmer errors: steady-state emulation never expects
/// them, and they are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("No clock entry registered for {0}")]
    NotFound(HandlerId),

    #[error("A clock entry is already registered for {0}")]
    AlreadyRegistered(HandlerId),
}

pub type ClockResult<T> = std::result::Result<T, ClockError>;

/// Failures of timer peripherals built on a clock source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Compare value ({compare}) cannot be higher than limit ({limit})")]
    Construction { compare: Ticks, limit: Ticks },

    #[error("Value ({value}) cannot be higher than limit ({limit})")]
    InvalidOperation { value: Ticks, limit: Ticks },

    #[error("Timer frequency must be non-zero")]
    ZeroFrequency,

    #[error(transparent)]
    Clock(#[from] ClockError),
}

pub type TimerResult<T> = std::result::Result<T, TimerError>;
