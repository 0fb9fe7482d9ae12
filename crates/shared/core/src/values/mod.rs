mod ratio;

pub use ratio::Ratio;

/// Count of ticks, either in the clock source's domain or in an entry's own domain
pub type Ticks = u64;

/// Frequency in Hz
pub type Frequency = u64;
