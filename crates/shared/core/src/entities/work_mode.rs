use serde::{Deserialize, Serialize};

/// What a clock entry does after it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkMode {
    /// Rearm automatically, carrying over any excess ticks
    #[default]
    Periodic,
    /// Disable and reset to zero; the handler must rearm explicitly
    OneShot,
}
