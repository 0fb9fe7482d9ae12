mod clock_entry;
mod handler;
mod work_mode;

pub use clock_entry::{ClockEntry, EntrySnapshot};
pub use handler::{Callback, ClockHandler, HandlerId};
pub use work_mode::WorkMode;
