//! vtime Timers
//!
//! Hardware timer models that sit on top of a shared clock source:
//!
//! - **ComparingTimer**: a counter with `Value`/`Compare`/`Limit` registers,
//!   backed by a single one-shot clock entry that is continually re-armed
//! - **CompareHook**: what a concrete peripheral does on a compare match
//! - **InterruptLine**: a hook that latches an interrupt request
//!
//! ## Counter timeline
//!
//! ```text
//!  0            compare                 limit
//!  ├──────────────►●──────────────────────►┤ wrap (silent)
//!                  │ on_compare()          │ value := 0
//! ```

mod comparing;
mod hook;

pub use comparing::{ComparingTimer, TimerState};
pub use hook::{CompareHook, InterruptLine};
