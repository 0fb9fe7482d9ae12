use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Peripheral-specific reaction to a compare match
///
/// Runs on the thread driving the clock source, after every clock and timer
/// lock has been released, so it may freely read or write the timer's
/// registers.
pub trait CompareHook: Send + Sync + 'static {
    fn on_compare(&self);
}

/// Plain counter with no side effect on compare
impl CompareHook for () {
    fn on_compare(&self) {}
}

/// Interrupt request line raised on every compare match
///
/// The request stays pending until the interrupt controller acknowledges it.
#[derive(Debug, Default)]
pub struct InterruptLine {
    name: String,
    pending: AtomicBool,
    raised: AtomicU64,
}

impl InterruptLine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: AtomicBool::new(false),
            raised: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Clear the pending request, returning whether one was pending
    pub fn acknowledge(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// Total number of times the line was raised
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }
}

impl CompareHook for InterruptLine {
    fn on_compare(&self) {
        let count = self.raised.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.store(true, Ordering::SeqCst);
        debug!("IRQ {} raised ({} total)", self.name, count);
    }
}
