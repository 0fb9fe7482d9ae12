use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a clock handler, and therefore the registry key of its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Allocate a fresh, process-unique id
    pub fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Callback invoked when an entry crosses its period
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// A callback together with its identity
///
/// Closures have no usable identity in Rust, so every handler gets a
/// [`HandlerId`] at construction. Clones share the id; two handlers built
/// from separate calls to [`ClockHandler::new`] never compare equal, even if
/// they wrap the same function.
#[derive(Clone)]
pub struct ClockHandler {
    id: HandlerId,
    callback: Callback,
}

impl ClockHandler {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            id: HandlerId::next(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Run the callback on the current thread
    pub fn invoke(&self) {
        (self.callback)()
    }
}

impl PartialEq for ClockHandler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClockHandler {}

impl fmt::Debug for ClockHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClockHandler").field(&self.id).finish()
    }
}
