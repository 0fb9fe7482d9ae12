use vtime_core::{ClockEntry, Frequency, HandlerId, Ticks};

use crate::error::{ClockError, ClockResult};

/// Held registry lock; the lock is released when this is dropped
///
/// Wraps whatever guard the clock source uses so the port stays object safe.
pub struct RegistryLock<'a> {
    _guard: Box<dyn Held + 'a>,
}

trait Held {}

impl<T> Held for T {}

impl<'a> RegistryLock<'a> {
    pub fn new<G: 'a>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

/// Port for a virtual-time scheduler
///
/// A clock source owns a registry of [`ClockEntry`] values keyed by handler
/// identity and fires their handlers as ticks are advanced. Every operation
/// that reads or writes the registry is serialized by one lock owned by the
/// source.
///
/// The trait is object safe so that a machine can hand every peripheral an
/// `Arc<dyn ClockSource>`. Callers normally use the generic wrappers on
/// [`ClockSourceExt`] instead of the `&mut dyn FnMut` forms below.
pub trait ClockSource: Send + Sync {
    /// Tick frequency of the source itself, used to derive entry ratios
    fn frequency(&self) -> Frequency;

    /// Register a new entry under its handler
    fn add_clock_entry(&self, entry: ClockEntry) -> ClockResult<()>;

    /// Remove and return the entry registered for `handler`
    fn remove_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry>;

    /// Snapshot of the entry registered for `handler`
    fn get_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry>;

    /// Run `action` on the current entry while holding the registry lock
    fn inspect_clock_entry(
        &self,
        handler: HandlerId,
        action: &mut dyn FnMut(&ClockEntry),
    ) -> ClockResult<()>;

    /// Replace the entry with `transform(current)` while holding the registry lock
    ///
    /// This is the only way to mutate a registered entry. Returns the stored
    /// entry.
    fn exchange_clock_entry(
        &self,
        handler: HandlerId,
        transform: &mut dyn FnMut(&ClockEntry) -> ClockEntry,
    ) -> ClockResult<ClockEntry>;

    /// Take the registry lock until the returned guard is dropped
    ///
    /// No other registry operation may be called on the same source while
    /// the guard is alive.
    fn lock_registry(&self) -> RegistryLock<'_>;

    /// Advance virtual time by `ticks` source ticks, firing due handlers
    ///
    /// Handlers run on the calling thread with the registry lock released, so
    /// they may exchange their own entry. They must not call `advance` on the
    /// same source.
    fn advance(&self, ticks: Ticks);

    /// Total source ticks advanced since creation
    fn elapsed_ticks(&self) -> Ticks;
}

/// Closure-friendly wrappers over [`ClockSource`]
pub trait ClockSourceExt: ClockSource {
    /// Run `action` on the current entry under the registry lock and return its result
    fn get_clock_entry_in_lock_context<R>(
        &self,
        handler: HandlerId,
        action: impl FnOnce(&ClockEntry) -> R,
    ) -> ClockResult<R> {
        let mut action = Some(action);
        let mut result = None;
        self.inspect_clock_entry(handler, &mut |entry| {
            result = action.take().map(|action| action(entry));
        })?;
        result.ok_or(ClockError::NotFound(handler))
    }

    /// Atomically replace the entry with `transform(current)`
    fn exchange_clock_entry_with(
        &self,
        handler: HandlerId,
        transform: impl FnOnce(&ClockEntry) -> ClockEntry,
    ) -> ClockResult<ClockEntry> {
        let mut transform = Some(transform);
        self.exchange_clock_entry(handler, &mut |entry| match transform.take() {
            Some(transform) => transform(entry),
            None => entry.clone(),
        })
    }

    /// Run `action` under the registry lock and return its result
    fn execute_in_lock<R>(&self, action: impl FnOnce() -> R) -> R {
        let _registry = self.lock_registry();
        action()
    }
}

impl<T: ClockSource + ?Sized> ClockSourceExt for T {}
