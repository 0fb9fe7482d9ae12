use indexmap::IndexMap;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use vtime_core::{ClockEntry, ClockHandler, Frequency, HandlerId, Ticks, WorkMode};
use vtime_ports::{ClockError, ClockResult, ClockSource, RegistryLock};

/// Default source frequency when none is configured (1 MHz)
pub const DEFAULT_FREQUENCY_HZ: Frequency = 1_000_000;

/// Registry slot: the entry plus the fractional ticks its ratio left behind
#[derive(Debug)]
struct Slot {
    entry: ClockEntry,
    carry: u64,
}

/// Registry-backed clock source
///
/// ```text
///   driving thread                     register-access threads
///        │ advance(ticks)                   │ exchange / get / in-lock
///        ▼                                  ▼
/// ┌──────────────────────────────────────────────────────────┐
/// │ advance lock (one advance at a time)                      │
/// │  ┌────────────────────────────────────────────────────┐  │
/// │  │ registry lock: IndexMap<HandlerId, Slot>           │  │
/// │  │   visited in registration order                    │  │
/// │  └────────────────────────────────────────────────────┘  │
/// │        │ released while a handler runs                   │
/// │        ▼                                                 │
/// │   handler() ── may re-enter exchange_clock_entry ──┘     │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// Entries are visited in registration order on every `advance`, so two
/// entries crossing their period in the same call always fire in the same
/// order.
pub struct BaseClockSource {
    frequency: Frequency,
    registry: Mutex<IndexMap<HandlerId, Slot>>,
    /// Serializes `advance` calls; never held by register accessors
    advance_lock: Mutex<()>,
    elapsed: AtomicU64,
}

impl BaseClockSource {
    /// Create a clock source ticking at [`DEFAULT_FREQUENCY_HZ`]
    pub fn new() -> Self {
        Self::with_frequency(DEFAULT_FREQUENCY_HZ)
    }

    /// Create a clock source ticking at `frequency` Hz
    pub fn with_frequency(frequency: Frequency) -> Self {
        Self {
            frequency,
            registry: Mutex::new(IndexMap::new()),
            advance_lock: Mutex::new(()),
            elapsed: AtomicU64::new(0),
        }
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Snapshots of every entry, in registration order
    pub fn entries(&self) -> Vec<ClockEntry> {
        self.registry
            .lock()
            .values()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Accumulate `ticks` on one entry and fire it once per crossing
    fn advance_entry(&self, id: HandlerId, ticks: Ticks) {
        let mut handler = {
            let mut registry = self.registry.lock();
            let Some(slot) = registry.get_mut(&id) else {
                // removed by a handler earlier in this call
                return;
            };
            if !slot.entry.enabled {
                return;
            }

            let (delta, carry) = slot.entry.ratio.scale(ticks, slot.carry);
            slot.carry = carry;
            let new_value = slot.entry.value.saturating_add(delta);
            if delta == 0 || new_value < slot.entry.period {
                slot.entry.value = new_value;
                return;
            }
            Self::commit_crossing(slot, new_value)
        };

        loop {
            debug!("{} fired", handler.id());
            handler.invoke();

            let mut registry = self.registry.lock();
            let Some(slot) = registry.get_mut(&id) else {
                return;
            };
            let entry = &slot.entry;
            let again = entry.enabled
                && entry.work_mode == WorkMode::Periodic
                && entry.period > 0
                && entry.value >= entry.period;
            if !again {
                return;
            }
            let pending = entry.value;
            handler = Self::commit_crossing(slot, pending);
        }
    }

    /// Store the post-crossing state of an entry and hand back its handler
    ///
    /// Runs before the handler is called so that a one-shot handler which
    /// rearms itself is not overridden afterwards.
    fn commit_crossing(slot: &mut Slot, new_value: Ticks) -> ClockHandler {
        let entry = &mut slot.entry;
        match entry.work_mode {
            WorkMode::OneShot => {
                entry.enabled = false;
                entry.value = 0;
            }
            WorkMode::Periodic if entry.period == 0 => {
                entry.value = 0;
            }
            WorkMode::Periodic => {
                entry.value = new_value - entry.period;
            }
        }
        entry.handler.clone()
    }
}

impl Default for BaseClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for BaseClockSource {
    fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn add_clock_entry(&self, entry: ClockEntry) -> ClockResult<()> {
        let id = entry.id();
        let mut registry = self.registry.lock();
        if registry.contains_key(&id) {
            return Err(ClockError::AlreadyRegistered(id));
        }
        debug!(
            "Registering {} (period {}, ratio {}, {:?}, enabled: {})",
            id, entry.period, entry.ratio, entry.work_mode, entry.enabled
        );
        registry.insert(id, Slot { entry, carry: 0 });
        Ok(())
    }

    fn remove_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry> {
        let slot = self
            .registry
            .lock()
            .shift_remove(&handler)
            .ok_or(ClockError::NotFound(handler))?;
        debug!("Removed {}", handler);
        Ok(slot.entry)
    }

    fn get_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry> {
        self.registry
            .lock()
            .get(&handler)
            .map(|slot| slot.entry.clone())
            .ok_or(ClockError::NotFound(handler))
    }

    fn inspect_clock_entry(
        &self,
        handler: HandlerId,
        action: &mut dyn FnMut(&ClockEntry),
    ) -> ClockResult<()> {
        let registry = self.registry.lock();
        let slot = registry
            .get(&handler)
            .ok_or(ClockError::NotFound(handler))?;
        action(&slot.entry);
        Ok(())
    }

    fn exchange_clock_entry(
        &self,
        handler: HandlerId,
        transform: &mut dyn FnMut(&ClockEntry) -> ClockEntry,
    ) -> ClockResult<ClockEntry> {
        let mut registry = self.registry.lock();
        let slot = registry
            .get_mut(&handler)
            .ok_or(ClockError::NotFound(handler))?;

        let mut next = transform(&slot.entry);
        // the registry key is fixed; a transform cannot move the entry
        next.handler = slot.entry.handler.clone();
        if next.ratio != slot.entry.ratio {
            slot.carry = 0;
        }
        slot.entry = next;
        Ok(slot.entry.clone())
    }

    fn lock_registry(&self) -> RegistryLock<'_> {
        RegistryLock::new(self.registry.lock())
    }

    fn advance(&self, ticks: Ticks) {
        if ticks == 0 {
            return;
        }
        let _advancing = self.advance_lock.lock();
        let total = self.elapsed.fetch_add(ticks, Ordering::SeqCst) + ticks;

        let order: Vec<HandlerId> = self.registry.lock().keys().copied().collect();
        for id in order {
            self.advance_entry(id, ticks);
        }

        trace!(
            "Advanced {} ticks over {} entries (elapsed {})",
            ticks,
            self.len(),
            total
        );
    }

    fn elapsed_ticks(&self) -> Ticks {
        self.elapsed.load(Ordering::SeqCst)
    }
}
