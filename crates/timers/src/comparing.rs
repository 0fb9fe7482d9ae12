use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use vtime_core::{ClockEntry, ClockHandler, Frequency, HandlerId, Ratio, Ticks, WorkMode};
use vtime_ports::{ClockSource, ClockSourceExt, Peripheral, Timer, TimerError, TimerResult};

use crate::hook::CompareHook;

/// Where the backing entry is heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Disabled,
    ArmedTowardCompare,
    ArmedTowardLimit,
}

/// Counter progress not yet reflected in the entry
///
/// Only locked while the clock source's registry lock is held, so every
/// update here is atomic with the matching entry exchange.
#[derive(Debug, Clone, Copy)]
struct Counter {
    /// Counter value at the point the entry was last armed
    accumulated: Ticks,
    compare: Ticks,
    /// Whether software has the timer enabled
    running: bool,
    /// A compare match was accounted for but `on_compare` has not run yet
    matched: bool,
}

impl Counter {
    fn new(compare: Ticks) -> Self {
        Self {
            accumulated: 0,
            compare,
            running: false,
            matched: false,
        }
    }

    /// Ticks from `accumulated` to the next compare match or limit wrap,
    /// whichever comes first
    ///
    /// Unsigned wrapping subtraction: a compare value already behind the
    /// counter is only reached after the wrap, so it must lose to the limit.
    fn next_event_in(&self, limit: Ticks) -> Ticks {
        let to_compare = self.compare.wrapping_sub(self.accumulated);
        let to_limit = limit.wrapping_sub(self.accumulated);
        to_compare.min(to_limit)
    }
}

/// Counter timer with compare-match and limit-wrap semantics
///
/// The counter runs from 0 to `limit`. Reaching the compare value calls
/// [`CompareHook::on_compare`]; reaching the limit wraps the counter to 0
/// without surfacing an event (unless compare equals limit). Both events
/// are driven by a single one-shot [`ClockEntry`] that is re-armed after
/// every crossing.
///
/// Register accessors may be called from any thread; they serialize on the
/// shared clock source's lock and touch only this timer's entry.
pub struct ComparingTimer<H: CompareHook = ()> {
    source: Arc<dyn ClockSource>,
    handler: HandlerId,
    limit: Ticks,
    initial_compare: Ticks,
    counter: Mutex<Counter>,
    hook: H,
}

impl<H: CompareHook> ComparingTimer<H> {
    /// Create a disabled timer counting at `frequency` Hz on `source`
    ///
    /// Fails if `compare > limit` or `frequency` is zero.
    pub fn new(
        source: Arc<dyn ClockSource>,
        frequency: Frequency,
        compare: Ticks,
        limit: Ticks,
        hook: H,
    ) -> TimerResult<Arc<Self>> {
        if compare > limit {
            warn!(
                "Rejected timer: compare ({}) higher than limit ({})",
                compare, limit
            );
            return Err(TimerError::Construction { compare, limit });
        }
        let ratio = Ratio::from_frequencies(frequency, source.frequency())
            .ok_or(TimerError::ZeroFrequency)?;

        let mut registration = Ok(());
        let timer = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let handler = ClockHandler::new(move || {
                if let Some(timer) = weak.upgrade() {
                    timer.compare_reached();
                }
            });
            let id = handler.id();
            registration = source.add_clock_entry(ClockEntry::new(
                compare,
                ratio,
                handler,
                false,
                WorkMode::OneShot,
            ));

            Self {
                source,
                handler: id,
                limit,
                initial_compare: compare,
                counter: Mutex::new(Counter::new(compare)),
                hook,
            }
        });
        registration?;

        debug!(
            "Timer {} created: {} Hz, compare {}, limit {}",
            timer.handler, frequency, compare, limit
        );
        Ok(timer)
    }

    /// Registry key of the backing clock entry
    pub fn handler_id(&self) -> HandlerId {
        self.handler
    }

    pub fn limit(&self) -> Ticks {
        self.limit
    }

    pub fn initial_compare(&self) -> Ticks {
        self.initial_compare
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn enabled(&self) -> TimerResult<bool> {
        let running = self
            .source
            .get_clock_entry_in_lock_context(self.handler, |_| self.counter.lock().running)?;
        Ok(running)
    }

    /// Start or stop counting; progress is kept across a stop
    pub fn set_enabled(&self, enabled: bool) -> TimerResult<()> {
        self.source
            .exchange_clock_entry_with(self.handler, |entry| {
                let mut counter = self.counter.lock();
                let entry = self.settle(&mut counter, entry);
                counter.running = enabled;
                entry.with_enabled(enabled)
            })?;
        Ok(())
    }

    pub fn value(&self) -> TimerResult<Ticks> {
        let value = self
            .source
            .get_clock_entry_in_lock_context(self.handler, |entry| {
                let mut view = *self.counter.lock();
                let entry = self.settle(&mut view, entry);
                view.accumulated + entry.value
            })?;
        Ok(value)
    }

    /// Load the counter register; the next deadline is derived from the new value
    pub fn set_value(&self, value: Ticks) -> TimerResult<()> {
        if value > self.limit {
            warn!(
                "Rejected value write on {}: {} above limit {}",
                self.handler, value, self.limit
            );
            return Err(TimerError::InvalidOperation {
                value,
                limit: self.limit,
            });
        }
        self.source
            .exchange_clock_entry_with(self.handler, |entry| {
                let mut counter = self.counter.lock();
                let entry = self.settle(&mut counter, entry);
                counter.accumulated = value;
                entry
                    .with_period(counter.next_event_in(self.limit))
                    .with_value(0)
            })?;
        Ok(())
    }

    pub fn compare(&self) -> Ticks {
        self.source.execute_in_lock(|| self.counter.lock().compare)
    }

    /// Move the compare threshold, keeping the progress made so far
    pub fn set_compare(&self, compare: Ticks) -> TimerResult<()> {
        if compare > self.limit {
            warn!(
                "Rejected compare write on {}: {} above limit {}",
                self.handler, compare, self.limit
            );
            return Err(TimerError::InvalidOperation {
                value: compare,
                limit: self.limit,
            });
        }
        self.source
            .exchange_clock_entry_with(self.handler, |entry| {
                let mut counter = self.counter.lock();
                let entry = self.settle(&mut counter, entry);
                counter.compare = compare;
                counter.accumulated += entry.value;
                entry
                    .with_period(counter.next_event_in(self.limit))
                    .with_value(0)
            })?;
        Ok(())
    }

    /// Which event the backing entry is armed for
    pub fn state(&self) -> TimerResult<TimerState> {
        let state = self
            .source
            .get_clock_entry_in_lock_context(self.handler, |entry| {
                let mut view = *self.counter.lock();
                let entry = self.settle(&mut view, entry);
                if !view.running {
                    TimerState::Disabled
                } else if view.accumulated.saturating_add(entry.period) == view.compare {
                    TimerState::ArmedTowardCompare
                } else {
                    TimerState::ArmedTowardLimit
                }
            })?;
        Ok(state)
    }

    /// Return to the power-on state: zero count, initial compare, stopped
    ///
    /// A compare match still waiting for its hook is dropped.
    pub fn reset(&self) -> TimerResult<()> {
        self.source
            .exchange_clock_entry_with(self.handler, |entry| {
                *self.counter.lock() = Counter::new(self.initial_compare);
                entry
                    .with_value(0)
                    .with_enabled(false)
                    .with_period(self.initial_compare)
            })?;
        Ok(())
    }

    /// Fold a crossing the clock source committed but this timer has not
    /// accounted for yet, returning the re-armed entry
    ///
    /// The source disables a one-shot entry and zeroes its value when it
    /// crosses, then calls [`Self::compare_reached`] with its lock released.
    /// A running timer whose entry is disabled is in that window, and the
    /// crossed distance is still the entry's period. Any accessor landing
    /// there settles the crossing first, so the handler finds nothing left
    /// to fold.
    fn settle(&self, counter: &mut Counter, entry: &ClockEntry) -> ClockEntry {
        if !counter.running || entry.enabled {
            return entry.clone();
        }
        counter.accumulated = counter.accumulated.saturating_add(entry.period);

        if counter.accumulated >= self.limit && counter.compare != self.limit {
            // limit wrap, not a compare match
            counter.accumulated = 0;
            return entry
                .with_period(counter.compare)
                .with_value(0)
                .with_enabled(true);
        }

        counter.matched = true;
        if counter.accumulated >= self.limit {
            counter.accumulated = 0;
        }
        entry
            .with_period(self.limit - counter.accumulated)
            .with_value(0)
            .with_enabled(true)
    }

    /// One-shot handler: the entry has just crossed its period
    fn compare_reached(&self) {
        let mut matched = false;
        let rearmed = self
            .source
            .exchange_clock_entry_with(self.handler, |entry| {
                let mut counter = self.counter.lock();
                let entry = self.settle(&mut counter, entry);
                matched = std::mem::take(&mut counter.matched);
                entry
            });

        if let Err(err) = rearmed {
            warn!("Timer {} lost its clock entry: {}", self.handler, err);
            return;
        }
        if matched {
            self.hook.on_compare();
        }
    }
}

impl<H: CompareHook> Peripheral for ComparingTimer<H> {
    fn reset(&self) {
        if let Err(err) = ComparingTimer::reset(self) {
            warn!("Reset of timer {} failed: {}", self.handler, err);
        }
    }
}

impl<H: CompareHook> Timer for ComparingTimer<H> {
    fn enabled(&self) -> TimerResult<bool> {
        ComparingTimer::enabled(self)
    }

    fn set_enabled(&self, enabled: bool) -> TimerResult<()> {
        ComparingTimer::set_enabled(self, enabled)
    }

    fn value(&self) -> TimerResult<Ticks> {
        ComparingTimer::value(self)
    }

    fn set_value(&self, value: Ticks) -> TimerResult<()> {
        ComparingTimer::set_value(self, value)
    }
}

impl<H: CompareHook> Drop for ComparingTimer<H> {
    fn drop(&mut self) {
        if self.source.remove_clock_entry(self.handler).is_ok() {
            debug!("Timer {} unregistered", self.handler);
        }
    }
}
