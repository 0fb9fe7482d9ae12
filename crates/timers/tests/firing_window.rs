//! Firing Window Integration Test
//!
//! The clock source commits a timer's crossing, releases its lock, then runs
//! the timer's handler. Register accesses from other threads can land in
//! between. A delegating clock source runs such an access deterministically
//! right before the handler's own exchange:
//! - reads inside the window see the crossed value
//! - writes inside the window are kept
//! - the compare match is still reported exactly once

use parking_lot::Mutex;
use std::sync::Arc;
use vtime_clock::BaseClockSource;
use vtime_core::{ClockEntry, Frequency, HandlerId, Ticks};
use vtime_ports::{ClockResult, ClockSource, RegistryLock};
use vtime_timers::{ComparingTimer, InterruptLine, TimerState};

type Intrusion = Box<dyn FnOnce() + Send>;

/// Runs a queued action in front of the next entry exchange
struct Interposed {
    inner: BaseClockSource,
    pending: Mutex<Option<Intrusion>>,
}

impl Interposed {
    fn new() -> Self {
        Self {
            inner: BaseClockSource::new(),
            pending: Mutex::new(None),
        }
    }

    fn before_next_exchange(&self, action: impl FnOnce() + Send + 'static) {
        *self.pending.lock() = Some(Box::new(action));
    }
}

impl ClockSource for Interposed {
    fn frequency(&self) -> Frequency {
        self.inner.frequency()
    }

    fn add_clock_entry(&self, entry: ClockEntry) -> ClockResult<()> {
        self.inner.add_clock_entry(entry)
    }

    fn remove_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry> {
        self.inner.remove_clock_entry(handler)
    }

    fn get_clock_entry(&self, handler: HandlerId) -> ClockResult<ClockEntry> {
        self.inner.get_clock_entry(handler)
    }

    fn inspect_clock_entry(
        &self,
        handler: HandlerId,
        action: &mut dyn FnMut(&ClockEntry),
    ) -> ClockResult<()> {
        self.inner.inspect_clock_entry(handler, action)
    }

    fn exchange_clock_entry(
        &self,
        handler: HandlerId,
        transform: &mut dyn FnMut(&ClockEntry) -> ClockEntry,
    ) -> ClockResult<ClockEntry> {
        let intrusion = self.pending.lock().take();
        if let Some(intrusion) = intrusion {
            intrusion();
        }
        self.inner.exchange_clock_entry(handler, transform)
    }

    fn lock_registry(&self) -> RegistryLock<'_> {
        self.inner.lock_registry()
    }

    fn advance(&self, ticks: Ticks) {
        self.inner.advance(ticks)
    }

    fn elapsed_ticks(&self) -> Ticks {
        self.inner.elapsed_ticks()
    }
}

fn setup() -> (Arc<Interposed>, Arc<ComparingTimer<InterruptLine>>) {
    let source = Arc::new(Interposed::new());
    let timer = ComparingTimer::new(
        source.clone(),
        source.frequency(),
        40,
        100,
        InterruptLine::new("window"),
    )
    .unwrap();
    timer.set_enabled(true).unwrap();
    source.advance(39);
    assert_eq!(timer.value().unwrap(), 39);
    (source, timer)
}

#[test]
fn test_value_written_in_firing_window_is_kept() {
    let _ = env_logger::try_init();
    let (source, timer) = setup();

    let seen = Arc::new(Mutex::new(None));
    {
        let timer = timer.clone();
        let seen = seen.clone();
        source.before_next_exchange(move || {
            *seen.lock() = Some((
                timer.value().unwrap(),
                timer.enabled().unwrap(),
                timer.state().unwrap(),
            ));
            timer.set_value(10).unwrap();
        });
    }

    source.advance(1);
    assert_eq!(
        *seen.lock(),
        Some((40, true, TimerState::ArmedTowardLimit))
    );
    assert_eq!(timer.value().unwrap(), 10);
    assert_eq!(timer.hook().raised_count(), 1);

    // re-armed from the written value
    source.advance(29);
    assert_eq!(timer.hook().raised_count(), 1);
    source.advance(1);
    assert_eq!(timer.hook().raised_count(), 2);
    assert_eq!(timer.value().unwrap(), 40);
}

#[test]
fn test_compare_written_in_firing_window_is_kept() {
    let _ = env_logger::try_init();
    let (source, timer) = setup();

    {
        let timer = timer.clone();
        source.before_next_exchange(move || timer.set_compare(70).unwrap());
    }

    source.advance(1);
    assert_eq!(timer.compare(), 70);
    assert_eq!(timer.value().unwrap(), 40);
    assert_eq!(timer.hook().raised_count(), 1);

    source.advance(29);
    assert_eq!(timer.hook().raised_count(), 1);
    source.advance(1);
    assert_eq!(timer.hook().raised_count(), 2);
    assert_eq!(timer.value().unwrap(), 70);
}

#[test]
fn test_disable_in_firing_window_still_reports_match() {
    let _ = env_logger::try_init();
    let (source, timer) = setup();

    {
        let timer = timer.clone();
        source.before_next_exchange(move || timer.set_enabled(false).unwrap());
    }

    source.advance(1);
    assert_eq!(timer.hook().raised_count(), 1);
    assert!(!timer.enabled().unwrap());
    assert_eq!(timer.value().unwrap(), 40);

    source.advance(100);
    assert_eq!(timer.value().unwrap(), 40);
    assert_eq!(timer.hook().raised_count(), 1);
}
