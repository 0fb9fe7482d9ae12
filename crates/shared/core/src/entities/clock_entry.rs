use serde::{Deserialize, Serialize};

use super::{ClockHandler, HandlerId, WorkMode};
use crate::values::{Ratio, Ticks};

/// One scheduled event on a clock source
///
/// Entries are values: a clock source never mutates a stored entry in place,
/// it replaces it with a new one built through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEntry {
    /// Entry-domain ticks until the event fires
    pub period: Ticks,
    /// Source ticks to entry-domain ticks
    pub ratio: Ratio,
    /// Progress toward `period`
    pub value: Ticks,
    /// Disabled entries neither accumulate nor fire
    pub enabled: bool,
    pub work_mode: WorkMode,
    /// Callback and registry identity
    pub handler: ClockHandler,
}

impl ClockEntry {
    /// Create an entry with zero progress
    pub fn new(
        period: Ticks,
        ratio: Ratio,
        handler: ClockHandler,
        enabled: bool,
        work_mode: WorkMode,
    ) -> Self {
        Self {
            period,
            ratio,
            value: 0,
            enabled,
            work_mode,
            handler,
        }
    }

    /// Enabled periodic entry running at the source frequency
    pub fn periodic(period: Ticks, handler: ClockHandler) -> Self {
        Self::new(period, Ratio::ONE, handler, true, WorkMode::Periodic)
    }

    /// Enabled one-shot entry running at the source frequency
    pub fn one_shot(period: Ticks, handler: ClockHandler) -> Self {
        Self::new(period, Ratio::ONE, handler, true, WorkMode::OneShot)
    }

    /// Registry key of this entry
    pub fn id(&self) -> HandlerId {
        self.handler.id()
    }

    pub fn with_period(&self, period: Ticks) -> Self {
        Self {
            period,
            ..self.clone()
        }
    }

    pub fn with_value(&self, value: Ticks) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    pub fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            ..self.clone()
        }
    }

    pub fn with_ratio(&self, ratio: Ratio) -> Self {
        Self {
            ratio,
            ..self.clone()
        }
    }

    pub fn with_work_mode(&self, work_mode: WorkMode) -> Self {
        Self {
            work_mode,
            ..self.clone()
        }
    }

    /// Entry-domain ticks left before the event fires
    pub fn remaining(&self) -> Ticks {
        self.period.saturating_sub(self.value)
    }

    /// Serializable view of the entry without its callback
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            handler: self.id(),
            period: self.period,
            ratio: self.ratio,
            value: self.value,
            enabled: self.enabled,
            work_mode: self.work_mode,
        }
    }
}

/// Callback-free copy of a [`ClockEntry`] for diagnostics and dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub handler: HandlerId,
    pub period: Ticks,
    pub ratio: Ratio,
    pub value: Ticks,
    pub enabled: bool,
    pub work_mode: WorkMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_leaves_original_untouched() {
        let entry = ClockEntry::one_shot(10, ClockHandler::new(|| {}));
        let changed = entry.with_value(4).with_enabled(false).with_period(20);

        assert_eq!(entry.value, 0);
        assert!(entry.enabled);
        assert_eq!(entry.period, 10);

        assert_eq!(changed.value, 4);
        assert!(!changed.enabled);
        assert_eq!(changed.period, 20);
        assert_eq!(changed.id(), entry.id());
    }

    #[test]
    fn test_remaining_saturates() {
        let entry = ClockEntry::periodic(5, ClockHandler::new(|| {})).with_value(7);
        assert_eq!(entry.remaining(), 0);
        assert_eq!(entry.with_value(2).remaining(), 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let ratio = Ratio::new(1, 4).unwrap();
        let entry = ClockEntry::new(
            100,
            ratio,
            ClockHandler::new(|| {}),
            false,
            WorkMode::OneShot,
        )
        .with_value(12);

        let snapshot = entry.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: EntrySnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back, snapshot);
        assert_eq!(back.handler, entry.id());
        assert_eq!(back.value, 12);
        assert_eq!(back.work_mode, WorkMode::OneShot);
    }
}
