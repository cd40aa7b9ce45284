use time::{Duration, OffsetDateTime};

/// Lead time applied when no explicit trigger was chosen: withdraw this many days before
/// the market resolves.
pub const DEFAULT_LEAD_DAYS: i64 = 3;

/// The user's request to register (or not) an automated withdrawal, plus its trigger instant.
///
/// Immutable: every edit goes through a `with_*` transform that returns a new value, so a form
/// can hold one intent per render without anything mutating it behind its back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleIntent {
    should_submit: bool,
    trigger_at: Option<OffsetDateTime>,
}

impl ScheduleIntent {
    pub const fn new(should_submit: bool, trigger_at: Option<OffsetDateTime>) -> Self {
        Self {
            should_submit,
            trigger_at,
        }
    }

    /// Intent that never schedules anything.
    pub const fn disabled() -> Self {
        Self::new(false, None)
    }

    pub const fn should_submit(&self) -> bool {
        self.should_submit
    }

    pub const fn trigger_at(&self) -> Option<OffsetDateTime> {
        self.trigger_at
    }

    #[must_use]
    pub const fn with_should_submit(self, should_submit: bool) -> Self {
        Self {
            should_submit,
            ..self
        }
    }

    #[must_use]
    pub const fn with_trigger_at(self, trigger_at: OffsetDateTime) -> Self {
        Self {
            trigger_at: Some(trigger_at),
            ..self
        }
    }

    #[must_use]
    pub const fn without_trigger(self) -> Self {
        Self {
            trigger_at: None,
            ..self
        }
    }

    /// Fill in the default trigger (`DEFAULT_LEAD_DAYS` before `resolution`) when none is set.
    /// An explicit trigger is kept as-is.
    #[must_use]
    pub fn defaulted_for(self, resolution: OffsetDateTime) -> Self {
        match self.trigger_at {
            Some(_) => self,
            None => self.with_trigger_at(resolution - Duration::days(DEFAULT_LEAD_DAYS)),
        }
    }

    /// Whole days (rounded) between the trigger and `resolution`.
    pub fn days_before(&self, resolution: OffsetDateTime) -> Option<i64> {
        let trigger = self.trigger_at?;
        let seconds = (resolution - trigger).as_seconds_f64();
        Some((seconds / 86_400.0).round() as i64)
    }

    /// Trigger as integer epoch seconds.
    pub fn trigger_unix_timestamp(&self) -> Option<i64> {
        self.trigger_at.map(OffsetDateTime::unix_timestamp)
    }
}
