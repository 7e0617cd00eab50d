use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::core::error::GravityError;
use crate::core::{DateTime, Duration};

/// When should the next tick happen. Independent of how ticks are driven.
pub trait Schedule: Send + Sync {
    /// The first fire time strictly after `now`, or `None` when the schedule is exhausted.
    fn next_after(&self, now: DateTime) -> Option<DateTime>;
}

/// Cron expression evaluated in a timezone. Seconds resolution.
///
/// Accepts 6 or 7 fields (`sec min hour day month weekday [year]`). A classic 5-field expression
/// is accepted too and fires at second zero.
#[derive(Clone)]
pub struct CronSchedule {
    source: String,
    expression: cron::Schedule,
    timezone: Tz,
}

impl CronSchedule {
    /// Parse `expression` and resolve `timezone` (IANA name, empty means UTC).
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, GravityError> {
        let timezone = resolve_timezone(timezone)?;
        let expression = expression.trim();
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };
        let expression = cron::Schedule::from_str(&normalized).map_err(|e| {
            GravityError::Config(format!("invalid cron expression {expression:?}: {e}"))
        })?;
        Ok(Self {
            source: normalized,
            expression,
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl Schedule for CronSchedule {
    fn next_after(&self, now: DateTime) -> Option<DateTime> {
        let local = now.with_timezone(&self.timezone);
        self.expression
            .after(&local)
            .next()
            .map(|next| next.with_timezone(&chrono::Utc))
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expression", &self.source)
            .field("timezone", &self.timezone.name())
            .finish()
    }
}

fn resolve_timezone(name: &str) -> Result<Tz, GravityError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|e| GravityError::Config(format!("unknown timezone {name:?}: {e}")))
}

/// Fires every `period`, counted from the time it is asked.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSchedule {
    period: Duration,
}

impl IntervalSchedule {
    pub fn new(period: std::time::Duration) -> Result<Self, GravityError> {
        let period = Duration::from_std(period)
            .ok()
            .filter(|p| *p > Duration::zero())
            .ok_or_else(|| {
                GravityError::Config(format!("interval must be greater than zero: {period:?}"))
            })?;
        Ok(Self { period })
    }
}

impl Schedule for IntervalSchedule {
    fn next_after(&self, now: DateTime) -> Option<DateTime> {
        now.checked_add_signed(self.period)
    }
}
