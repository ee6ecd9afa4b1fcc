// Clock abstraction
//
// All instants handed out are absolute (`DateTime<Utc>`); the reference
// timezone is only used for display and for resolving naive local input.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// Current absolute instant
    fn now(&self) -> DateTime<Utc>;

    /// Reference timezone of this clock
    fn timezone(&self) -> Tz;

    /// Current instant expressed in the reference timezone
    fn now_local(&self) -> DateTime<Tz> {
        self.now().with_timezone(&self.timezone())
    }
}

/// Wall clock in a fixed reference timezone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Singapore)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    timezone: Tz,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            timezone: chrono_tz::UTC,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}
