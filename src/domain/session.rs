//! Trading session windows and the session deriver.
//!
//! Windows are UTC minute-of-day half-open intervals `[start, end)`. A window
//! whose `end` is numerically below its `start` wraps past midnight.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Sydney,
    Asia,
    London,
    NewYork,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Sydney => "sydney",
            Session::Asia => "asia",
            Session::London => "london",
            Session::NewYork => "new_york",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub session: Session,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl SessionWindow {
    const fn new(session: Session, start_minute: u32, end_minute: u32) -> Self {
        SessionWindow {
            session,
            start_minute,
            end_minute,
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end_minute < self.start_minute
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.wraps_midnight() {
            minute_of_day >= self.start_minute || minute_of_day < self.end_minute
        } else {
            minute_of_day >= self.start_minute && minute_of_day < self.end_minute
        }
    }
}

/// Registry order is the order sessions are reported in.
pub static SESSION_WINDOWS: [SessionWindow; 4] = [
    SessionWindow::new(Session::Sydney, 21 * 60, 5 * 60 + 30),
    SessionWindow::new(Session::Asia, 0, 9 * 60),
    SessionWindow::new(Session::London, 8 * 60, 16 * 60 + 30),
    SessionWindow::new(Session::NewYork, 13 * 60, 21 * 60),
];

/// Every session open at `at`. Saturdays and Sundays (UTC) have none.
pub fn derive_sessions(at: DateTime<Utc>) -> Vec<Session> {
    if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
        return Vec::new();
    }

    let minute_of_day = at.hour() * 60 + at.minute();
    SESSION_WINDOWS
        .iter()
        .filter(|w| w.contains(minute_of_day))
        .map(|w| w.session)
        .collect()
}
