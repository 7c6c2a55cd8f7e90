//! Maintenance window gate.
//!
//! Both cleanup passes only act during configured hours of the day. The
//! window is written as `;`-separated hours, e.g. `"04"` or `"04;16"`.

use chrono::{DateTime, Local, TimeZone, Timelike};
use std::collections::BTreeSet;
use tracing::warn;

/// Predicate deciding whether cleanup may run right now.
pub trait MaintenanceWindow: Send + Sync {
    /// Returns `true` if the window is currently open.
    fn is_open(&self) -> bool;
}

/// Window open during whole hours of each day, in local time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DailyWindow {
    hours: BTreeSet<u32>,
}

impl DailyWindow {
    /// Parses a `;`-separated list of hours (`0`-`23`).
    ///
    /// Entries that are not valid hours are logged and ignored, so a fully
    /// malformed value yields a window that never opens.
    #[must_use]
    pub fn parse(when: &str) -> Self {
        let mut hours = BTreeSet::new();
        for part in when.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<u32>() {
                Ok(hour) if hour < 24 => {
                    hours.insert(hour);
                },
                _ => warn!(entry = part, window = when, "Ignoring invalid maintenance hour"),
            }
        }
        Self { hours }
    }

    /// Hours during which the window is open.
    #[must_use]
    pub const fn hours(&self) -> &BTreeSet<u32> {
        &self.hours
    }

    /// Returns `true` if the window is open at the given instant.
    #[must_use]
    pub fn is_open_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.hours.contains(&at.hour())
    }
}

impl MaintenanceWindow for DailyWindow {
    fn is_open(&self) -> bool {
        self.is_open_at(&Local::now())
    }
}

/// Window that never closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl MaintenanceWindow for AlwaysOpen {
    fn is_open(&self) -> bool {
        true
    }
}
