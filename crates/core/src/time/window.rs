use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, NaiveDate, Utc};

pub const MAX_WINDOW_DAYS: u32 = 366;

/// Half-open range of billing days: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn ending_on(end: NaiveDate, days: u32) -> anyhow::Result<Self> {
        ensure!(
            (1..=MAX_WINDOW_DAYS).contains(&days),
            "analysis window must span 1 to {MAX_WINDOW_DAYS} days, got {days}"
        );
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .with_context(|| format!("{days}-day window ending {end} is out of range"))?;
        Ok(Self { start, end })
    }

    pub fn preceding(&self) -> anyhow::Result<Self> {
        let days = u32::try_from(self.days()).context("window length out of range")?;
        Self::ending_on(self.start, days)
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

pub fn resolve_window(
    end_arg: Option<&str>,
    days: u32,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<AnalysisWindow> {
    let end = match end_arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid end date {s:?} (expected YYYY-MM-DD)"))?,
        None => now_utc.date_naive(),
    };

    AnalysisWindow::ending_on(end, days)
}
