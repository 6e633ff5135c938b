//! Period boundary derivation.
//!
//! One `BoundaryPolicy` per way of cutting a bar history into windows:
//! calendar-anchored (year, quarter), rolling (trailing N days), session
//! (from the last session open) and prior-completed (the N most recent full
//! years or quarters before the reference date).

use crate::domain::{Period, PeriodKind};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// How period boundaries are derived from a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Jan 1 of the reference year, open-ended.
    CalendarYear,
    /// First day of the civil quarter containing the reference date, open-ended.
    CalendarQuarter,
    /// Reference instant minus `days`, open-ended.
    Trailing { days: i64 },
    /// Session open on the reference date, rolled back a day when the
    /// reference time is before the open.
    Session { open: NaiveTime },
    /// The `count` most recent completed calendar years.
    PriorYears { count: usize },
    /// The `count` most recent completed calendar quarters.
    PriorQuarters { count: usize },
}

impl BoundaryPolicy {
    pub fn kind(&self) -> PeriodKind {
        match self {
            BoundaryPolicy::CalendarYear | BoundaryPolicy::PriorYears { .. } => PeriodKind::Yearly,
            BoundaryPolicy::CalendarQuarter | BoundaryPolicy::PriorQuarters { .. } => {
                PeriodKind::Quarterly
            }
            BoundaryPolicy::Trailing { .. } => PeriodKind::ThreeMonth,
            BoundaryPolicy::Session { .. } => PeriodKind::Daily,
        }
    }

    /// Derive the periods this policy produces for `reference`.
    ///
    /// Current-period policies yield exactly one period; prior policies yield
    /// up to `count`, most recent first.
    pub fn periods(&self, reference: NaiveDateTime) -> Vec<Period> {
        let date = reference.date();
        match *self {
            BoundaryPolicy::CalendarYear => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .map(|start| {
                    Period::current(
                        PeriodKind::Yearly,
                        start.and_time(NaiveTime::MIN),
                        format!("{} Yearly VWAP", date.year()),
                    )
                })
                .into_iter()
                .collect(),
            BoundaryPolicy::CalendarQuarter => quarter_start(date)
                .map(|start| {
                    Period::current(
                        PeriodKind::Quarterly,
                        start.and_time(NaiveTime::MIN),
                        format!("Q{} {} VWAP", quarter_of(date), date.year()),
                    )
                })
                .into_iter()
                .collect(),
            BoundaryPolicy::Trailing { days } => vec![Period::current(
                PeriodKind::ThreeMonth,
                Duration::try_days(days)
                    .and_then(|d| reference.checked_sub_signed(d))
                    .unwrap_or(NaiveDateTime::MIN),
                format!("{days}-Day VWAP"),
            )],
            BoundaryPolicy::Session { open } => {
                let mut start = date.and_time(open);
                if reference.time() < open {
                    start -= Duration::days(1);
                }
                vec![Period::current(
                    PeriodKind::Daily,
                    start,
                    format!("Session VWAP ({})", start.date()),
                )]
            }
            BoundaryPolicy::PriorYears { count } => (1..=count as i32)
                .filter_map(|back| prior_year(date.year() - back))
                .collect(),
            BoundaryPolicy::PriorQuarters { count } => {
                let (mut year, mut quarter) = (date.year(), quarter_of(date));
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    (year, quarter) = previous_quarter(year, quarter);
                    if let Some(p) = prior_quarter(year, quarter) {
                        out.push(p);
                    }
                }
                out
            }
        }
    }
}

/// Civil quarter (1..=4) containing `date`.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// First day of the civil quarter containing `date`.
pub fn quarter_start(date: NaiveDate) -> Option<NaiveDate> {
    first_day_of_quarter(date.year(), quarter_of(date))
}

fn first_day_of_quarter(year: i32, quarter: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}

/// Quarter before (year, quarter); Q1 rolls back to Q4 of the previous year.
fn previous_quarter(year: i32, quarter: u32) -> (i32, u32) {
    if quarter <= 1 {
        (year - 1, 4)
    } else {
        (year, quarter - 1)
    }
}

/// Last representable instant before `next_start`, so the end bound is
/// inclusive of every bar on the final day.
fn end_before(next_start: NaiveDate) -> NaiveDateTime {
    next_start.and_time(NaiveTime::MIN) - Duration::nanoseconds(1)
}

fn prior_year(year: i32) -> Option<Period> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
    Some(Period::prior(
        PeriodKind::Yearly,
        start.and_time(NaiveTime::MIN),
        end_before(next),
        format!("{year} VWAP (Prior)"),
    ))
}

/// Completed calendar quarter `quarter` of `year` as a closed period.
pub fn prior_quarter(year: i32, quarter: u32) -> Option<Period> {
    let start = first_day_of_quarter(year, quarter)?;
    let next = if quarter == 4 {
        first_day_of_quarter(year + 1, 1)?
    } else {
        first_day_of_quarter(year, quarter + 1)?
    };
    Some(Period::prior(
        PeriodKind::Quarterly,
        start.and_time(NaiveTime::MIN),
        end_before(next),
        format!("Q{quarter} {year} VWAP (Prior)"),
    ))
}
