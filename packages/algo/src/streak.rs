//! Day-level study streaks.
//!
//! Days are calendar days in the learner's local time (a fixed UTC offset),
//! never 24h intervals: an attempt at 23:50 and one at 00:10 the next local
//! day are two consecutive days.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use crate::types::AttemptRecord;

/// Largest accepted offset magnitude (UTC-12..UTC+14, rounded up)
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StreakRun {
    pub length: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreakReport {
    /// Run ending at the most recent study day
    pub current: Option<StreakRun>,
    /// Longest run in the history; the earliest one wins ties
    pub longest: Option<StreakRun>,
    /// The current run ends today or yesterday
    pub active: bool,
    pub study_days: u32,
    pub last_study_day: Option<NaiveDate>,
}

impl StreakReport {
    /// Length of the current run, zero when there is none.
    pub fn current_length(&self) -> u32 {
        self.current.map_or(0, |run| run.length)
    }
}

/// Offset from minutes east of UTC; out-of-range values fall back to UTC.
pub fn utc_offset(minutes: i32) -> FixedOffset {
    if minutes.abs() <= MAX_OFFSET_MINUTES {
        if let Some(offset) = FixedOffset::east_opt(minutes * 60) {
            return offset;
        }
    }
    Utc.fix()
}

pub fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

pub fn study_days<'a, I>(attempts: I, offset: FixedOffset) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = &'a AttemptRecord>,
{
    attempts
        .into_iter()
        .map(|a| local_date(a.timestamp, offset))
        .collect()
}

/// Splits sorted days into maximal runs of consecutive days.
pub fn runs(days: &BTreeSet<NaiveDate>) -> Vec<StreakRun> {
    let mut runs: Vec<StreakRun> = Vec::new();
    for &day in days {
        match runs.last_mut() {
            Some(run) if run.end + Duration::days(1) == day => {
                run.end = day;
                run.length += 1;
            }
            _ => runs.push(StreakRun {
                length: 1,
                start: day,
                end: day,
            }),
        }
    }
    runs
}

pub fn streak_report(
    attempts: &[AttemptRecord],
    offset: FixedOffset,
    today: NaiveDate,
) -> StreakReport {
    let days = study_days(attempts, offset);
    let runs = runs(&days);

    let current = runs.last().copied();
    let mut longest: Option<StreakRun> = None;
    for run in &runs {
        if longest.map_or(true, |best| run.length > best.length) {
            longest = Some(*run);
        }
    }
    let active = current.is_some_and(|run| run.end + Duration::days(1) >= today);

    StreakReport {
        current,
        longest,
        active,
        study_days: days.len() as u32,
        last_study_day: days.last().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attempt_at(ts: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord {
            user_id: "u1".to_string(),
            question_id: "q1".to_string(),
            is_correct: true,
            timestamp: ts,
            quiz_id: None,
            answer: None,
            time_spent_secs: None,
        }
    }

    fn on_day(day: NaiveDate) -> AttemptRecord {
        attempt_at(Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap()))
    }

    fn d(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap() + Duration::days(offset)
    }

    #[test]
    fn test_gap_breaks_streak() {
        let attempts = vec![on_day(d(0)), on_day(d(1)), on_day(d(3))];
        let report = streak_report(&attempts, utc_offset(0), d(3));

        let longest = report.longest.unwrap();
        assert_eq!(longest.length, 2);
        assert_eq!(longest.end, d(1));
        assert_eq!(report.current.unwrap().length, 1);
        assert_eq!(report.current.unwrap().end, d(3));
        assert!(report.active);
        assert_eq!(report.study_days, 3);
    }

    #[test]
    fn test_empty_history() {
        let report = streak_report(&[], utc_offset(0), d(0));
        assert_eq!(report.current, None);
        assert_eq!(report.current_length(), 0);
        assert!(!report.active);
    }

    #[test]
    fn test_multiple_attempts_same_day_count_once() {
        let attempts = vec![on_day(d(0)), on_day(d(0)), on_day(d(1))];
        let report = streak_report(&attempts, utc_offset(0), d(1));
        assert_eq!(report.current_length(), 2);
        assert_eq!(report.study_days, 2);
    }

    #[test]
    fn test_local_date_not_wall_clock_interval() {
        // 23:30 and 00:30 local are one hour apart but on consecutive days.
        let offset = utc_offset(-5 * 60);
        let late = Utc.with_ymd_and_hms(2024, 4, 11, 4, 30, 0).unwrap(); // 23:30 on the 10th
        let early = Utc.with_ymd_and_hms(2024, 4, 11, 5, 30, 0).unwrap(); // 00:30 on the 11th
        let report = streak_report(&[attempt_at(late), attempt_at(early)], offset, d(1));
        assert_eq!(report.current_length(), 2);

        // Same instants in UTC fall on a single day.
        let utc = streak_report(&[attempt_at(late), attempt_at(early)], utc_offset(0), d(1));
        assert_eq!(utc.current_length(), 1);
    }

    #[test]
    fn test_stale_streak_inactive() {
        let attempts = vec![on_day(d(0)), on_day(d(1))];
        let report = streak_report(&attempts, utc_offset(0), d(4));
        assert!(!report.active);
        assert_eq!(report.current_length(), 2);
    }

    #[test]
    fn test_longest_prefers_earliest_on_tie() {
        let attempts = vec![on_day(d(0)), on_day(d(1)), on_day(d(5)), on_day(d(6))];
        let report = streak_report(&attempts, utc_offset(0), d(6));
        assert_eq!(report.longest.unwrap().start, d(0));
    }

    #[test]
    fn test_offset_out_of_range_falls_back_to_utc() {
        assert_eq!(utc_offset(24 * 60).local_minus_utc(), 0);
        assert_eq!(utc_offset(330).local_minus_utc(), 330 * 60);
    }
}
