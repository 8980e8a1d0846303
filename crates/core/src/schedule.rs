//! Slot calendar generation.
//!
//! A slot is a bookable time-of-day unit within the clinic's operating
//! calendar. The generator is a pure function of the requested date and the
//! process-wide [`ScheduleConfig`]: no clock reads, no randomness, so two
//! calls with the same inputs always produce the same sequence.

use crate::config::ScheduleConfig;
use chrono::{Datelike, NaiveDate, NaiveTime};

/// How a calendar date relates to the weekly operating pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayKind {
    /// The weekly closure day; no slots exist.
    Closed,
    /// The weekly short day; slots end at the partial closing time.
    Partial,
    /// Any other day; slots run to the ordinary closing time, minus the break window.
    Ordinary,
}

impl DayKind {
    /// Classify a date against the configured weekly pattern.
    pub fn of(date: NaiveDate, config: &ScheduleConfig) -> Self {
        let weekday = date.weekday();
        if weekday == config.closure_weekday() {
            DayKind::Closed
        } else if weekday == config.partial_weekday() {
            DayKind::Partial
        } else {
            DayKind::Ordinary
        }
    }
}

/// Generate the ordered slot start times for a date.
///
/// Slots run from the opening time through the closing time inclusive, at the
/// configured increment. On the closure day the sequence is empty. On the
/// partial day the sequence ends at the partial closing time. On ordinary
/// days, start times in `[break_start, break_end)` are omitted: the break
/// start itself is excluded, the break end is generated.
pub fn generate(date: NaiveDate, config: &ScheduleConfig) -> Vec<NaiveTime> {
    let kind = DayKind::of(date, config);
    let close = match kind {
        DayKind::Closed => return Vec::new(),
        DayKind::Partial => config.partial_close(),
        DayKind::Ordinary => config.close(),
    };

    let step = config.increment();
    let mut slots = Vec::new();
    let mut current = config.open();
    while current <= close {
        let in_break = kind == DayKind::Ordinary
            && current >= config.break_start()
            && current < config.break_end();
        if !in_break {
            slots.push(current);
        }

        // NaiveTime addition wraps at midnight; a wrap means we ran off the day.
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-03-09 is a Sunday, 2025-03-10 a Monday, 2025-03-15 a Saturday.
    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    #[test]
    fn closure_day_has_no_slots() {
        let config = ScheduleConfig::default();
        assert!(generate(sunday(), &config).is_empty());

        // Holds for every date falling on the closure weekday.
        for week in 1..8 {
            let date = sunday() + chrono::Duration::weeks(week);
            assert!(generate(date, &config).is_empty(), "failed for {date}");
        }
    }

    #[test]
    fn ordinary_day_skips_break_window() {
        let config = ScheduleConfig::default();
        let slots = generate(monday(), &config);

        assert!(!slots.contains(&time(13, 0)), "break start must be excluded");
        assert!(!slots.contains(&time(13, 30)));
        assert!(slots.contains(&time(14, 0)), "break end must be generated");
        for slot in &slots {
            assert!(
                *slot < config.break_start() || *slot >= config.break_end(),
                "slot {slot} falls inside the break window"
            );
        }
    }

    #[test]
    fn ordinary_day_runs_open_through_close() {
        let config = ScheduleConfig::default();
        let slots = generate(monday(), &config);

        assert_eq!(slots.first(), Some(&time(9, 0)));
        assert_eq!(slots.last(), Some(&time(18, 0)));
        // 09:00..=18:00 at 30 min is 19 starts, minus the two inside the break.
        assert_eq!(slots.len(), 17);
    }

    #[test]
    fn partial_day_ends_strictly_earlier() {
        let config = ScheduleConfig::default();
        let ordinary = generate(monday(), &config);
        let partial = generate(saturday(), &config);

        assert_eq!(partial.last(), Some(&time(12, 30)));
        assert!(partial.last().unwrap() < ordinary.last().unwrap());
    }

    #[test]
    fn output_is_ordered_and_deterministic() {
        let config = ScheduleConfig::default();
        let first = generate(monday(), &config);
        let second = generate(monday(), &config);

        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }
}
