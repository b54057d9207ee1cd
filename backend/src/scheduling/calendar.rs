//! Calendar arithmetic in the center's local time: converting between local
//! (date, minute-of-day) and UTC instants, holiday lookups, and expanding a
//! weekly pattern into dated occurrences.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{DayOfWeek, WeeklySlot};

/// UTC instant of `minute` minutes past local midnight on `date`.
pub fn local_to_utc(date: NaiveDate, minute: u32, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minute));
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Local (date, day of week, minute of day) of a UTC instant.
pub fn utc_to_local(instant: DateTime<Utc>, offset: FixedOffset) -> (NaiveDate, DayOfWeek, u32) {
    let local = instant.with_timezone(&offset).naive_local();
    let date = local.date();
    let day = date.weekday().num_days_from_sunday() as DayOfWeek;
    let minute = local.time().signed_duration_since(NaiveTime::MIN).num_minutes() as u32;
    (date, day, minute)
}

/// First date on or after `anchor` that falls on `day`.
pub fn first_on_or_after(anchor: NaiveDate, day: DayOfWeek) -> NaiveDate {
    let current = anchor.weekday().num_days_from_sunday();
    let delta = (u32::from(day) + 7 - current) % 7;
    anchor + Days::new(u64::from(delta))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayInfo {
    pub date: NaiveDate,
    pub name: String,
}

/// Date -> holiday lookup used when expanding sessions.
pub trait HolidayCalendar: Send + Sync {
    fn holiday_on(&self, date: NaiveDate) -> Option<HolidayInfo>;
}

/// Fixed list of holidays, typically loaded from configuration.
///
/// Only listed dates are holidays; nothing is derived from a national calendar.
#[derive(Debug, Clone, Default)]
pub struct HolidayList {
    by_date: BTreeMap<NaiveDate, String>,
}

impl HolidayList {
    pub fn new(holidays: impl IntoIterator<Item = HolidayInfo>) -> Self {
        Self {
            by_date: holidays.into_iter().map(|h| (h.date, h.name)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

impl HolidayCalendar for HolidayList {
    fn holiday_on(&self, date: NaiveDate) -> Option<HolidayInfo> {
        self.by_date.get(&date).map(|name| HolidayInfo {
            date,
            name: name.clone(),
        })
    }
}

/// One dated occurrence of a weekly slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Index into the slot list that was expanded.
    pub slot: usize,
    pub date: NaiveDate,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub session_no: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpansionError {
    #[error("cannot expand {total} sessions from an empty weekly pattern")]
    NoSlots { total: u32 },
    #[error("only {placed} of {total} sessions fit in {weeks} weeks (holidays?)")]
    Exhausted { placed: u32, total: u32, weeks: u64 },
}

/// Expand a weekly pattern into `total` dated occurrences starting at `anchor`.
///
/// Weeks are walked in order from the anchor; inside a week occurrences are
/// ordered by date then start minute. Holiday dates are skipped and do not
/// consume a session number.
pub fn expand_weekly(
    slots: &[WeeklySlot],
    anchor: NaiveDate,
    total: u32,
    holidays: &dyn HolidayCalendar,
    offset: FixedOffset,
    max_weeks: u64,
) -> Result<Vec<Occurrence>, ExpansionError> {
    if total == 0 {
        return Ok(Vec::new());
    }
    if slots.is_empty() {
        return Err(ExpansionError::NoSlots { total });
    }

    let mut order: Vec<(NaiveDate, u32, usize)> = slots
        .iter()
        .enumerate()
        .map(|(i, s)| (first_on_or_after(anchor, s.day_of_week), s.start_minute, i))
        .collect();
    order.sort();

    let mut occurrences = Vec::with_capacity(total as usize);
    let mut week: u64 = 0;
    while occurrences.len() < total as usize {
        if week >= max_weeks {
            return Err(ExpansionError::Exhausted {
                placed: occurrences.len() as u32,
                total,
                weeks: max_weeks,
            });
        }
        for &(first, _, idx) in &order {
            if occurrences.len() == total as usize {
                break;
            }
            let date = first + Days::new(7 * week);
            if let Some(holiday) = holidays.holiday_on(date) {
                log::debug!("Skipping {} ({})", date, holiday.name);
                continue;
            }
            let slot = &slots[idx];
            occurrences.push(Occurrence {
                slot: idx,
                date,
                start_at: local_to_utc(date, slot.start_minute, offset),
                end_at: local_to_utc(date, slot.end_minute, offset),
                session_no: occurrences.len() as u32 + 1,
            });
        }
        week += 1;
    }
    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoomId, TeacherId};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn slot(day: DayOfWeek, start: u32) -> WeeklySlot {
        WeeklySlot {
            day_of_week: day,
            start_minute: start,
            end_minute: start + 90,
            room: RoomId::new(1),
            teacher: TeacherId::new(1),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_local_round_trip() {
        let at = local_to_utc(date(2026, 3, 4), 480, offset());
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 4, 1, 0, 0).unwrap());
        // 2026-03-04 is a Wednesday
        assert_eq!(utc_to_local(at, offset()), (date(2026, 3, 4), 3, 480));
    }

    #[test]
    fn test_first_on_or_after() {
        let wednesday = date(2026, 3, 4);
        assert_eq!(first_on_or_after(wednesday, 3), wednesday);
        assert_eq!(first_on_or_after(wednesday, 5), date(2026, 3, 6));
        assert_eq!(first_on_or_after(wednesday, 1), date(2026, 3, 9));
    }

    #[test]
    fn test_expansion_orders_by_date_within_week() {
        // anchor Wednesday; Monday slot first occurs next week
        let slots = vec![slot(1, 480), slot(5, 480)];
        let occ = expand_weekly(&slots, date(2026, 3, 4), 4, &HolidayList::default(), offset(), 10)
            .unwrap();
        let dates: Vec<_> = occ.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 3, 6), date(2026, 3, 9), date(2026, 3, 13), date(2026, 3, 16)]
        );
        let numbers: Vec<_> = occ.iter().map(|o| o.session_no).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_holidays_are_skipped_without_consuming_numbers() {
        let holidays = HolidayList::new(vec![HolidayInfo {
            date: date(2026, 3, 11),
            name: "Closed".into(),
        }]);
        let slots = vec![slot(3, 1080)];
        let occ = expand_weekly(&slots, date(2026, 3, 4), 3, &holidays, offset(), 10).unwrap();
        let dates: Vec<_> = occ.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![date(2026, 3, 4), date(2026, 3, 18), date(2026, 3, 25)]);
        assert_eq!(occ[2].session_no, 3);
    }

    #[test]
    fn test_expansion_gives_up_after_max_weeks() {
        let holidays = HolidayList::new((0..4).map(|w| HolidayInfo {
            date: date(2026, 3, 4) + Days::new(7 * w),
            name: "Closed".into(),
        }));
        let err = expand_weekly(&[slot(3, 480)], date(2026, 3, 4), 2, &holidays, offset(), 4)
            .unwrap_err();
        assert_eq!(
            err,
            ExpansionError::Exhausted {
                placed: 0,
                total: 2,
                weeks: 4
            }
        );
    }
}
