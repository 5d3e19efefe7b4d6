//! Time window evaluation
//!
//! Resolves schedule boundaries against a caller-supplied instant and tests
//! whether that instant falls inside a window. Everything here is evaluated
//! in the time zone of `now`.

use crate::crd::{ScheduleSpec, ScheduleUnit, TimeUnit};
use crate::error::ScheduleError;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Weekday};
use tracing::{debug, warn};

/// Full weekday names, Sunday first
pub const WEEKDAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MIDNIGHT: &str = "00:00:00";

/// Lowercase full name of a weekday
pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_sunday() as usize]
}

/// True if `day` is a full weekday name, ignoring case
pub fn is_weekday_name(day: &str) -> bool {
    WEEKDAY_NAMES.iter().any(|name| name.eq_ignore_ascii_case(day))
}

/// Resolve a [`TimeUnit`] to an instant on the calendar of `now`
pub fn resolve<Tz: TimeZone>(unit: &TimeUnit, now: &DateTime<Tz>) -> Result<DateTime<Tz>, ScheduleError> {
    let date = if unit.date.trim().is_empty() {
        format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day())
    } else {
        substitute_placeholders(&unit.date, now)
    };
    let time = if unit.time.trim().is_empty() {
        MIDNIGHT
    } else {
        unit.time.as_str()
    };

    let composed = format!("{} {}", date, time);
    let naive = NaiveDateTime::parse_from_str(&composed, TIMESTAMP_FORMAT).map_err(|e| {
        ScheduleError::TimeFormat {
            value: composed.clone(),
            reason: e.to_string(),
        }
    })?;
    // chrono accepts unpadded fields; the layout is fixed width
    if naive.format(TIMESTAMP_FORMAT).to_string() != composed {
        return Err(ScheduleError::TimeFormat {
            value: composed,
            reason: "expected YYYY-MM-DD HH:MM:SS".to_string(),
        });
    }

    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ScheduleError::TimeFormat {
            value: composed,
            reason: "local time does not exist in this time zone".to_string(),
        })
}

/// Replace the first `y`, `m` and `d` with the zero-padded date parts of `now`
fn substitute_placeholders<Tz: TimeZone>(template: &str, now: &DateTime<Tz>) -> String {
    template
        .replacen('y', &format!("{:04}", now.year()), 1)
        .replacen('m', &format!("{:02}", now.month()), 1)
        .replacen('d', &format!("{:02}", now.day()), 1)
}

/// True if the weekday of `now` is listed in `days`.
///
/// An empty list is never "included"; callers treat it as every day.
pub fn day_included<Tz: TimeZone>(days: &[String], now: &DateTime<Tz>) -> bool {
    let today = weekday_name(now.weekday());
    days.iter().any(|day| day.eq_ignore_ascii_case(today))
}

/// True if `now` lies strictly inside the unit's window on an included day
pub fn window_active<Tz: TimeZone>(unit: &ScheduleUnit, now: &DateTime<Tz>) -> bool {
    if !unit.days.is_empty() && !day_included(&unit.days, now) {
        return false;
    }

    let start = match resolve(&unit.start, now) {
        Ok(start) => start,
        Err(e) => {
            warn!(error = %e, "start time could not be resolved, window skipped");
            return false;
        }
    };
    let end = match resolve(&unit.end, now) {
        Ok(end) => end,
        Err(e) => {
            warn!(error = %e, "end time could not be resolved, window skipped");
            return false;
        }
    };

    *now > start && *now < end
}

/// Index of the first unit of `schedule` that is active at `now`
pub fn first_active_unit<Tz: TimeZone>(schedule: &ScheduleSpec, now: &DateTime<Tz>) -> Option<usize> {
    let active = schedule
        .schedule_units
        .iter()
        .position(|unit| window_active(unit, now));
    if active.is_none() {
        debug!(units = schedule.schedule_units.len(), "no active window");
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn unit(days: &[&str], start: TimeUnit, end: TimeUnit) -> ScheduleUnit {
        ScheduleUnit {
            days: days.iter().map(|d| d.to_string()).collect(),
            start,
            end,
        }
    }

    #[test]
    fn test_resolve_empty_unit_is_midnight_today() {
        let now = at(2023, 7, 21, 0, 0, 0);
        assert_eq!(resolve(&TimeUnit::default(), &now).unwrap(), now);

        let afternoon = at(2023, 7, 21, 15, 30, 0);
        assert_eq!(resolve(&TimeUnit::default(), &afternoon).unwrap(), now);
    }

    #[test]
    fn test_resolve_literal_date_and_time() {
        let now = at(2023, 7, 21, 0, 0, 0);
        let resolved = resolve(&TimeUnit::new("2023-07-21", "20:23:20"), &now).unwrap();
        assert_eq!(resolved, at(2023, 7, 21, 20, 23, 20));
    }

    #[test]
    fn test_resolve_placeholders() {
        let now = at(2023, 7, 21, 0, 0, 0);
        let resolved = resolve(&TimeUnit::new("y-m-d", "20:23:20"), &now).unwrap();
        assert_eq!(resolved, at(2023, 7, 21, 20, 23, 20));

        let fixed_day = resolve(&TimeUnit::new("y-m-01", "06:00:00"), &now).unwrap();
        assert_eq!(fixed_day, at(2023, 7, 1, 6, 0, 0));

        let new_year = resolve(&TimeUnit::new("y-12-31", ""), &now).unwrap();
        assert_eq!(new_year, at(2023, 12, 31, 0, 0, 0));
    }

    #[test]
    fn test_resolve_invalid_date() {
        let now = at(2023, 7, 21, 0, 0, 0);
        let err = resolve(&TimeUnit::new("2023-13-12", ""), &now).unwrap_err();
        assert!(matches!(err, ScheduleError::TimeFormat { .. }));
    }

    #[test]
    fn test_resolve_malformed_time() {
        let now = at(2023, 7, 21, 0, 0, 0);
        let err = resolve(&TimeUnit::new("", "20:23:20T234"), &now).unwrap_err();
        assert!(matches!(err, ScheduleError::TimeFormat { .. }));
    }

    #[test]
    fn test_resolve_rejects_unpadded_fields() {
        let now = at(2023, 7, 21, 0, 0, 0);
        for (date, time) in [("2023-7-1", "08:00:00"), ("2023-07-01", "8:0:0"), ("2023-7-1", "8:0:0")] {
            let err = resolve(&TimeUnit::new(date, time), &now).unwrap_err();
            assert!(
                matches!(err, ScheduleError::TimeFormat { .. }),
                "{} {} should not resolve",
                date,
                time
            );
        }
    }

    #[test]
    fn test_resolve_keeps_time_zone_of_now() {
        let nairobi = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = nairobi.with_ymd_and_hms(2023, 7, 21, 1, 0, 0).unwrap();
        let resolved = resolve(&TimeUnit::new("", "08:00:00"), &now).unwrap();

        assert_eq!(resolved, nairobi.with_ymd_and_hms(2023, 7, 21, 8, 0, 0).unwrap());
        assert_eq!(resolved.with_timezone(&Utc), at(2023, 7, 21, 5, 0, 0));
    }

    #[test]
    fn test_day_included() {
        // 2023-07-21 is a Friday
        let friday = at(2023, 7, 21, 12, 0, 0);
        assert!(day_included(&["Friday".to_string()], &friday));
        assert!(day_included(&["FRIDAY".to_string()], &friday));
        assert!(day_included(&["monday".to_string(), "friday".to_string()], &friday));
        assert!(!day_included(&["Monday".to_string()], &friday));
        assert!(!day_included(&[], &friday));
    }

    #[test]
    fn test_day_included_every_weekday() {
        // 2023-07-16 is a Sunday
        for (offset, name) in WEEKDAY_NAMES.iter().enumerate() {
            let day = at(2023, 7, 16 + offset as u32, 9, 0, 0);
            assert!(day_included(&[name.to_string()], &day), "{}", name);
            let other = WEEKDAY_NAMES[(offset + 1) % 7];
            assert!(!day_included(&[other.to_string()], &day), "{}", other);
        }
    }

    #[test]
    fn test_window_active_bounds_are_exclusive() {
        let window = unit(&[], TimeUnit::new("", "08:00:00"), TimeUnit::new("", "18:00:00"));

        assert!(window_active(&window, &at(2023, 7, 21, 12, 0, 0)));
        assert!(!window_active(&window, &at(2023, 7, 21, 8, 0, 0)));
        assert!(!window_active(&window, &at(2023, 7, 21, 18, 0, 0)));
        assert!(!window_active(&window, &at(2023, 7, 21, 19, 0, 0)));
    }

    #[test]
    fn test_window_active_respects_days() {
        let window = unit(
            &["Saturday", "Sunday"],
            TimeUnit::new("", "00:00:00"),
            TimeUnit::new("", "23:59:59"),
        );

        assert!(!window_active(&window, &at(2023, 7, 21, 12, 0, 0)));
        assert!(window_active(&window, &at(2023, 7, 22, 12, 0, 0)));
    }

    #[test]
    fn test_window_active_unparseable_boundary_is_inactive() {
        let window = unit(&[], TimeUnit::new("bogus", ""), TimeUnit::new("", "23:00:00"));
        assert!(!window_active(&window, &at(2023, 7, 21, 12, 0, 0)));
    }

    #[test]
    fn test_first_active_unit_picks_first_match() {
        let schedule = ScheduleSpec {
            schedule_units: vec![
                unit(&["Monday"], TimeUnit::new("", "00:00:00"), TimeUnit::new("", "23:00:00")),
                unit(&[], TimeUnit::new("", "10:00:00"), TimeUnit::new("", "14:00:00")),
                unit(&[], TimeUnit::new("", "11:00:00"), TimeUnit::new("", "13:00:00")),
            ],
        };

        assert_eq!(first_active_unit(&schedule, &at(2023, 7, 21, 12, 0, 0)), Some(1));
        assert_eq!(first_active_unit(&schedule, &at(2023, 7, 21, 20, 0, 0)), None);
    }
}
