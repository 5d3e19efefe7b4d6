//! Subcommand implementations

pub mod crds;
pub mod plan;
pub mod status;
pub mod validate;

use chrono::{DateTime, FixedOffset, Local};

/// Parse an RFC 3339 instant given on the command line
pub fn parse_instant(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| format!("expected an RFC 3339 timestamp such as 2024-03-01T22:00:00+01:00: {}", e))
}

/// The given instant, or now, in the local time zone.
///
/// Windows are resolved with the zone's rules for their own date, so a
/// boundary on the far side of a DST change gets that side's offset.
pub fn instant_or_now(at: Option<DateTime<FixedOffset>>) -> DateTime<Local> {
    at.map_or_else(Local::now, |at| at.with_timezone(&Local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use scheduler_lib::crd::TimeUnit;
    use scheduler_lib::window::resolve;

    #[test]
    fn test_parse_instant() {
        let at = parse_instant("2023-07-21T20:30:00+02:00").unwrap();
        assert_eq!(at.hour(), 20);
        assert_eq!(at.offset().local_minus_utc(), 2 * 3600);

        assert!(parse_instant("tonight").is_err());
    }

    #[test]
    fn test_instant_or_now_uses_local_zone_rules() {
        let at = parse_instant("2023-07-21T20:30:00+02:00").unwrap();
        let local = instant_or_now(Some(at));
        assert_eq!(local, at);

        // The noon boundary takes the offset in force at noon, not the
        // offset of the evaluation instant
        let noon = resolve(&TimeUnit::new("2023-03-26", "12:00:00"), &local).unwrap();
        let expected = Local
            .with_ymd_and_hms(2023, 3, 26, 12, 0, 0)
            .earliest()
            .unwrap();
        assert_eq!(noon, expected);
        assert_eq!(noon.offset(), expected.offset());
    }
}
