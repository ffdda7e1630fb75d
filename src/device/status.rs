use std::fmt;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::readings::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Online,
    Offline,
    Unknown,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusLabel::Online => "Online",
            StatusLabel::Offline => "Offline",
            StatusLabel::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub label: StatusLabel,
    pub online: bool,
}

impl DeviceStatus {
    pub const ONLINE: Self = Self { label: StatusLabel::Online, online: true };
    pub const OFFLINE: Self = Self { label: StatusLabel::Offline, online: false };
    pub const UNKNOWN: Self = Self { label: StatusLabel::Unknown, online: false };
}

/// Status from the freshest reading across every stream of a device.
///
/// No reading is `Unknown`. Only a reading dated more than `offline_after`
/// ago is `Offline`, so one exactly that old, or one whose timestamp does not
/// parse, counts as online.
pub fn derive_status(
    freshest: Option<&Reading>,
    now: DateTime<Utc>,
    offline_after: Duration,
) -> DeviceStatus {
    let Some(reading) = freshest else {
        return DeviceStatus::UNKNOWN;
    };
    match reading.at {
        Some(at) if now - at > offline_after => DeviceStatus::OFFLINE,
        _ => DeviceStatus::ONLINE,
    }
}

/// `"42s ago"`, `"5m ago"`, `"3h ago"`, `"2d ago"`. Future timestamps read
/// as `"0s ago"`.
pub fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// `"Jan 2, 2024, 10:00:00"` in the local time zone.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    format_timestamp_in(at, &Local)
}

pub fn format_timestamp_in<Tz>(at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.with_timezone(tz).format("%b %-d, %Y, %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::readings::ReadingType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn reading_at(at: DateTime<Utc>) -> Reading {
        Reading {
            reading_type: ReadingType::Ph,
            value: 6.5,
            timestamp: at.to_rfc3339(),
            at: Some(at),
        }
    }

    #[test]
    fn no_readings_is_unknown() {
        let status = derive_status(None, now(), Duration::hours(12));
        assert_eq!(status, DeviceStatus::UNKNOWN);
        assert!(!status.online);
    }

    #[test]
    fn thirteen_hours_old_is_offline() {
        let r = reading_at(now() - Duration::hours(13));
        assert_eq!(derive_status(Some(&r), now(), Duration::hours(12)), DeviceStatus::OFFLINE);
    }

    #[test]
    fn eleven_hours_old_is_online() {
        let r = reading_at(now() - Duration::hours(11));
        let status = derive_status(Some(&r), now(), Duration::hours(12));
        assert_eq!(status.label, StatusLabel::Online);
        assert!(status.online);
    }

    #[test]
    fn exactly_twelve_hours_is_still_online() {
        let r = reading_at(now() - Duration::hours(12));
        assert_eq!(derive_status(Some(&r), now(), Duration::hours(12)), DeviceStatus::ONLINE);

        let r = reading_at(now() - Duration::hours(12) - Duration::seconds(1));
        assert_eq!(derive_status(Some(&r), now(), Duration::hours(12)), DeviceStatus::OFFLINE);
    }

    #[test]
    fn undated_freshest_reading_is_online() {
        let r = Reading {
            reading_type: ReadingType::Ph,
            value: 6.5,
            timestamp: "not a date".into(),
            at: None,
        };
        assert_eq!(derive_status(Some(&r), now(), Duration::hours(12)), DeviceStatus::ONLINE);
    }

    #[test]
    fn time_ago_buckets() {
        assert_eq!(time_ago(now() - Duration::seconds(42), now()), "42s ago");
        assert_eq!(time_ago(now() - Duration::seconds(61), now()), "1m ago");
        assert_eq!(time_ago(now() - Duration::minutes(185), now()), "3h ago");
        assert_eq!(time_ago(now() - Duration::hours(49), now()), "2d ago");
        assert_eq!(time_ago(now() + Duration::minutes(5), now()), "0s ago");
    }

    #[test]
    fn timestamp_formatting() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 5, 9).unwrap();
        assert_eq!(format_timestamp_in(at, &Utc), "Jan 2, 2024, 00:05:09");

        let brisbane = FixedOffset::east_opt(10 * 3600).unwrap();
        assert_eq!(format_timestamp_in(at, &brisbane), "Jan 2, 2024, 10:05:09");
    }
}
