use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

use crate::readings::ReadingType;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the farm API, without a trailing slash.
    pub api_base_url: String,
    /// File holding the bearer token between invocations.
    pub session_file: PathBuf,
    /// Token supplied out-of-band; wins over `session_file`.
    pub api_token: Option<String>,
    /// Reading streams fetched for the device view, in display order.
    /// Format: `"temperature,ph"`.
    pub reading_streams: Vec<ReadingType>,
    /// A device whose freshest reading is older than this is offline.
    /// Set in whole hours through `OFFLINE_AFTER_HOURS`.
    pub offline_after: chrono::Duration,
    /// Per-request timeout in seconds. `0` disables it.
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_base_url(&optional("FARM_API_URL", "http://localhost:8000")),
            session_file: optional("FARM_SESSION_FILE", ".farm_session").into(),
            api_token: std::env::var("FARM_API_TOKEN")
                .ok()
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
            reading_streams: parse_reading_streams(&optional("READING_STREAMS", "temperature,ph"))?,
            offline_after: parse_offline_after(&optional("OFFLINE_AFTER_HOURS", "12"))?,
            request_timeout_secs: optional("REQUEST_TIMEOUT_SECS", "30")
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a non-negative integer")?,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Strip trailing slashes so paths can be appended with a leading `/`.
fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

/// Parse `"temperature,ph"` into an ordered, de-duplicated list of streams.
fn parse_reading_streams(raw: &str) -> Result<Vec<ReadingType>> {
    let mut streams: Vec<ReadingType> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let stream: ReadingType = entry.parse()?;
        if !streams.contains(&stream) {
            streams.push(stream);
        }
    }
    if streams.is_empty() {
        bail!("READING_STREAMS must name at least one reading type");
    }
    Ok(streams)
}

fn parse_offline_after(raw: &str) -> Result<chrono::Duration> {
    let hours: i64 = raw
        .trim()
        .parse()
        .context("OFFLINE_AFTER_HOURS must be an integer number of hours")?;
    if hours < 0 {
        bail!("OFFLINE_AFTER_HOURS must not be negative");
    }
    chrono::Duration::try_hours(hours).context("OFFLINE_AFTER_HOURS is out of range")
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        assert_eq!(normalize_base_url("http://farm.local/api//"), "http://farm.local/api");
        assert_eq!(normalize_base_url(" http://localhost:8000 "), "http://localhost:8000");
    }

    #[test]
    fn reading_streams_keep_order() {
        let streams = parse_reading_streams("ph, temperature").unwrap();
        assert_eq!(streams, vec![ReadingType::Ph, ReadingType::Temperature]);
    }

    #[test]
    fn reading_streams_drop_duplicates_and_blanks() {
        let streams = parse_reading_streams("moisture,,moisture,ph").unwrap();
        assert_eq!(streams, vec![ReadingType::Moisture, ReadingType::Ph]);
    }

    #[test]
    fn reading_streams_accept_unlisted_types() {
        let streams = parse_reading_streams("salinity").unwrap();
        assert_eq!(streams, vec![ReadingType::Other("salinity".to_owned())]);
    }

    #[test]
    fn reading_streams_empty_errors() {
        let err = parse_reading_streams(" , ").unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = Config {
            api_base_url: "http://localhost:8000".into(),
            session_file: ".farm_session".into(),
            api_token: None,
            reading_streams: vec![ReadingType::Temperature],
            offline_after: chrono::Duration::hours(12),
            request_timeout_secs: 0,
        };
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn offline_after_is_whole_hours() {
        assert_eq!(parse_offline_after(" 12 ").unwrap(), chrono::Duration::hours(12));
        assert_eq!(parse_offline_after("0").unwrap(), chrono::Duration::zero());
    }

    #[test]
    fn offline_after_rejects_bad_values() {
        let err = parse_offline_after("10000000000000000").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let err = parse_offline_after("-1").unwrap_err();
        assert!(err.to_string().contains("must not be negative"));

        let err = parse_offline_after("12h").unwrap_err();
        assert!(err.to_string().contains("integer number of hours"));
    }
}
