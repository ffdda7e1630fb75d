use std::{fmt, str::FromStr};

use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sensor stream reported by a device node.
///
/// Wire form is the lowercase snake_case name used in
/// `GET /device/view/{node_id}/{reading_type}` and in sensor-average keys.
/// Types the dashboard has no presentation for are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReadingType {
    Temperature,
    Ph,
    Moisture,
    Humidity,
    Nitrogen,
    Phosphorus,
    Potassium,
    Other(String),
}

impl ReadingType {
    pub fn as_str(&self) -> &str {
        match self {
            ReadingType::Temperature => "temperature",
            ReadingType::Ph => "ph",
            ReadingType::Moisture => "moisture",
            ReadingType::Humidity => "humidity",
            ReadingType::Nitrogen => "nitrogen",
            ReadingType::Phosphorus => "phosphorus",
            ReadingType::Potassium => "potassium",
            ReadingType::Other(name) => name,
        }
    }

    /// Human label, e.g. `"pH"` or `"Soil Salinity"` for `soil_salinity`.
    pub fn label(&self) -> String {
        match self {
            ReadingType::Ph => "pH".to_owned(),
            other => title_case(other.as_str()),
        }
    }

    /// Unit suffix shown next to a value. Empty for dimensionless readings.
    pub fn unit(&self) -> &'static str {
        match self {
            ReadingType::Temperature => "°C",
            ReadingType::Moisture | ReadingType::Humidity => "%",
            ReadingType::Nitrogen | ReadingType::Phosphorus | ReadingType::Potassium => "ppm",
            ReadingType::Ph | ReadingType::Other(_) => "",
        }
    }

    pub fn chart_title(&self) -> String {
        format!("{} Levels", self.label())
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Ok(match key.as_str() {
            "" => bail!("reading type must not be empty"),
            "temperature" => Self::Temperature,
            "ph" => Self::Ph,
            "moisture" => Self::Moisture,
            "humidity" => Self::Humidity,
            "nitrogen" => Self::Nitrogen,
            "phosphorus" => Self::Phosphorus,
            "potassium" => Self::Potassium,
            _ => Self::Other(key),
        })
    }
}

impl TryFrom<String> for ReadingType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> anyhow::Result<Self> {
        value.parse()
    }
}

impl From<ReadingType> for String {
    fn from(value: ReadingType) -> Self {
        value.as_str().to_owned()
    }
}

/// `"soil_moisture"` → `"Soil Moisture"`.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// A reading exactly as the server sends it. `reading_val` has been observed
/// as both a JSON number and a numeric string.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawReading {
    #[serde(default)]
    pub reading_type: Option<String>,
    #[serde(default)]
    pub reading_val: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Normalized record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub reading_type: ReadingType,
    /// May be NaN when the server value was not numeric.
    pub value: f64,
    /// Timestamp string as received.
    pub timestamp: String,
    /// Parsed timestamp, `None` if it could not be read.
    pub at: Option<DateTime<Utc>>,
}

impl Reading {
    /// `true` only if both timestamps parse and `self` is strictly later.
    pub fn is_newer_than(&self, other: &Reading) -> bool {
        match (self.at, other.at) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }
}

/// Convert a wire record into a `Reading`.
///
/// `fallback_type` is used when the record carries no `reading_type`, which
/// happens when the server omits it on single-type responses.
pub fn normalize(raw: &RawReading, fallback_type: &ReadingType) -> Reading {
    let reading_type = raw
        .reading_type
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or_else(|| fallback_type.clone());

    Reading {
        reading_type,
        value: coerce_value(raw.reading_val.as_ref()),
        timestamp: raw.timestamp.clone(),
        at: parse_timestamp(&raw.timestamp),
    }
}

/// Numeric coercion of a JSON value.
///
/// | input           | result |
/// |-----------------|--------|
/// | number          | itself |
/// | `"5.5"`         | 5.5    |
/// | `""` / `"  "`   | 0      |
/// | `"abc"`         | NaN    |
/// | `true`/`false`  | 1 / 0  |
/// | `null`          | 0      |
/// | absent          | NaN    |
pub fn coerce_value(value: Option<&serde_json::Value>) -> f64 {
    use serde_json::Value;

    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_numeric_str(s),
        Some(Value::Array(_) | Value::Object(_)) => f64::NAN,
    }
}

fn parse_numeric_str(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf"/"nan" spellings; only plain decimals count here.
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => f64::NAN,
    }
}

/// RFC 3339 timestamps, plus naive date-times and dates which are read as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
