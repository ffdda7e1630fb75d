use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    api::{errors::ApiError, models::DeviceData},
    readings::{Reading, ReadingType},
};

/// Result of fetching one reading stream, tagged with the stream it was for.
#[derive(Debug)]
pub struct StreamOutcome {
    pub reading_type: ReadingType,
    pub result: Result<DeviceData, ApiError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamState {
    Loaded(DeviceData),
    /// User-facing failure message.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamData {
    pub reading_type: ReadingType,
    pub state: StreamState,
}

impl StreamData {
    pub fn readings(&self) -> &[Reading] {
        match &self.state {
            StreamState::Loaded(device) => &device.readings,
            StreamState::Failed(_) => &[],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MergeError {
    /// Every requested stream failed; per-stream messages are kept.
    #[error("Failed to load readings.")]
    AllStreamsFailed { failures: Vec<(ReadingType, String)> },
}

/// Readings of one device across several streams.
///
/// Streams stay separate for their own tiles and charts; only `last_updated`
/// looks across all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub node_id: String,
    /// In requested order.
    pub streams: Vec<StreamData>,
    /// Freshest reading across every loaded stream.
    pub last_updated: Option<Reading>,
}

impl DeviceSnapshot {
    /// First non-empty name reported by a loaded stream.
    pub fn node_name(&self) -> Option<&str> {
        self.streams.iter().find_map(|s| match &s.state {
            StreamState::Loaded(d) if !d.node_name.is_empty() => Some(d.node_name.as_str()),
            _ => None,
        })
    }

    pub fn paddock_id(&self) -> Option<i64> {
        self.streams.iter().find_map(|s| match &s.state {
            StreamState::Loaded(d) => d.paddock_id,
            StreamState::Failed(_) => None,
        })
    }

    pub fn stream(&self, reading_type: &ReadingType) -> Option<&StreamData> {
        self.streams.iter().find(|s| &s.reading_type == reading_type)
    }

    /// Empty for failed or unrequested streams.
    pub fn readings(&self, reading_type: &ReadingType) -> &[Reading] {
        self.stream(reading_type).map(StreamData::readings).unwrap_or(&[])
    }

    /// Value of the most recent reading of one stream.
    pub fn recent_value(&self, reading_type: &ReadingType) -> Option<f64> {
        latest(self.readings(reading_type)).map(|r| r.value)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ReadingType, &str)> {
        self.streams.iter().filter_map(|s| match &s.state {
            StreamState::Failed(message) => Some((&s.reading_type, message.as_str())),
            StreamState::Loaded(_) => None,
        })
    }
}

/// Most recent reading by left-to-right reduction.
///
/// Each step keeps the accumulator only if it is strictly newer than the next
/// element; equal or unparseable timestamps hand the win to the later
/// element. This is order dependent on ties, unlike a sort-based max.
pub fn latest<'a, I>(readings: I) -> Option<&'a Reading>
where
    I: IntoIterator<Item = &'a Reading>,
{
    readings
        .into_iter()
        .reduce(|acc, next| if acc.is_newer_than(next) { acc } else { next })
}

/// Combine independently fetched streams of `node_id`.
///
/// Succeeds if at least one stream loaded; an empty outcome list counts as
/// every stream failing.
pub fn merge(node_id: &str, outcomes: Vec<StreamOutcome>) -> Result<DeviceSnapshot, MergeError> {
    let streams: Vec<StreamData> = outcomes
        .into_iter()
        .map(|outcome| {
            let state = match outcome.result {
                Ok(device) => StreamState::Loaded(device),
                Err(e) => {
                    warn!(node_id = %node_id, reading_type = %outcome.reading_type, error = %e, "Reading stream failed");
                    StreamState::Failed(e.user_message().to_owned())
                }
            };
            StreamData {
                reading_type: outcome.reading_type,
                state,
            }
        })
        .collect();

    if !streams.iter().any(|s| matches!(s.state, StreamState::Loaded(_))) {
        let failures = streams
            .into_iter()
            .filter_map(|s| match s.state {
                StreamState::Failed(message) => Some((s.reading_type, message)),
                StreamState::Loaded(_) => None,
            })
            .collect();
        return Err(MergeError::AllStreamsFailed { failures });
    }

    let last_updated = latest(streams.iter().flat_map(StreamData::readings)).cloned();
    debug!(
        node_id = %node_id,
        streams = streams.len(),
        last_updated = last_updated.as_ref().map(|r| r.timestamp.as_str()).unwrap_or(""),
        "Merged reading streams"
    );

    Ok(DeviceSnapshot {
        node_id: node_id.to_owned(),
        streams,
        last_updated,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::readings::parse_timestamp;

    pub(crate) fn reading(reading_type: ReadingType, ts: &str, value: f64) -> Reading {
        Reading {
            reading_type,
            value,
            timestamp: ts.to_owned(),
            at: parse_timestamp(ts),
        }
    }

    pub(crate) fn device(name: &str, readings: Vec<Reading>) -> DeviceData {
        DeviceData {
            node_id: "node-1".into(),
            node_name: name.into(),
            paddock_id: Some(7),
            readings,
        }
    }

    pub(crate) fn rejected(message: &str) -> ApiError {
        ApiError::Rejected {
            endpoint: "/device/view".into(),
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[test]
    fn latest_of_empty_is_none() {
        assert!(latest(&[]).is_none());
    }

    #[test]
    fn latest_ignores_input_order() {
        let readings = vec![
            reading(ReadingType::Ph, "2024-01-02T00:00:00Z", 2.0),
            reading(ReadingType::Ph, "2024-01-03T00:00:00Z", 3.0),
            reading(ReadingType::Ph, "2024-01-01T00:00:00Z", 1.0),
        ];
        assert_eq!(latest(&readings).unwrap().value, 3.0);
    }

    #[test]
    fn latest_tie_goes_to_later_element() {
        let readings = vec![
            reading(ReadingType::Ph, "2024-01-01T10:00:00Z", 1.0),
            reading(ReadingType::Ph, "2024-01-01T10:00:00Z", 2.0),
        ];
        assert_eq!(latest(&readings).unwrap().value, 2.0);
    }

    #[test]
    fn latest_tie_across_offsets_still_goes_to_later_element() {
        let readings = vec![
            reading(ReadingType::Ph, "2024-01-01T20:00:00+10:00", 1.0),
            reading(ReadingType::Ph, "2024-01-01T10:00:00Z", 2.0),
        ];
        assert_eq!(latest(&readings).unwrap().value, 2.0);
    }

    #[test]
    fn partial_failure_keeps_loaded_stream() {
        let outcomes = vec![
            StreamOutcome {
                reading_type: ReadingType::Temperature,
                result: Err(rejected("Data type invalid")),
            },
            StreamOutcome {
                reading_type: ReadingType::Ph,
                result: Ok(device(
                    "North sensor",
                    vec![reading(ReadingType::Ph, "2024-01-01T00:00:00Z", 6.5)],
                )),
            },
        ];
        let snapshot = merge("node-1", outcomes).unwrap();

        assert_eq!(snapshot.node_name(), Some("North sensor"));
        assert_eq!(snapshot.paddock_id(), Some(7));
        assert_eq!(snapshot.recent_value(&ReadingType::Ph), Some(6.5));
        assert_eq!(snapshot.recent_value(&ReadingType::Temperature), None);
        assert!(snapshot.readings(&ReadingType::Temperature).is_empty());
        let failures: Vec<_> = snapshot.failures().collect();
        assert_eq!(failures, vec![(&ReadingType::Temperature, "Data type invalid")]);
    }

    #[test]
    fn all_streams_failing_is_an_error() {
        let outcomes = vec![
            StreamOutcome {
                reading_type: ReadingType::Temperature,
                result: Err(rejected("a")),
            },
            StreamOutcome {
                reading_type: ReadingType::Ph,
                result: Err(rejected("b")),
            },
        ];
        let err = merge("node-1", outcomes).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load readings.");
        let MergeError::AllStreamsFailed { failures } = err;
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1], (ReadingType::Ph, "b".to_owned()));
    }

    #[test]
    fn no_streams_is_an_error() {
        assert!(merge("node-1", Vec::new()).is_err());
    }

    #[test]
    fn last_updated_spans_all_streams() {
        let outcomes = vec![
            StreamOutcome {
                reading_type: ReadingType::Temperature,
                result: Ok(device(
                    "",
                    vec![
                        reading(ReadingType::Temperature, "2024-01-01T00:00:00Z", 20.0),
                        reading(ReadingType::Temperature, "2024-01-05T00:00:00Z", 21.0),
                    ],
                )),
            },
            StreamOutcome {
                reading_type: ReadingType::Ph,
                result: Ok(device(
                    "Sensor",
                    vec![reading(ReadingType::Ph, "2024-01-03T00:00:00Z", 6.5)],
                )),
            },
        ];
        let snapshot = merge("node-1", outcomes).unwrap();
        let last = snapshot.last_updated.as_ref().unwrap();
        assert_eq!(last.timestamp, "2024-01-05T00:00:00Z");
        // First stream has no name, so the second one's is used.
        assert_eq!(snapshot.node_name(), Some("Sensor"));
    }

    #[test]
    fn loaded_streams_without_readings_have_no_last_updated() {
        let outcomes = vec![StreamOutcome {
            reading_type: ReadingType::Ph,
            result: Ok(device("", Vec::new())),
        }];
        let snapshot = merge("node-1", outcomes).unwrap();
        assert!(snapshot.last_updated.is_none());
        assert_eq!(snapshot.node_name(), None);
    }

    #[test]
    fn recent_value_may_be_nan() {
        let outcomes = vec![StreamOutcome {
            reading_type: ReadingType::Ph,
            result: Ok(device(
                "",
                vec![reading(ReadingType::Ph, "2024-01-01T00:00:00Z", f64::NAN)],
            )),
        }];
        let snapshot = merge("node-1", outcomes).unwrap();
        assert!(snapshot.recent_value(&ReadingType::Ph).unwrap().is_nan());
    }
}
