//! Turns fetched data into the values the dashboard displays.
//!
//! Everything here is computed once per data update and is pure; rendering
//! (chart, map, terminal) only reads the results.

pub mod chart;
pub mod csv;
pub mod tables;

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::{
    device::{
        merge::DeviceSnapshot,
        status::{derive_status, format_timestamp, time_ago, DeviceStatus},
    },
    readings::ReadingType,
};

use self::chart::ChartSeries;

/// Text form of a reading value. Non-finite values print as `NaN`,
/// `Infinity` and `-Infinity`; finite ones use `decimals` places, or the
/// shortest round-trip form when `None`.
pub fn format_value(value: f64, decimals: Option<usize>) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    match decimals {
        Some(places) => format!("{value:.places$}"),
        None => value.to_string(),
    }
}

/// Map position used until devices report coordinates.
pub const DEFAULT_MARKER_POSITION: (f64, f64) = (51.505, -0.09);

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub lat: f64,
    pub lng: f64,
    pub label: String,
}

/// Latest-value tile of one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingTile {
    pub reading_type: ReadingType,
    pub label: String,
    /// One decimal, or `"--"` when the stream has no value.
    pub value: String,
    pub unit: &'static str,
}

impl ReadingTile {
    fn new(reading_type: &ReadingType, value: Option<f64>) -> Self {
        Self {
            reading_type: reading_type.clone(),
            label: reading_type.label(),
            value: value.map_or_else(|| "--".to_owned(), |v| format_value(v, Some(1))),
            unit: reading_type.unit(),
        }
    }
}

impl fmt::Display for ReadingTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == "--" || self.unit.is_empty() {
            write!(f, "{}: {}", self.label, self.value)
        } else {
            write!(f, "{}: {} {}", self.label, self.value, self.unit)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastUpdated {
    /// `None` when the timestamp did not parse.
    pub ago: Option<String>,
    pub formatted: String,
}

/// Everything the device view shows for one loaded device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDashboard {
    pub snapshot: DeviceSnapshot,
    pub status: DeviceStatus,
    pub last_updated: Option<LastUpdated>,
    pub tiles: Vec<ReadingTile>,
    pub marker: MapMarker,
    selected: ReadingType,
}

impl DeviceDashboard {
    /// `selected` falls back to the first stream when absent or not part of
    /// the snapshot.
    pub fn build(
        snapshot: DeviceSnapshot,
        now: DateTime<Utc>,
        offline_after: Duration,
        selected: Option<ReadingType>,
    ) -> Self {
        let status = derive_status(snapshot.last_updated.as_ref(), now, offline_after);
        let last_updated = snapshot.last_updated.as_ref().map(|r| match r.at {
            Some(at) => LastUpdated {
                ago: Some(time_ago(at, now)),
                formatted: format_timestamp(at),
            },
            None => LastUpdated {
                ago: None,
                formatted: r.timestamp.clone(),
            },
        });
        let tiles = snapshot
            .streams
            .iter()
            .map(|s| ReadingTile::new(&s.reading_type, snapshot.recent_value(&s.reading_type)))
            .collect();

        let label = match snapshot.node_name() {
            Some(name) => name.to_owned(),
            None if !snapshot.node_id.is_empty() => snapshot.node_id.clone(),
            None => "Device".to_owned(),
        };
        let (lat, lng) = DEFAULT_MARKER_POSITION;

        let selected = selected
            .filter(|rt| snapshot.stream(rt).is_some())
            .or_else(|| snapshot.streams.first().map(|s| s.reading_type.clone()))
            .unwrap_or(ReadingType::Temperature);

        Self {
            snapshot,
            status,
            last_updated,
            tiles,
            marker: MapMarker { lat, lng, label },
            selected,
        }
    }

    pub fn title(&self) -> &str {
        &self.marker.label
    }

    pub fn selected(&self) -> &ReadingType {
        &self.selected
    }

    /// Switch the chart and export to another loaded stream. Returns `false`
    /// and keeps the current selection for streams the snapshot lacks.
    pub fn select(&mut self, reading_type: ReadingType) -> bool {
        if self.snapshot.stream(&reading_type).is_none() {
            return false;
        }
        self.selected = reading_type;
        true
    }

    pub fn chart(&self) -> ChartSeries {
        ChartSeries::from_readings(&self.selected, self.snapshot.readings(&self.selected))
    }

    /// CSV of the selected stream, `None` when it has no readings.
    pub fn csv(&self) -> Option<String> {
        csv::export(self.snapshot.readings(&self.selected))
    }

    pub fn export_file_name(&self) -> String {
        csv::export_file_name(&self.snapshot.node_id, &self.selected)
    }
}

impl fmt::Display for DeviceDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.title(), self.snapshot.node_id)?;
        writeln!(f, "Status: {}", self.status.label)?;
        if let Some(paddock_id) = self.snapshot.paddock_id() {
            writeln!(f, "Paddock: {paddock_id}")?;
        }
        match &self.last_updated {
            Some(LastUpdated { ago: Some(ago), formatted }) => {
                writeln!(f, "Last updated: {ago} ({formatted})")?
            }
            Some(LastUpdated { ago: None, formatted }) => writeln!(f, "Last updated: {formatted}")?,
            None => writeln!(f, "Last updated: never")?,
        }
        for tile in &self.tiles {
            writeln!(f, "  {tile}")?;
        }
        for (reading_type, message) in self.snapshot.failures() {
            writeln!(f, "  {} unavailable: {message}", reading_type.label())?;
        }
        writeln!(
            f,
            "Location: {:.3}, {:.3} ({})",
            self.marker.lat, self.marker.lng, self.marker.label
        )?;
        write!(f, "{}", self.chart())
    }
}
