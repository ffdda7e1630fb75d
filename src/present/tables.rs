use std::fmt;

use crate::{
    api::models::{Paddock, PaddockDevice, SensorAverages},
    readings::ReadingType,
};

pub const NO_SENSOR_DATA: &str = "No sensor data available for this zone.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    Good,
    Warning,
    Low,
    Unknown,
}

impl BatteryLevel {
    /// Above 60 is good, above 30 a warning, anything else low.
    pub fn from_percent(percent: Option<f64>) -> Self {
        match percent {
            Some(p) if p > 60.0 => BatteryLevel::Good,
            Some(p) if p > 30.0 => BatteryLevel::Warning,
            Some(_) => BatteryLevel::Low,
            None => BatteryLevel::Unknown,
        }
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatteryLevel::Good => "Good",
            BatteryLevel::Warning => "Warning",
            BatteryLevel::Low => "Low",
            BatteryLevel::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRow {
    pub node_id: String,
    pub name: String,
    /// `"85%"`, or `"--"` when not reported.
    pub battery: String,
    pub level: BatteryLevel,
}

impl From<&PaddockDevice> for DeviceRow {
    fn from(device: &PaddockDevice) -> Self {
        let name = match device.node_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_owned(),
            _ => format!("Device {}", device.node_id),
        };
        Self {
            node_id: device.node_id.clone(),
            name,
            battery: device
                .battery
                .map_or_else(|| "--".to_owned(), |b| format!("{b:.0}%")),
            level: BatteryLevel::from_percent(device.battery),
        }
    }
}

impl fmt::Display for DeviceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<24} {:<20} {:>5} {}", self.node_id, self.name, self.battery, self.level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaddockRow {
    pub paddock_id: i64,
    pub name: String,
}

impl From<&Paddock> for PaddockRow {
    fn from(paddock: &Paddock) -> Self {
        Self {
            paddock_id: paddock.paddock_id,
            name: paddock_display_name(paddock.paddock_name.as_deref()),
        }
    }
}

impl fmt::Display for PaddockRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6}  {}", self.paddock_id, self.name)
    }
}

pub fn paddock_display_name(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_owned(),
        _ => "Unnamed paddock".to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AverageTile {
    pub label: String,
    /// Two decimals.
    pub value: String,
    pub unit: &'static str,
}

impl fmt::Display for AverageTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}: {}", self.label, self.value)
        } else {
            write!(f, "{}: {} {}", self.label, self.value, self.unit)
        }
    }
}

/// Sensor averages section of the paddock view.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragesPanel {
    pub tiles: Vec<AverageTile>,
    pub reporting: String,
}

impl AveragesPanel {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl From<&SensorAverages> for AveragesPanel {
    fn from(averages: &SensorAverages) -> Self {
        let tiles = averages
            .sensor_averages
            .iter()
            .map(|(key, value)| {
                let (label, unit) = match key.parse::<ReadingType>() {
                    Ok(rt) => (rt.label(), rt.unit()),
                    Err(_) => (key.clone(), ""),
                };
                AverageTile {
                    label,
                    value: format!("{value:.2}"),
                    unit,
                }
            })
            .collect();
        Self {
            tiles,
            reporting: format!(
                "{} of {} devices reporting",
                averages.nodes_with_readings, averages.nodes_count
            ),
        }
    }
}

impl fmt::Display for AveragesPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tiles.is_empty() {
            return write!(f, "{NO_SENSOR_DATA}");
        }
        for tile in &self.tiles {
            writeln!(f, "  {tile}")?;
        }
        write!(f, "{}", self.reporting)
    }
}
