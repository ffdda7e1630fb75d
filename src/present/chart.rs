use std::fmt;

use crate::readings::{Reading, ReadingType};

use super::format_value;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Raw server timestamp; the chart parses it.
    pub x: String,
    pub y: f64,
}

/// Line series for one stream, in the order the server returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub title: String,
    pub unit: &'static str,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn from_readings(reading_type: &ReadingType, readings: &[Reading]) -> Self {
        Self {
            title: reading_type.chart_title(),
            unit: reading_type.unit(),
            points: readings
                .iter()
                .map(|r| ChartPoint {
                    x: r.timestamp.clone(),
                    y: r.value,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl fmt::Display for ChartSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if self.is_empty() {
            return writeln!(f, "  (no data)");
        }
        for point in &self.points {
            writeln!(f, "  {}  {}", point.x, format_value(point.y, None))?;
        }
        Ok(())
    }
}
