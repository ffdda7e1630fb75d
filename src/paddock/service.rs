use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{models::PaddockDetail, ApiClient},
    present::tables::{paddock_display_name, AveragesPanel, DeviceRow, NO_SENSOR_DATA},
    session::Session,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaddockViewError {
    #[error("You must be logged in.")]
    NotLoggedIn,
    /// The device list is the page; without it there is nothing to show.
    #[error("{0}")]
    Devices(String),
}

/// Everything the paddock page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddockView {
    pub paddock_id: i64,
    pub title: String,
    pub detail: Option<PaddockDetail>,
    pub devices: Vec<DeviceRow>,
    /// A failed averages request only affects its own section.
    pub averages: Result<AveragesPanel, String>,
}

/// Devices, sensor averages and paddock details are requested concurrently.
pub async fn load_paddock_view(
    client: &ApiClient,
    session: Option<&Session>,
    paddock_id: i64,
) -> Result<PaddockView, PaddockViewError> {
    let session = session.ok_or(PaddockViewError::NotLoggedIn)?;

    let (devices, averages, detail) = tokio::join!(
        client.get_paddock_devices(session, paddock_id),
        client.get_paddock_sensor_averages(session, paddock_id),
        client.get_paddock(session, paddock_id),
    );

    let devices = devices.map_err(|e| PaddockViewError::Devices(e.user_message().to_owned()))?;
    let averages = averages
        .map(|a| AveragesPanel::from(&a))
        .map_err(|e| e.user_message().to_owned());
    let detail = detail
        .inspect_err(|e| warn!(paddock_id, error = %e, "Paddock details unavailable"))
        .ok();

    let title = match &detail {
        Some(d) => paddock_display_name(d.paddock_name.as_deref()),
        None => format!("Paddock {paddock_id}"),
    };
    info!(paddock_id, devices = devices.len(), "Paddock view ready");

    Ok(PaddockView {
        paddock_id,
        title,
        detail,
        devices: devices.iter().map(DeviceRow::from).collect(),
        averages,
    })
}

impl fmt::Display for PaddockView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (#{})", self.title, self.paddock_id)?;
        if let Some(detail) = &self.detail {
            if let Some(crop) = &detail.crop_type {
                writeln!(f, "Crop: {crop}")?;
            }
            if let Some(area) = detail.area {
                writeln!(f, "Area: {area}")?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Devices")?;
        if self.devices.is_empty() {
            writeln!(f, "  No devices in this paddock.")?;
        }
        for row in &self.devices {
            writeln!(f, "  {row}")?;
        }

        writeln!(f)?;
        writeln!(f, "Sensor averages")?;
        match &self.averages {
            Ok(panel) if panel.is_empty() => write!(f, "  {NO_SENSOR_DATA}"),
            Ok(panel) => write!(f, "{panel}"),
            Err(message) => write!(f, "  {message}"),
        }
    }
}
