use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::readings::{Reading, RawReading};

// ---------------------------------------------------------------------------
// Response bodies
//
// Every endpoint answers with a flat JSON object:
//
// Success:
//   { "success": true, "message": "...", <payload fields> }
//
// Failure:
//   { "success": false, "message": "..." }        application error
//   { "detail": "..." }                           framework error (auth, 422)
//
// `success` is sometimes absent on success bodies, so only an explicit
// `false` is treated as a failure.
// ---------------------------------------------------------------------------

// ---------------------------------------------------------------------------
// Auth: POST /auth/login, /auth/register, /auth/reset-password-*,
//       GET|PATCH /auth/settings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub message: Option<String>,
    pub data: LoginData,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub access_token: String,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    /// Email address.
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetConfirm<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<UserSettings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub alerts_enabled: bool,
}

// ---------------------------------------------------------------------------
// Device: GET /device/view/{node_id}/{reading_type}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DeviceDataBody {
    pub node_id: String,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub paddock_id: Option<i64>,
    #[serde(default)]
    pub readings: Option<Vec<RawReading>>,
}

/// One device with the readings of a single stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceData {
    pub node_id: String,
    /// Empty when the device has never been named.
    pub node_name: String,
    pub paddock_id: Option<i64>,
    pub readings: Vec<Reading>,
}

// ---------------------------------------------------------------------------
// Device: POST /device/register,  PATCH /device/unlink/{node_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegisterDeviceRequest {
    pub node_id: String,
    /// The server generates `Device-N` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub paddock_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceBody {
    #[serde(default)]
    pub message: Option<String>,
    pub node: RegisteredNode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredNode {
    pub node_id: String,
    #[serde(default)]
    pub node_name: Option<String>,
    pub paddock_id: i64,
}

/// Body shared by endpoints that only report an outcome.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Paddock: /paddock/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paddock {
    pub paddock_id: i64,
    /// `None` is a valid state: the paddock was never named.
    #[serde(default)]
    pub paddock_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaddockListBody {
    #[serde(default)]
    pub paddocks: Vec<Paddock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaddockDetail {
    pub paddock_id: i64,
    #[serde(default)]
    pub paddock_name: Option<String>,
    #[serde(default)]
    pub crop_type: Option<String>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaddockDetailBody {
    pub paddock: PaddockDetail,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaddockBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub paddock: Option<PaddockDetail>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaddockDevice {
    pub node_id: String,
    #[serde(default)]
    pub node_name: Option<String>,
    /// Percent, when the node reports it.
    #[serde(default)]
    pub battery: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PaddockDevicesBody {
    #[serde(default)]
    pub devices: Vec<PaddockDevice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorDetail {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: u32,
}

/// Averages of the most recent reading of each sensor type across the nodes
/// of a paddock. Keys are wire reading-type names.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SensorAverages {
    #[serde(default)]
    pub paddock_id: Option<i64>,
    #[serde(default)]
    pub paddock_name: Option<String>,
    #[serde(default)]
    pub nodes_count: u32,
    #[serde(default)]
    pub nodes_with_readings: u32,
    #[serde(default)]
    pub sensor_averages: BTreeMap<String, f64>,
    #[serde(default)]
    pub sensor_details: BTreeMap<String, SensorDetail>,
}

/// Crop planted in a paddock. The wire names are the dashboard's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropType {
    #[default]
    #[serde(rename = "default")]
    Default,
    Grains,
    Legumes,
    Fruit,
    #[serde(rename = "Oil Seeds")]
    OilSeeds,
    #[serde(rename = "Root Crops")]
    RootCrops,
    Tropical,
    Other,
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CropType::Default => "default",
            CropType::Grains => "Grains",
            CropType::Legumes => "Legumes",
            CropType::Fruit => "Fruit",
            CropType::OilSeeds => "Oil Seeds",
            CropType::RootCrops => "Root Crops",
            CropType::Tropical => "Tropical",
            CropType::Other => "Other",
        };
        f.write_str(s)
    }
}

impl FromStr for CropType {
    type Err = anyhow::Error;

    /// Accepts the wire label in any case, with `-`/`_` for the space.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Ok(match key.as_str() {
            "default" => Self::Default,
            "grains" => Self::Grains,
            "legumes" => Self::Legumes,
            "fruit" => Self::Fruit,
            "oil seeds" => Self::OilSeeds,
            "root crops" => Self::RootCrops,
            "tropical" => Self::Tropical,
            "other" => Self::Other,
            other => bail!("unknown crop type: {other:?}"),
        })
    }
}

/// Request body for `POST /paddock/create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePaddockRequest {
    /// The server generates `Paddock-N` when `None`.
    pub paddock_name: Option<String>,
    pub crop_type: CropType,
    /// Hectares.
    pub area: Option<i64>,
    pub date_plant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,
}

impl CreatePaddockRequest {
    /// Builds the request from form input. `area` keeps its leading integer,
    /// so `"12.5"` sends `12` and `"7ha"` sends `7`; input with no leading
    /// digits is sent as `null`.
    pub fn from_form(
        paddock_name: Option<&str>,
        crop_type: CropType,
        area: &str,
        plant_date: &str,
        soil_type: Option<&str>,
    ) -> Self {
        let blank_to_none = |s: Option<&str>| {
            s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
        };
        Self {
            paddock_name: blank_to_none(paddock_name),
            crop_type,
            area: leading_integer(area),
            date_plant: plant_date.trim().to_owned(),
            soil_type: blank_to_none(soil_type),
        }
    }
}

/// Optional sign then digits after leading whitespace, ignoring the rest.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let end = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_start);
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

/// Request body for `PATCH /paddock/{paddock_id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePaddockRequest {
    pub paddock_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<CropType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
}
