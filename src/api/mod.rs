pub mod errors;
pub mod models;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    readings::{normalize, ReadingType},
    session::Session,
};

use self::{
    errors::ApiError,
    models::{
        CreatePaddockRequest, DeviceData, DeviceDataBody, LoginBody, MessageBody, Paddock,
        PaddockDetail, PaddockDetailBody, PaddockDevice, PaddockDevicesBody, PaddockListBody,
        PasswordResetConfirm, PasswordResetRequest, RegisterDeviceBody, RegisterDeviceRequest,
        RegisteredNode, SensorAverages, SettingsBody, SignupRequest, UpdatePaddockBody,
        UpdatePaddockRequest, UserSettings,
    },
};

/// Body keys searched for a failure message, in order.
const MESSAGE_FIRST: &[&str] = &["message", "detail"];
/// The account endpoints report validation problems in `detail`.
const DETAIL_FIRST: &[&str] = &["detail", "message"];

/// Client for the farm API.
///
/// Every operation performs exactly one request and never retries. Cloning
/// is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Self::with_client(http, &config.api_base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("FARM_API_URL is not a valid URL: {base_url:?}"))?;
        if base_url.cannot_be_a_base() {
            bail!("FARM_API_URL cannot be used as a base URL: {base_url}");
        }
        Ok(Self {
            inner: Arc::new(Inner { http, base_url }),
        })
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Exchange credentials for a session. The endpoint expects an OAuth2
    /// password form, not JSON.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let url = self.url(&["auth", "login"]);
        debug!(url = %url, "Logging in");
        let request = self
            .inner
            .http
            .post(url.clone())
            .form(&[("username", email), ("password", password)]);

        let body: LoginBody = self.execute(request, url.path(), "Login failed").await?;
        info!(message = body.message.as_deref().unwrap_or(""), "Logged in");
        Ok(Session::new(body.data.access_token))
    }

    /// Create an account. The user id is the email address.
    pub async fn signup(&self, signup: &SignupRequest) -> Result<String, ApiError> {
        let url = self.url(&["auth", "register"]);
        debug!(url = %url, "Signing up");
        let request = self.inner.http.post(url.clone()).json(signup);
        let body: MessageBody = self
            .execute_with(request, url.path(), "Signup failed", DETAIL_FIRST)
            .await?;
        Ok(body
            .message
            .unwrap_or_else(|| "User successfully created".to_owned()))
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<String, ApiError> {
        let url = self.url(&["auth", "reset-password-request"]);
        let request = self
            .inner
            .http
            .post(url.clone())
            .json(&PasswordResetRequest { email });
        let body: MessageBody = self
            .execute_with(
                request,
                url.path(),
                "Unable to process your request right now.",
                DETAIL_FIRST,
            )
            .await?;
        Ok(body
            .message
            .unwrap_or_else(|| "If an account exists, a reset link has been sent.".to_owned()))
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let url = self.url(&["auth", "reset-password-confirm"]);
        let request = self
            .inner
            .http
            .post(url.clone())
            .json(&PasswordResetConfirm { token, new_password });
        let body: MessageBody = self
            .execute_with(request, url.path(), "Failed to reset password.", DETAIL_FIRST)
            .await?;
        Ok(body.message.unwrap_or_else(|| {
            "Password has been reset successfully. You can now login.".to_owned()
        }))
    }

    pub async fn get_settings(&self, session: &Session) -> Result<UserSettings, ApiError> {
        let url = self.url(&["auth", "settings"]);
        let request = self.authed(Method::GET, url.clone(), session);
        let body: SettingsBody = self
            .execute(request, url.path(), "Failed to load settings")
            .await?;
        Ok(body.data.unwrap_or_default())
    }

    pub async fn update_settings(
        &self,
        session: &Session,
        alerts_enabled: bool,
    ) -> Result<UserSettings, ApiError> {
        let url = self.url(&["auth", "settings"]);
        let request = self
            .authed(Method::PATCH, url.clone(), session)
            .json(&UserSettings { alerts_enabled });
        let body: SettingsBody = self
            .execute(request, url.path(), "Failed to update settings")
            .await?;
        if let Some(message) = &body.message {
            info!(message = %message, "Settings updated");
        }
        Ok(body.data.unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// Fetch one reading stream of a device, normalized.
    pub async fn get_device_data(
        &self,
        session: &Session,
        node_id: &str,
        reading_type: &ReadingType,
    ) -> Result<DeviceData, ApiError> {
        let url = self.url(&["device", "view", node_id, reading_type.as_str()]);
        debug!(node_id = %node_id, reading_type = %reading_type, "Fetching device data");
        let request = self.authed(Method::GET, url.clone(), session);
        let body: DeviceDataBody = self
            .execute(request, url.path(), "Failed to fetch device data")
            .await?;

        let readings = body
            .readings
            .unwrap_or_default()
            .iter()
            .map(|raw| normalize(raw, reading_type))
            .collect::<Vec<_>>();
        debug!(node_id = %node_id, reading_type = %reading_type, count = readings.len(), "Device data fetched");

        Ok(DeviceData {
            node_id: body.node_id,
            node_name: body.node_name.unwrap_or_default(),
            paddock_id: body.paddock_id,
            readings,
        })
    }

    /// Link an unclaimed device to the signed-in user and a paddock.
    pub async fn register_device(
        &self,
        session: &Session,
        device: &RegisterDeviceRequest,
    ) -> Result<RegisteredNode, ApiError> {
        let url = self.url(&["device", "register"]);
        debug!(node_id = %device.node_id, paddock_id = device.paddock_id, "Registering device");
        let request = self.authed(Method::POST, url.clone(), session).json(device);
        let body: RegisterDeviceBody = self
            .execute(request, url.path(), "Failed to update device")
            .await?;
        info!(
            node_id = %body.node.node_id,
            message = body.message.as_deref().unwrap_or("Device updated successfully"),
            "Device registered"
        );
        Ok(body.node)
    }

    pub async fn unlink_device(&self, session: &Session, node_id: &str) -> Result<String, ApiError> {
        let url = self.url(&["device", "unlink", node_id]);
        let request = self.authed(Method::PATCH, url.clone(), session);
        let body: MessageBody = self
            .execute(request, url.path(), "Failed to unlink device")
            .await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Device unlinked successfully".to_owned()))
    }

    // -----------------------------------------------------------------------
    // Paddocks
    // -----------------------------------------------------------------------

    pub async fn list_paddocks(&self, session: &Session) -> Result<Vec<Paddock>, ApiError> {
        let url = self.url(&["paddock", "list"]);
        let request = self.authed(Method::GET, url.clone(), session);
        let body: PaddockListBody = self
            .execute(request, url.path(), "Failed to fetch paddocks")
            .await?;
        Ok(body.paddocks)
    }

    pub async fn get_paddock(
        &self,
        session: &Session,
        paddock_id: i64,
    ) -> Result<PaddockDetail, ApiError> {
        let id = paddock_id.to_string();
        let url = self.url(&["paddock", &id]);
        let request = self.authed(Method::GET, url.clone(), session);
        let body: PaddockDetailBody = self
            .execute(request, url.path(), "Failed to retrieve paddock")
            .await?;
        Ok(body.paddock)
    }

    /// Fails without a request when the plant date is blank.
    pub async fn create_paddock(
        &self,
        session: &Session,
        paddock: &CreatePaddockRequest,
    ) -> Result<String, ApiError> {
        if paddock.date_plant.trim().is_empty() {
            return Err(ApiError::Invalid("Plant date is required".to_owned()));
        }

        let url = self.url(&["paddock", "create"]);
        let request = self.authed(Method::POST, url.clone(), session).json(paddock);
        let body: MessageBody = self
            .execute(request, url.path(), "Failed to create paddock")
            .await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Paddock created successfully".to_owned()))
    }

    pub async fn update_paddock(
        &self,
        session: &Session,
        paddock_id: i64,
        update: &UpdatePaddockRequest,
    ) -> Result<Option<PaddockDetail>, ApiError> {
        let id = paddock_id.to_string();
        let url = self.url(&["paddock", &id]);
        let request = self.authed(Method::PATCH, url.clone(), session).json(update);
        let body: UpdatePaddockBody = self
            .execute(request, url.path(), "Failed to update paddock")
            .await?;
        info!(
            paddock_id,
            message = body.message.as_deref().unwrap_or("Paddock updated successfully"),
            "Paddock updated"
        );
        Ok(body.paddock)
    }

    /// Deletes the paddock; the server unlinks its devices.
    pub async fn delete_paddock(&self, session: &Session, paddock_id: i64) -> Result<String, ApiError> {
        let id = paddock_id.to_string();
        let url = self.url(&["paddock", &id]);
        let request = self.authed(Method::DELETE, url.clone(), session);
        let body: MessageBody = self
            .execute(request, url.path(), "Failed to delete paddock")
            .await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Paddock deleted successfully".to_owned()))
    }

    pub async fn get_paddock_devices(
        &self,
        session: &Session,
        paddock_id: i64,
    ) -> Result<Vec<PaddockDevice>, ApiError> {
        let id = paddock_id.to_string();
        let url = self.url(&["paddock", &id, "devices"]);
        let request = self.authed(Method::GET, url.clone(), session);
        let body: PaddockDevicesBody = self
            .execute(request, url.path(), "Failed to fetch devices")
            .await?;
        Ok(body.devices)
    }

    pub async fn get_paddock_sensor_averages(
        &self,
        session: &Session,
        paddock_id: i64,
    ) -> Result<SensorAverages, ApiError> {
        let id = paddock_id.to_string();
        let url = self.url(&["paddock", &id, "sensor-averages"]);
        let request = self.authed(Method::GET, url.clone(), session);
        self.execute(request, url.path(), "Failed to fetch sensor averages")
            .await
    }

    // -----------------------------------------------------------------------
    // Request helpers
    // -----------------------------------------------------------------------

    /// Append path segments to the base URL. Segments are percent-encoded,
    /// so a node id can never change the route.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        // `with_client` rejects cannot-be-a-base URLs, so this always applies.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authed(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .bearer_auth(session.token())
    }

    /// Send `request` and shape the outcome.
    ///
    /// The body is read as JSON before the status is inspected: a non-JSON
    /// body is a transport failure even on an error status.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        self.execute_with(request, endpoint, fallback, MESSAGE_FIRST)
            .await
    }

    async fn execute_with<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        fallback: &str,
        message_keys: &[&str],
    ) -> Result<T, ApiError> {
        let transport = |source: reqwest::Error| {
            warn!(endpoint = %endpoint, error = %source, "API request failed");
            ApiError::Transport {
                endpoint: endpoint.to_owned(),
                source,
            }
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body: Value = response.json().await.map_err(transport)?;

        if !status.is_success() || body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = failure_message(&body, message_keys, fallback);
            warn!(endpoint = %endpoint, status = %status, message = %message, "API call rejected");
            return Err(ApiError::Rejected {
                endpoint: endpoint.to_owned(),
                status,
                message,
            });
        }

        serde_json::from_value(body).map_err(|e| {
            warn!(endpoint = %endpoint, error = %e, "Unexpected API response shape");
            ApiError::Decode {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            }
        })
    }
}

/// First non-empty string among `keys`, else `fallback`.
fn failure_message(body: &Value, keys: &[&str], fallback: &str) -> String {
    keys.iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_owned()
}
