use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::{sync::watch, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::{errors::ApiError, ApiClient},
    present::DeviceDashboard,
    readings::ReadingType,
    session::Session,
};

use super::merge::{merge, MergeError, StreamOutcome};

pub const NO_DEVICE_SELECTED: &str = "No device selected.";
pub const NOT_LOGGED_IN: &str = "You must be logged in.";

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error(String),
    Ready(Box<DeviceDashboard>),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

#[derive(Debug, Clone)]
pub struct ViewSettings {
    /// Streams fetched for each device, in display order.
    pub streams: Vec<ReadingType>,
    pub offline_after: Duration,
    /// Stream charted first; defaults to the first one.
    pub selected: Option<ReadingType>,
}

/// Fetch every stream concurrently and return the outcomes in request order.
///
/// The requests live in one `JoinSet`, so dropping this future aborts all of
/// them.
async fn fetch_streams(
    client: &ApiClient,
    session: &Session,
    node_id: &str,
    streams: &[ReadingType],
) -> Vec<StreamOutcome> {
    let mut set = JoinSet::new();
    for (index, reading_type) in streams.iter().cloned().enumerate() {
        let client = client.clone();
        let session = session.clone();
        let node_id = node_id.to_owned();
        set.spawn(async move {
            let result = client.get_device_data(&session, &node_id, &reading_type).await;
            (index, StreamOutcome { reading_type, result })
        });
    }

    let mut slots: Vec<Option<StreamOutcome>> = streams.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => warn!(node_id = %node_id, error = %e, "Stream task did not complete"),
        }
    }

    // A panicked task leaves its slot empty; it counts as a failed stream.
    slots
        .into_iter()
        .zip(streams)
        .map(|(slot, reading_type)| {
            slot.unwrap_or_else(|| StreamOutcome {
                reading_type: reading_type.clone(),
                result: Err(ApiError::Invalid("Failed to load readings.".to_owned())),
            })
        })
        .collect()
}

/// Load the device view once.
///
/// Never returns `Loading`.
pub async fn load_device_view(
    client: &ApiClient,
    session: Option<&Session>,
    node_id: Option<&str>,
    settings: &ViewSettings,
) -> ViewState {
    let Some(node_id) = node_id.filter(|id| !id.trim().is_empty()) else {
        return ViewState::Error(NO_DEVICE_SELECTED.to_owned());
    };
    let Some(session) = session else {
        return ViewState::Error(NOT_LOGGED_IN.to_owned());
    };

    let outcomes = fetch_streams(client, session, node_id, &settings.streams).await;
    match merge(node_id, outcomes) {
        Ok(snapshot) => {
            let dashboard = DeviceDashboard::build(
                snapshot,
                Utc::now(),
                settings.offline_after,
                settings.selected.clone(),
            );
            info!(node_id = %node_id, status = %dashboard.status.label, "Device view ready");
            ViewState::Ready(Box::new(dashboard))
        }
        Err(e) => {
            let MergeError::AllStreamsFailed { failures } = &e;
            warn!(node_id = %node_id, failed = failures.len(), "No reading stream loaded");
            ViewState::Error(e.to_string())
        }
    }
}

/// Lifetime of one device view.
///
/// Holds the published state and the token of the load in flight. Each
/// navigation supersedes the previous load; a superseded or torn-down load
/// never publishes.
pub struct ViewScope {
    client: ApiClient,
    session: Option<Session>,
    settings: ViewSettings,
    state: Arc<watch::Sender<ViewState>>,
    current: Option<CancellationToken>,
}

impl ViewScope {
    pub fn new(client: ApiClient, session: Option<Session>, settings: ViewSettings) -> Self {
        let (tx, _rx) = watch::channel(ViewState::Loading);
        Self {
            client,
            session,
            settings,
            state: Arc::new(tx),
            current: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Start loading `node_id`, cancelling whatever load was in flight.
    pub fn navigate(&mut self, node_id: Option<&str>) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.current = Some(cancel.clone());
        self.state.send_replace(ViewState::Loading);

        let client = self.client.clone();
        let session = self.session.clone();
        let settings = self.settings.clone();
        let state = Arc::clone(&self.state);
        let node_id = node_id.map(str::to_owned);
        debug!(node_id = node_id.as_deref().unwrap_or(""), "Device view navigating");

        tokio::spawn(async move {
            let loaded = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                view = load_device_view(&client, session.as_ref(), node_id.as_deref(), &settings) => Some(view),
            };
            let Some(view) = loaded else {
                debug!(node_id = node_id.as_deref().unwrap_or(""), "Device view load cancelled");
                return;
            };
            // Checked under the channel lock so a later navigation cannot
            // interleave between the check and the write.
            state.send_if_modified(|current| {
                if cancel.is_cancelled() {
                    return false;
                }
                *current = view;
                true
            });
        });
    }

    /// Wait for the current load to publish a result.
    ///
    /// Before the first `navigate` nothing is loading, so the current state
    /// comes back at once. Otherwise returns `Loading` only when the scope is
    /// dropped first.
    pub async fn wait_settled(&self) -> ViewState {
        if self.current.is_none() {
            return self.state();
        }
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|state| !state.is_loading()).await.map(|s| s.clone());
        settled.unwrap_or(ViewState::Loading)
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        if let Some(current) = self.current.take() {
            debug!("Device view torn down");
            current.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use axum::{
        extract::Path,
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    use super::*;
    use crate::test_support::{serve, session, test_client};

    fn settings() -> ViewSettings {
        ViewSettings {
            streams: vec![ReadingType::Temperature, ReadingType::Ph],
            offline_after: Duration::hours(12),
            selected: None,
        }
    }

    /// Stub where `ph` works for every node and `temperature` fails, and node
    /// `slow` takes a while to answer.
    async fn stub() -> String {
        let app = Router::new().route(
            "/device/view/{node_id}/{kind}",
            get(|Path((node_id, kind)): Path<(String, String)>| async move {
                if node_id == "slow" {
                    tokio::time::sleep(StdDuration::from_millis(300)).await;
                }
                if node_id == "broken" || kind == "temperature" {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"success": false, "message": "Data type invalid"})),
                    );
                }
                let ts = chrono::Utc::now().to_rfc3339();
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "node_id": node_id,
                        "node_name": format!("Sensor {node_id}"),
                        "paddock_id": 1,
                        "readings": [{"reading_type": kind, "reading_val": 6.5, "timestamp": ts}]
                    })),
                )
            }),
        );
        serve(app).await
    }

    #[tokio::test]
    async fn one_failed_stream_still_renders() {
        let client = test_client(&stub().await);
        let state = load_device_view(&client, Some(&session()), Some("fast"), &settings()).await;

        let ViewState::Ready(dash) = state else {
            panic!("expected a ready view");
        };
        assert_eq!(dash.title(), "Sensor fast");
        assert!(dash.status.online);
        assert_eq!(dash.tiles[0].value, "--");
        assert_eq!(dash.tiles[1].value, "6.5");
        assert_eq!(dash.snapshot.failures().count(), 1);
    }

    #[tokio::test]
    async fn every_stream_failing_is_an_error() {
        let client = test_client(&stub().await);
        let state = load_device_view(&client, Some(&session()), Some("broken"), &settings()).await;
        assert_eq!(state, ViewState::Error("Failed to load readings.".into()));
    }

    #[tokio::test]
    async fn preconditions_fail_without_requests() {
        let client = test_client("http://127.0.0.1:9");
        assert_eq!(
            load_device_view(&client, Some(&session()), None, &settings()).await,
            ViewState::Error(NO_DEVICE_SELECTED.into())
        );
        assert_eq!(
            load_device_view(&client, None, Some("n"), &settings()).await,
            ViewState::Error(NOT_LOGGED_IN.into())
        );
    }

    #[tokio::test]
    async fn stale_navigation_does_not_overwrite_newer_view() {
        let client = test_client(&stub().await);
        let mut scope = ViewScope::new(client, Some(session()), settings());

        scope.navigate(Some("slow"));
        scope.navigate(Some("fast"));
        let ViewState::Ready(dash) = scope.wait_settled().await else {
            panic!("expected ready");
        };
        assert_eq!(dash.snapshot.node_id, "fast");

        // Give the superseded request time to finish had it not been cancelled.
        tokio::time::sleep(StdDuration::from_millis(500)).await;
        let ViewState::Ready(dash) = scope.state() else {
            panic!("expected ready");
        };
        assert_eq!(dash.snapshot.node_id, "fast");
    }

    #[tokio::test]
    async fn navigate_publishes_loading_first() {
        let client = test_client(&stub().await);
        let mut scope = ViewScope::new(client, Some(session()), settings());
        scope.navigate(Some("slow"));
        assert!(scope.state().is_loading());
        assert!(matches!(scope.wait_settled().await, ViewState::Ready(_)));
    }

    #[tokio::test]
    async fn wait_settled_before_navigate_returns_immediately() {
        let scope = ViewScope::new(test_client("http://127.0.0.1:9"), Some(session()), settings());
        let state = tokio::time::timeout(StdDuration::from_secs(1), scope.wait_settled())
            .await
            .expect("wait_settled must not block without a load");
        assert!(state.is_loading());
    }

    #[tokio::test]
    async fn hung_streams_settle_after_request_timeout() {
        let app = Router::new().route(
            "/device/view/{node_id}/{kind}",
            get(|| async {
                tokio::time::sleep(StdDuration::from_secs(5)).await;
                Json(json!({"success": true, "readings": []}))
            }),
        );
        let base = serve(app).await;
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_millis(100))
            .build()
            .unwrap();
        let client = ApiClient::with_client(http, &base).unwrap();

        let state = tokio::time::timeout(
            StdDuration::from_secs(2),
            load_device_view(&client, Some(&session()), Some("hung"), &settings()),
        )
        .await
        .expect("view must settle once requests time out");
        assert_eq!(state, ViewState::Error("Failed to load readings.".into()));
    }

    #[tokio::test]
    async fn teardown_cancels_outstanding_load() {
        let client = test_client(&stub().await);
        let mut scope = ViewScope::new(client, Some(session()), settings());
        let rx = scope.subscribe();

        scope.navigate(Some("slow"));
        drop(scope);

        tokio::time::sleep(StdDuration::from_millis(500)).await;
        assert!(rx.borrow().is_loading());
    }
}
