use std::fmt;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{
    api::{
        errors::ApiError,
        models::{Paddock, PaddockDevice},
        ApiClient,
    },
    present::tables::paddock_display_name,
    session::Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Paddock,
    Device,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchKind::Paddock => "paddock",
            SearchKind::Device => "device",
        })
    }
}

/// One searchable paddock or device, under the name the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchItem {
    pub kind: SearchKind,
    /// Paddock id or node id.
    pub id: String,
    pub name: String,
}

impl SearchItem {
    pub fn paddock(paddock: &Paddock) -> Self {
        Self {
            kind: SearchKind::Paddock,
            id: paddock.paddock_id.to_string(),
            name: paddock_display_name(paddock.paddock_name.as_deref()),
        }
    }

    /// Unnamed devices are listed under their node id.
    pub fn device(device: &PaddockDevice) -> Self {
        let name = match device.node_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => device.node_id.clone(),
        };
        Self {
            kind: SearchKind::Device,
            id: device.node_id.clone(),
            name,
        }
    }

    /// Case-insensitive substring match on the name. An empty query matches
    /// everything.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

impl fmt::Display for SearchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {:>24}  {}", self.kind, self.id, self.name)
    }
}

/// Paddocks first, then devices, each in the order given.
pub fn filter_items(
    paddocks: &[Paddock],
    devices: &[PaddockDevice],
    query: &str,
) -> Vec<SearchItem> {
    paddocks
        .iter()
        .map(SearchItem::paddock)
        .chain(devices.iter().map(SearchItem::device))
        .filter(|item| item.matches(query))
        .collect()
}

/// Search every paddock of the account and the devices linked to them.
///
/// The paddock list is required. Device lists are fetched concurrently and a
/// paddock whose devices fail to load only loses its devices from the
/// results.
pub async fn search_dashboard(
    client: &ApiClient,
    session: &Session,
    query: &str,
) -> Result<Vec<SearchItem>, ApiError> {
    let paddocks = client.list_paddocks(session).await?;

    let mut set = JoinSet::new();
    for (index, paddock_id) in paddocks.iter().map(|p| p.paddock_id).enumerate() {
        let client = client.clone();
        let session = session.clone();
        set.spawn(async move {
            let devices = client.get_paddock_devices(&session, paddock_id).await;
            (index, paddock_id, devices)
        });
    }

    let mut per_paddock: Vec<Vec<PaddockDevice>> = paddocks.iter().map(|_| Vec::new()).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, _, Ok(devices))) => per_paddock[index] = devices,
            Ok((_, paddock_id, Err(e))) => {
                warn!(paddock_id, error = %e, "Skipping devices of paddock in search")
            }
            Err(e) => warn!(error = %e, "Device list task did not complete"),
        }
    }

    let devices: Vec<PaddockDevice> = per_paddock.into_iter().flatten().collect();
    let items = filter_items(&paddocks, &devices, query);
    debug!(
        query,
        paddocks = paddocks.len(),
        devices = devices.len(),
        matches = items.len(),
        "Dashboard search"
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::{serve, session, test_client};

    fn paddock(id: i64, name: Option<&str>) -> Paddock {
        Paddock {
            paddock_id: id,
            paddock_name: name.map(str::to_owned),
        }
    }

    fn node(id: &str, name: Option<&str>) -> PaddockDevice {
        PaddockDevice {
            node_id: id.to_owned(),
            node_name: name.map(str::to_owned),
            battery: None,
        }
    }

    #[test]
    fn matching_ignores_case_and_covers_both_kinds() {
        let paddocks = [paddock(1, Some("North Field")), paddock(2, Some("Orchard"))];
        let devices = [node("n-1", Some("north gate")), node("n-2", Some("Dam"))];

        let items = filter_items(&paddocks, &devices, "NORTH");
        assert_eq!(
            items,
            vec![
                SearchItem { kind: SearchKind::Paddock, id: "1".into(), name: "North Field".into() },
                SearchItem { kind: SearchKind::Device, id: "n-1".into(), name: "north gate".into() },
            ]
        );
    }

    #[test]
    fn unnamed_entries_use_fallback_names() {
        let paddocks = [paddock(3, None)];
        let devices = [node("abc-123", None), node("def", Some(""))];

        let items = filter_items(&paddocks, &devices, "");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "Unnamed paddock");
        assert_eq!(items[1].name, "abc-123");
        assert_eq!(items[2].name, "def");

        assert_eq!(filter_items(&paddocks, &devices, "abc").len(), 1);
        assert!(filter_items(&paddocks, &devices, "zzz").is_empty());
    }

    #[tokio::test]
    async fn searches_paddocks_and_their_devices() {
        let app = Router::new()
            .route(
                "/paddock/list",
                get(|| async {
                    Json(json!({"success": true, "paddocks": [
                        {"paddock_id": 1, "paddock_name": "Creek Paddock"},
                        {"paddock_id": 2, "paddock_name": "Top Field"},
                        {"paddock_id": 3, "paddock_name": "Creekside"}
                    ]}))
                }),
            )
            .route(
                "/paddock/{paddock_id}/devices",
                get(|Path(paddock_id): Path<i64>| async move {
                    match paddock_id {
                        1 => (
                            StatusCode::OK,
                            Json(json!({"success": true, "devices": [
                                {"node_id": "n-1", "node_name": "creek pump"}
                            ]})),
                        ),
                        2 => (
                            StatusCode::OK,
                            Json(json!({"success": true, "devices": [
                                {"node_id": "creek-2"},
                                {"node_id": "n-3", "node_name": "Gate"}
                            ]})),
                        ),
                        _ => (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"detail": "boom"})),
                        ),
                    }
                }),
            );
        let client = test_client(&serve(app).await);

        let items = search_dashboard(&client, &session(), "Creek").await.unwrap();
        let names: Vec<(SearchKind, &str)> =
            items.iter().map(|i| (i.kind, i.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (SearchKind::Paddock, "Creek Paddock"),
                (SearchKind::Paddock, "Creekside"),
                (SearchKind::Device, "creek pump"),
                (SearchKind::Device, "creek-2"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_paddock_list_fails_search() {
        let app = Router::new().route(
            "/paddock/list",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"detail": "Could not validate credentials"})),
                )
            }),
        );
        let client = test_client(&serve(app).await);
        let err = search_dashboard(&client, &session(), "x").await.unwrap_err();
        assert_eq!(err.user_message(), "Could not validate credentials");
    }
}
