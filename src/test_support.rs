//! Helpers for tests that talk to an in-process stub of the farm API.

use axum::Router;
use tokio::net::TcpListener;

use crate::{api::ApiClient, session::Session};

pub const TOKEN: &str = "test-token";

pub fn session() -> Session {
    Session::new(TOKEN)
}

pub fn test_client(base_url: &str) -> ApiClient {
    ApiClient::with_client(reqwest::Client::new(), base_url).expect("valid base url")
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind placeholder port");
    let addr = listener.local_addr().expect("placeholder address");
    drop(listener);
    format!("http://{addr}")
}
