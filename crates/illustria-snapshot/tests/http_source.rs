// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Query;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use illustria_snapshot::{HttpSource, SnapshotError, SnapshotSource};
use tempfile::tempdir;

const PAYLOAD: &[u8] = b"SQLite format 3\0--illustria-snapshot-bytes--";

async fn direct_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        PAYLOAD.to_vec(),
    )
}

async fn gated_handler(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("confirm").map(String::as_str) == Some("t0ken") {
        (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            PAYLOAD.to_vec(),
        )
            .into_response()
    } else {
        let page = r#"<html><body>
            <p>This file is too large to scan.</p>
            <a href="/gated?confirm=t0ken">Download anyway</a>
        </body></html>"#;
        ([(header::CONTENT_TYPE, "text/html")], page.to_string()).into_response()
    }
}

async fn quota_handler() -> impl IntoResponse {
    let page = "<html><body>Quota exceeded, try again later.</body></html>";
    ([(header::CONTENT_TYPE, "text/html")], page.to_string()).into_response()
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/direct.db", get(direct_handler))
        .route("/gated", get(gated_handler))
        .route("/quota", get(quota_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    addr
}

#[tokio::test]
async fn streams_direct_response_to_disk() {
    let addr = spawn_stub().await;
    let dir = tempdir().expect("tempdir");
    let dest = dir.path().join("snap.db");
    let source = HttpSource::new(Duration::from_secs(5));

    source
        .fetch_to(&format!("http://{addr}/direct.db"), &dest)
        .await
        .expect("fetch");
    assert_eq!(std::fs::read(&dest).expect("read dest"), PAYLOAD);
}

#[tokio::test]
async fn resolves_interstitial_confirm_token() {
    let addr = spawn_stub().await;
    let dir = tempdir().expect("tempdir");
    let dest = dir.path().join("snap.db");
    let source = HttpSource::new(Duration::from_secs(5));

    source
        .fetch_to(&format!("http://{addr}/gated"), &dest)
        .await
        .expect("fetch through interstitial");
    assert_eq!(std::fs::read(&dest).expect("read dest"), PAYLOAD);
}

#[tokio::test]
async fn tokenless_interstitial_is_a_fetch_error() {
    let addr = spawn_stub().await;
    let dir = tempdir().expect("tempdir");
    let source = HttpSource::new(Duration::from_secs(5));

    let err = source
        .fetch_to(&format!("http://{addr}/quota"), &dir.path().join("x.db"))
        .await
        .expect_err("must fail");
    assert!(matches!(&err, SnapshotError::Network { .. }), "got {err}");
}

#[tokio::test]
async fn non_success_status_carries_status_and_url() {
    let addr = spawn_stub().await;
    let dir = tempdir().expect("tempdir");
    let source = HttpSource::new(Duration::from_secs(5));

    let url = format!("http://{addr}/missing.db");
    let err = source
        .fetch_to(&url, &dir.path().join("x.db"))
        .await
        .expect_err("must fail");
    match err {
        SnapshotError::FetchFailed { status, url: failed } => {
            assert_eq!(status, 404);
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {other}"),
    }
}
