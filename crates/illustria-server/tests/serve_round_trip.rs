// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;

use illustria_server::{build_router, AppState};
use illustria_snapshot::{FakeSource, SnapshotConfig, SnapshotManager};
use rusqlite::Connection;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn fixture_bytes(with_geography: bool) -> Vec<u8> {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("fixture.db");
    let conn = Connection::open(&db).expect("open sqlite");
    if with_geography {
        conn.execute_batch(
            "CREATE TABLE cities(
               city_id INTEGER PRIMARY KEY, name TEXT NOT NULL, lat REAL, lon REAL,
               elev_ft REAL, elev_ft_refined REAL, trewartha TEXT, biomes TEXT,
               dist_to_coast_mi REAL, relief_100mi_ft REAL, terrain_type TEXT,
               terrain_flavor TEXT, continent TEXT, country TEXT, map_x REAL, map_y REAL);
             INSERT INTO cities(city_id, name, lat, lon, elev_ft, elev_ft_refined, continent, country, map_x, map_y)
               VALUES (1, 'Port Vellamy', 10.0, 10.0, 55.0, 42.0, 'Auren', 'Vell', 100.0, 100.0),
                      (2, 'Nerath', -40.0, 150.0, 900.0, 880.0, 'Sudra', 'Ner', 500.0, 600.0);",
        )
        .expect("seed cities");
    } else {
        conn.execute_batch(
            "CREATE TABLE cities(
               city_id INTEGER PRIMARY KEY, name TEXT NOT NULL, lat REAL, lon REAL, elev_ft REAL);
             INSERT INTO cities(city_id, name, lat, lon, elev_ft)
               VALUES (1, 'Port Vellamy', 10.0, 10.0, 55.0);",
        )
        .expect("seed cities");
    }
    conn.execute_batch(
        "CREATE TABLE weather(
           city_id INTEGER NOT NULL, slot_index INTEGER NOT NULL,
           month INTEGER, day INTEGER, tod INTEGER, condition TEXT, temp_f REAL,
           wind_mph REAL, prcp_in REAL, cloud_oktas INTEGER,
           PRIMARY KEY(city_id, slot_index));",
    )
    .expect("seed weather schema");
    let mut stmt = conn
        .prepare(
            "INSERT INTO weather(city_id, slot_index, month, day, tod, condition, temp_f, wind_mph, prcp_in, cloud_oktas)
             VALUES (?1, ?2, ?3, ?4, ?5, 'clear', 61.0, 4.0, 0.0, 1)",
        )
        .expect("prepare weather");
    for slot in 0_i64..9 {
        stmt.execute(rusqlite::params![1, slot, 1, slot / 3 + 1, slot % 3])
            .expect("weather row");
    }
    drop(stmt);
    drop(conn);
    std::fs::read(db).expect("read fixture bytes")
}

async fn spawn_server(dir: &tempfile::TempDir, payload: Vec<u8>) -> SocketAddr {
    let cfg = SnapshotConfig {
        source_url: Some("https://store.example/illustria.db".to_string()),
        snapshot_path: dir.path().join("illustria.db"),
        min_snapshot_bytes: 1024,
        ..Default::default()
    };
    let snapshots = SnapshotManager::new(cfg, Arc::new(FakeSource::new(payload)));
    let app = build_router(AppState::new(snapshots));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });
    addr
}

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}

#[tokio::test]
async fn provisions_then_serves_city_and_nearest() {
    let dir = tempdir().expect("tempdir");
    let addr = spawn_server(&dir, fixture_bytes(true)).await;

    let response = get(addr, "/api/city/1").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"name\":\"Port Vellamy\""));
    assert!(response.contains("\"elev_ft\":42.0"));

    let response = get(addr, "/api/city/999").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.contains("\"NotFound\""));

    let response = get(addr, "/api/nearest?lat=10.2&lon=10.0").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"city_id\":1"));
    assert!(response.contains("\"distance_mi\":"));
}

#[tokio::test]
async fn forecast_returns_exact_window() {
    let dir = tempdir().expect("tempdir");
    let addr = spawn_server(&dir, fixture_bytes(true)).await;

    let response = get(addr, "/api/forecast?city_id=1&month=1&day=1&days=1").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert_eq!(response.matches("\"condition\":\"clear\"").count(), 3);

    // Empty windows are data, not errors.
    let response = get(addr, "/api/forecast?city_id=1&month=12&day=30").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"rows\":[]"));

    let response = get(addr, "/api/forecast?city_id=1&month=abc&day=1").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
}

#[tokio::test]
async fn listing_and_aggregates_round_trip() {
    let dir = tempdir().expect("tempdir");
    let addr = spawn_server(&dir, fixture_bytes(true)).await;

    let response = get(addr, "/api/cities?q=vell&limit=100000&offset=-5").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"total\":1"));
    assert!(response.contains("\"limit\":5000"));
    assert!(response.contains("\"offset\":0"));

    let response = get(addr, "/api/continents").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"Auren\""));

    let response = get(addr, "/api/countries?continent=Sudra").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"Ner\""));

    let response = get(addr, "/api/nearest_map?x=480&y=590").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"name\":\"Nerath\""));
}

#[tokio::test]
async fn legacy_snapshot_degrades_to_501_where_columns_missing() {
    let dir = tempdir().expect("tempdir");
    let addr = spawn_server(&dir, fixture_bytes(false)).await;

    // Point lookup still works, with nulls for the newer columns.
    let response = get(addr, "/api/city/1").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"continent\":null"));

    let response = get(addr, "/api/continents").await;
    assert!(
        response.starts_with("HTTP/1.1 501 Not Implemented\r\n"),
        "{response}"
    );
    assert!(response.contains("\"missing_columns\":[\"continent\"]"));

    let response = get(addr, "/api/nearest_map?x=0&y=0").await;
    assert!(
        response.starts_with("HTTP/1.1 501 Not Implemented\r\n"),
        "{response}"
    );
}

#[tokio::test]
async fn health_and_schema_report_snapshot_state() {
    let dir = tempdir().expect("tempdir");
    let addr = spawn_server(&dir, fixture_bytes(true)).await;

    let response = get(addr, "/api/health").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"ok\":true"));
    assert!(response.contains("\"fetch_total\":1"));

    let response = get(addr, "/api/schema").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("\"cities\""));
    assert!(response.contains("\"slot_index\""));
}
