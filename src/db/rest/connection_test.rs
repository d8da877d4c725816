//! Tests for the PostgREST backend against the in-process fake server.

use std::time::Duration;

use serde_json::json;

use super::fake_server::{FakePostgrest, TEST_API_KEY};
use crate::config::ClientType;
use crate::db::filter::render;
use crate::db::{Backend, Columns, QueryFilter, QueryOptions, Row, SortOrder, SupabaseBackend};

const DRIVER_COLUMNS: &[&str] = &["id", "name", "license_number", "risk_score", "status"];

async fn setup() -> (FakePostgrest, SupabaseBackend) {
    let server = FakePostgrest::start().await;
    server.create_table("drivers", DRIVER_COLUMNS);
    let backend = SupabaseBackend::new(server.url(), TEST_API_KEY, Duration::from_secs(5))
        .expect("client should build");
    (server, backend)
}

fn driver(name: &str, license: &str, risk_score: f64) -> Row {
    json!({"name": name, "license_number": license, "risk_score": risk_score, "status": "active"})
        .as_object()
        .cloned()
        .unwrap()
}

fn rest(filter: &QueryFilter) -> crate::db::BackendPredicate {
    render(filter, ClientType::Supabase).expect("filter should render")
}

#[tokio::test(flavor = "multi_thread")]
async fn ping_reaches_api_root() {
    let (_server, backend) = setup().await;
    backend.ping().await.expect("ping should succeed");
    assert_eq!(backend.client_type(), ClientType::Supabase);
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_key_is_rejected() {
    let server = FakePostgrest::start().await;
    let backend = SupabaseBackend::new(server.url(), "wrong", Duration::from_secs(5)).unwrap();

    let err = backend.ping().await.unwrap_err();
    assert_eq!(err.status, Some(401));
    assert_eq!(err.code.as_deref(), Some("PGRST301"));
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_then_count_and_select() {
    let (server, backend) = setup().await;

    let inserted = backend
        .insert(
            "drivers",
            &[
                driver("Ana", "LIC-1", 2.1),
                driver("Ben", "LIC-2", 1.5),
                driver("Cy", "LIC-3", 9.2),
            ],
        )
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.len(), 3);
    assert_eq!(inserted[2]["id"], json!(3));
    assert_eq!(server.rows("drivers").len(), 3);

    assert_eq!(backend.count("drivers").await.unwrap(), 3);

    let fetched = backend
        .select(
            "drivers",
            &Columns::list(["name"]),
            &rest(&QueryFilter::new().op("risk_score", "gt", 5.0)),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(fetched.rows.len(), 1);
    assert_eq!(fetched.rows[0]["name"], json!("Cy"));
    assert_eq!(fetched.total, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn select_pages_and_counts() {
    let (_server, backend) = setup().await;
    backend
        .insert(
            "drivers",
            &[
                driver("Ana", "LIC-1", 2.1),
                driver("Ben", "LIC-2", 1.5),
                driver("Cy", "LIC-3", 9.2),
            ],
        )
        .await
        .unwrap();

    let fetched = backend
        .select(
            "drivers",
            &Columns::All,
            &rest(&QueryFilter::new()),
            &QueryOptions::new()
                .order_by("risk_score", SortOrder::Desc)
                .limit(2)
                .with_count(),
        )
        .await
        .unwrap();

    let names: Vec<&str> = fetched
        .rows
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Cy", "Ana"]);
    assert_eq!(fetched.total, Some(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_reports_count() {
    let (server, backend) = setup().await;
    backend
        .insert(
            "drivers",
            &[driver("Ana", "LIC-1", 2.1), driver("Ben", "LIC-2", 7.5)],
        )
        .await
        .unwrap();

    let deleted = backend
        .delete(
            "drivers",
            &rest(&QueryFilter::new().op("name", "in", json!(["Ben", "Zed"]))),
        )
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(server.rows("drivers").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_without_total_is_error() {
    let (server, backend) = setup().await;
    backend
        .insert("drivers", &[driver("Ana", "LIC-1", 2.1)])
        .await
        .unwrap();
    server.omit_delete_range();

    let err = backend
        .delete("drivers", &rest(&QueryFilter::new().eq("name", "Ana")))
        .await
        .unwrap_err();

    assert!(!err.transport);
    assert!(err.message.contains("Content-Range"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_error_body_is_parsed() {
    let (_server, backend) = setup().await;

    let err = backend.count("ghost_table").await.unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(err.code.as_deref(), Some("PGRST205"));
    assert!(err.message.contains("ghost_table"));
}

#[tokio::test(flavor = "multi_thread")]
async fn forbidden_table_error_body_is_parsed() {
    let (server, backend) = setup().await;
    server.create_table("fraud_alerts", &["id", "severity"]);
    server.forbid("fraud_alerts");

    let err = backend.count("fraud_alerts").await.unwrap_err();
    assert_eq!(err.status, Some(403));
    assert_eq!(err.code.as_deref(), Some("42501"));
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_row_rejects_whole_batch() {
    let (server, backend) = setup().await;

    let mut bad = driver("Ben", "LIC-2", 1.5);
    bad.insert("nickname".to_string(), json!("B"));

    let err = backend
        .insert("drivers", &[driver("Ana", "LIC-1", 2.1), bad])
        .await
        .unwrap_err();
    assert_eq!(err.code.as_deref(), Some("PGRST204"));
    assert!(server.rows("drivers").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = SupabaseBackend::new(
        &format!("http://{addr}"),
        TEST_API_KEY,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = backend.ping().await.unwrap_err();
    assert!(err.transport);
}

#[tokio::test(flavor = "multi_thread")]
async fn sql_predicate_is_rejected() {
    let (_server, backend) = setup().await;
    let predicate = render(&QueryFilter::new().eq("id", 1), ClientType::Local).unwrap();

    let err = backend.delete("drivers", &predicate).await.unwrap_err();
    assert!(err.message.contains("supabase"));
}
