use ops_mcp_server::config::DatabaseSettings;
use ops_mcp_server::db::{ResourcePool, StatementExecutor};
use ops_mcp_server::tools::metrics::{self, BUSINESS_METRICS, METRIC_ERROR_MARKER, MetricValue};
use ops_mcp_server::tools::{ContentBlock, DatabaseToolset, Dispatcher, JsonObject, Request};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

const SCHEMA_WITHOUT_COUPONS: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE gas_stations (id INTEGER PRIMARY KEY, active BOOLEAN);
    CREATE TABLE redemptions (id INTEGER PRIMARY KEY);
    CREATE TABLE raffle_entries (user_id INTEGER, raffle_type TEXT);

    INSERT INTO users (name) VALUES ('ana'), ('beto'), ('carla');
    INSERT INTO gas_stations (active) VALUES (1), (1), (0);
    INSERT INTO raffle_entries VALUES (1, 'weekly'), (1, 'weekly'), (2, 'weekly'), (3, 'annual');
";

async fn seeded_executor(dir: &TempDir) -> Arc<StatementExecutor> {
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("metrics.db").display());
    let pool = Arc::new(ResourcePool::new(DatabaseSettings::new(url)));
    let executor = Arc::new(StatementExecutor::new(pool));
    assert_ok!(executor.execute_command(SCHEMA_WITHOUT_COUPONS, &[]).await);
    executor
}

#[tokio::test]
async fn test_missing_table_is_reported_per_metric() {
    let dir = TempDir::new().unwrap();
    let executor = seeded_executor(&dir).await;

    let report = metrics::collect(&executor, BUSINESS_METRICS).await;

    assert_eq!(report.len(), 6);
    assert_eq!(report.get("total_users"), Some(&MetricValue::Count(3)));
    assert_eq!(report.get("active_stations"), Some(&MetricValue::Count(2)));
    assert_eq!(
        report.get("total_coupons_generated"),
        Some(&MetricValue::Error(METRIC_ERROR_MARKER.to_string()))
    );
    assert_eq!(report.get("total_redemptions"), Some(&MetricValue::Count(0)));
    assert_eq!(
        report.get("weekly_raffle_participants"),
        Some(&MetricValue::Count(2))
    );
    assert_eq!(
        report.get("annual_raffle_participants"),
        Some(&MetricValue::Count(1))
    );
}

#[tokio::test]
async fn test_metrics_tool_keeps_declared_order() {
    let dir = TempDir::new().unwrap();
    let executor = seeded_executor(&dir).await;
    let dispatcher = Dispatcher::new(Arc::new(DatabaseToolset::new(executor)));

    let response = dispatcher
        .dispatch(Request::new("get_business_metrics", JsonObject::new()))
        .await;
    let Some(ContentBlock::Json(Value::Object(report))) = response.first_block() else {
        panic!("expected a JSON object, got {:?}", response);
    };

    let keys: Vec<&str> = report.keys().map(String::as_str).collect();
    let expected: Vec<&str> = BUSINESS_METRICS.iter().map(|m| m.name).collect();
    assert_eq!(keys, expected);
    assert_eq!(report["total_users"], json!(3));
    assert_eq!(report["total_coupons_generated"], json!(METRIC_ERROR_MARKER));
}

#[tokio::test]
async fn test_metrics_accept_date_range() {
    let dir = TempDir::new().unwrap();
    let executor = seeded_executor(&dir).await;
    let dispatcher = Dispatcher::new(Arc::new(DatabaseToolset::new(executor)));

    let Some(args) = json!({ "date_from": "2024-01-01", "date_to": "2024-12-31" })
        .as_object()
        .cloned()
    else {
        unreachable!()
    };
    let response = dispatcher
        .dispatch(Request::new("get_business_metrics", args))
        .await;
    assert!(response.is_success(), "{:?}", response);
}

#[tokio::test]
async fn test_metrics_tolerate_malformed_date() {
    let dir = TempDir::new().unwrap();
    let executor = seeded_executor(&dir).await;
    let dispatcher = Dispatcher::new(Arc::new(DatabaseToolset::new(executor)));

    let Some(args) = json!({ "date_from": "last tuesday", "date_to": "2024-13-01" })
        .as_object()
        .cloned()
    else {
        unreachable!()
    };
    let response = dispatcher
        .dispatch(Request::new("get_business_metrics", args))
        .await;
    let Some(ContentBlock::Json(report)) = response.first_block() else {
        panic!("expected a JSON report, got {:?}", response);
    };
    assert_eq!(report["total_users"], json!(3));
}
