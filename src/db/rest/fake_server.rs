//! In-process PostgREST stand-in for remote backend tests.
//!
//! Implements the slice of PostgREST the remote backend uses: table reads
//! with filters, paging and exact counts, bulk inserts, filtered deletes,
//! and the error bodies for missing tables, denied tables and unknown
//! columns.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::db::Row;

pub const TEST_API_KEY: &str = "test-service-key";

struct FakeTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Default)]
struct FakeState {
    tables: Mutex<HashMap<String, FakeTable>>,
    forbidden: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    omit_delete_range: AtomicBool,
}

pub struct FakePostgrest {
    url: String,
    state: Arc<FakeState>,
}

impl FakePostgrest {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new()
            .route("/rest/v1/", get(root))
            .route(
                "/rest/v1/{table}",
                get(select_rows).post(insert_rows).delete(delete_rows),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake server");
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Project URL to hand to the backend.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn create_table(&self, name: &str, columns: &[&str]) {
        self.state.tables.lock().unwrap().insert(
            name.to_string(),
            FakeTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    pub fn forbid(&self, table: &str) {
        self.state
            .forbidden
            .lock()
            .unwrap()
            .insert(table.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    /// Answer deletes without a `Content-Range` header, like a proxy that strips it.
    pub fn omit_delete_range(&self) {
        self.state.omit_delete_range.store(true, AtomicOrdering::SeqCst);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

fn error(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({"code": code, "details": null, "hint": null, "message": message})),
    )
        .into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let key = headers.get("apikey").and_then(|v| v.to_str().ok());
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    let expected_bearer = format!("Bearer {TEST_API_KEY}");
    if key == Some(TEST_API_KEY) && bearer == Some(expected_bearer.as_str()) {
        Ok(())
    } else {
        Err(error(
            StatusCode::UNAUTHORIZED,
            "PGRST301",
            "Invalid API key".to_string(),
        ))
    }
}

async fn guard(state: &FakeState, headers: &HeaderMap, table: &str) -> Result<(), Response> {
    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    authorize(headers)?;
    if state.forbidden.lock().unwrap().contains(table) {
        return Err(error(
            StatusCode::FORBIDDEN,
            "42501",
            format!("permission denied for table {table}"),
        ));
    }
    if !state.tables.lock().unwrap().contains_key(table) {
        return Err(error(
            StatusCode::NOT_FOUND,
            "PGRST205",
            format!("Could not find the table 'public.{table}' in the schema cache"),
        ));
    }
    Ok(())
}

async fn root(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match authorize(&headers) {
        Ok(()) => Json(json!({"swagger": "2.0"})).into_response(),
        Err(response) => response,
    }
}

struct Filter {
    column: String,
    negate: bool,
    op: String,
    operand: String,
}

const RESERVED: &[&str] = &["select", "limit", "offset", "order"];

fn parse_filters(
    table: &str,
    columns: &[String],
    params: &[(String, String)],
) -> Result<Vec<Filter>, Response> {
    let mut filters = Vec::new();
    for (column, raw) in params {
        if RESERVED.contains(&column.as_str()) {
            continue;
        }
        if !columns.contains(column) {
            return Err(error(
                StatusCode::BAD_REQUEST,
                "42703",
                format!("column {table}.{column} does not exist"),
            ));
        }
        let (negate, rest) = match raw.strip_prefix("not.") {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        let parsed = rest.split_once('.').filter(|(op, _)| {
            matches!(
                *op,
                "eq" | "neq" | "gt" | "gte" | "lt" | "lte" | "like" | "in" | "is"
            )
        });
        let Some((op, operand)) = parsed else {
            return Err(error(
                StatusCode::BAD_REQUEST,
                "PGRST100",
                format!("\"failed to parse filter ({raw})\""),
            ));
        };
        filters.push(Filter {
            column: column.clone(),
            negate,
            op: op.to_string(),
            operand: operand.to_string(),
        });
    }
    Ok(filters)
}

fn compare(value: &Value, operand: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => n.as_f64()?.partial_cmp(&operand.parse::<f64>().ok()?),
        Value::Bool(b) => Some(b.cmp(&operand.parse::<bool>().ok()?)),
        Value::String(s) => Some(s.as_str().cmp(operand)),
        _ => None,
    }
}

fn wildcard_match(text: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        None => text == pattern,
        Some((head, tail)) => {
            let Some(rest) = text.strip_prefix(head) else {
                return false;
            };
            (0..=rest.len())
                .filter(|i| rest.is_char_boundary(*i))
                .any(|i| wildcard_match(&rest[i..], tail))
        }
    }
}

fn list_members(operand: &str) -> Vec<String> {
    let inner = operand.trim_start_matches('(').trim_end_matches(')');
    let mut members = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !quoted => members.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    members.push(current);
    members
}

fn row_matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        let value = row.get(&f.column).unwrap_or(&Value::Null);
        let ord = || compare(value, &f.operand);
        let hit = match f.op.as_str() {
            "is" => f.operand == "null" && value.is_null(),
            "eq" => ord() == Some(Ordering::Equal),
            "neq" => matches!(ord(), Some(o) if o != Ordering::Equal),
            "gt" => ord() == Some(Ordering::Greater),
            "gte" => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
            "lt" => ord() == Some(Ordering::Less),
            "lte" => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
            "like" => value.as_str().is_some_and(|s| wildcard_match(s, &f.operand)),
            "in" => list_members(&f.operand)
                .iter()
                .any(|m| compare(value, m) == Some(Ordering::Equal)),
            _ => false,
        };
        hit != f.negate
    })
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn wants_count(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("count=exact"))
}

fn with_content_range(mut response: Response, start: usize, returned: usize, total: usize) -> Response {
    let range = if returned == 0 {
        format!("*/{total}")
    } else {
        format!("{}-{}/{}", start, start + returned - 1, total)
    };
    if let Ok(value) = HeaderValue::from_str(&range) {
        response.headers_mut().insert("content-range", value);
    }
    response
}

async fn select_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if let Err(response) = guard(&state, &headers, &table).await {
        return response;
    }

    let tables = state.tables.lock().unwrap();
    let Some(fake) = tables.get(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let filters = match parse_filters(&table, &fake.columns, &params) {
        Ok(filters) => filters,
        Err(response) => return response,
    };

    let mut rows: Vec<Row> = fake
        .rows
        .iter()
        .filter(|r| row_matches(r, &filters))
        .cloned()
        .collect();
    let total = rows.len();

    if let Some((column, direction)) = param(&params, "order").and_then(|o| o.split_once('.')) {
        rows.sort_by(|a, b| {
            let a = a.get(column).unwrap_or(&Value::Null);
            let b = b.get(column).unwrap_or(&Value::Null);
            let ord = match (a, b) {
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
                _ => a.to_string().cmp(&b.to_string()),
            };
            if direction == "desc" { ord.reverse() } else { ord }
        });
    }

    let offset: usize = param(&params, "offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = param(&params, "limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);
    let rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();

    let projected: Vec<Row> = match param(&params, "select") {
        None | Some("*") => rows,
        Some(list) => {
            let wanted: Vec<&str> = list.split(',').collect();
            if let Some(unknown) = wanted
                .iter()
                .copied()
                .find(|c| !fake.columns.iter().any(|k| k.as_str() == *c))
            {
                return error(
                    StatusCode::BAD_REQUEST,
                    "42703",
                    format!("column {table}.{unknown} does not exist"),
                );
            }
            rows.into_iter()
                .map(|r| {
                    wanted
                        .iter()
                        .map(|c| (c.to_string(), r.get(*c).cloned().unwrap_or(Value::Null)))
                        .collect()
                })
                .collect()
        }
    };

    let returned = projected.len();
    let response = Json(projected).into_response();
    if wants_count(&headers) {
        with_content_range(response, offset, returned, total)
    } else {
        response
    }
}

async fn insert_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = guard(&state, &headers, &table).await {
        return response;
    }

    let incoming: Vec<Row> = match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        Value::Object(row) => vec![row],
        _ => return error(StatusCode::BAD_REQUEST, "PGRST102", "Invalid body".to_string()),
    };

    let mut tables = state.tables.lock().unwrap();
    let Some(fake) = tables.get_mut(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Validate the whole batch before touching any row.
    for row in &incoming {
        if let Some(unknown) = row.keys().find(|k| !fake.columns.contains(*k)) {
            return error(
                StatusCode::BAD_REQUEST,
                "PGRST204",
                format!("Could not find the '{unknown}' column of '{table}' in the schema cache"),
            );
        }
    }

    let mut stored = Vec::with_capacity(incoming.len());
    for mut row in incoming {
        if fake.columns.iter().any(|c| c == "id") && !row.contains_key("id") {
            row.insert("id".to_string(), json!(fake.next_id));
            fake.next_id += 1;
        }
        for column in &fake.columns {
            row.entry(column.clone()).or_insert(Value::Null);
        }
        fake.rows.push(row.clone());
        stored.push(row);
    }

    (StatusCode::CREATED, Json(stored)).into_response()
}

async fn delete_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if let Err(response) = guard(&state, &headers, &table).await {
        return response;
    }

    let mut tables = state.tables.lock().unwrap();
    let Some(fake) = tables.get_mut(&table) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let filters = match parse_filters(&table, &fake.columns, &params) {
        Ok(filters) => filters,
        Err(response) => return response,
    };

    let before = fake.rows.len();
    fake.rows.retain(|r| !row_matches(r, &filters));
    let deleted = before - fake.rows.len();

    let response = StatusCode::NO_CONTENT.into_response();
    if wants_count(&headers) && !state.omit_delete_range.load(AtomicOrdering::SeqCst) {
        with_content_range(response, 0, 0, deleted)
    } else {
        response
    }
}
