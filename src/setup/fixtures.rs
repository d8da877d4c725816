//! Demo dataset for local development.
//!
//! Child fixtures take the ids returned when their parents were inserted,
//! so nothing depends on autoincrement values.

use serde_json::{Value, json};

use crate::db::Row;
use crate::db::utils::timestamp_hours_ago;

/// Tables in parent-to-child order. Clearing walks it in reverse.
pub const FIXTURE_TABLES: &[&str] = &["users", "drivers", "vehicles", "trips", "fraud_alerts"];

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn id_at(ids: &[Value], index: usize) -> Value {
    ids.get(index).cloned().unwrap_or(Value::Null)
}

pub fn users() -> Vec<Row> {
    [
        ("maria.lopez@fraudwatch.test", "Maria Lopez", "admin"),
        ("sam.chen@fraudwatch.test", "Sam Chen", "analyst"),
        ("priya.nair@fraudwatch.test", "Priya Nair", "analyst"),
        ("tom.becker@fraudwatch.test", "Tom Becker", "viewer"),
    ]
    .into_iter()
    .map(|(email, name, role)| row(json!({"email": email, "name": name, "role": role})))
    .collect()
}

pub fn drivers() -> Vec<Row> {
    [
        ("Ana Ruiz", "DL-4821-A", "+1-555-0101", 2.1, "active"),
        ("Ben Okafor", "DL-7734-B", "+1-555-0102", 1.5, "active"),
        ("Cy Tanaka", "DL-1190-C", "+1-555-0103", 9.2, "under_review"),
        ("Dana Novak", "DL-5562-D", "+1-555-0104", 6.8, "suspended"),
        ("Eli Haddad", "DL-3307-E", "+1-555-0105", 3.4, "active"),
    ]
    .into_iter()
    .map(|(name, license, phone, risk, status)| {
        row(json!({
            "name": name,
            "license_number": license,
            "phone": phone,
            "risk_score": risk,
            "status": status,
        }))
    })
    .collect()
}

/// Three active vehicles and one in maintenance.
pub fn vehicles(driver_ids: &[Value]) -> Vec<Row> {
    [
        ("FW-1001", "Toyota", "Prius", 2021, "active", Some(0)),
        ("FW-1002", "Honda", "Insight", 2020, "active", Some(1)),
        ("FW-1003", "Hyundai", "Ioniq", 2022, "active", Some(2)),
        ("FW-1004", "Ford", "Transit", 2018, "maintenance", None),
    ]
    .into_iter()
    .map(|(plate, make, model, year, status, driver)| {
        row(json!({
            "plate_number": plate,
            "make": make,
            "model": model,
            "year": year,
            "status": status,
            "driver_id": driver.map_or(Value::Null, |i| id_at(driver_ids, i)),
        }))
    })
    .collect()
}

pub fn trips(driver_ids: &[Value], vehicle_ids: &[Value]) -> Vec<Row> {
    // (driver, vehicle, km, fare, started hours ago, duration hours, flagged)
    [
        (0, 0, 12.4, 18.50, 30, 1, false),
        (1, 1, 5.2, 9.75, 26, 1, false),
        (2, 2, 3.1, 142.00, 20, 1, true),
        (2, 2, 0.4, 88.00, 12, 1, true),
        (3, 1, 48.9, 61.20, 8, 2, false),
        (4, 0, 7.7, 13.10, 3, 1, false),
    ]
    .into_iter()
    .map(|(driver, vehicle, km, fare, started, hours, flagged)| {
        row(json!({
            "driver_id": id_at(driver_ids, driver),
            "vehicle_id": id_at(vehicle_ids, vehicle),
            "distance_km": km,
            "fare": fare,
            "started_at": timestamp_hours_ago(started),
            "ended_at": timestamp_hours_ago(started - hours),
            "flagged": flagged,
        }))
    })
    .collect()
}

pub fn fraud_alerts(trip_ids: &[Value], driver_ids: &[Value]) -> Vec<Row> {
    [
        (Some(2), 2, "fare_anomaly", "high", "open", "Fare is 12x the distance-based estimate"),
        (Some(3), 2, "short_trip_high_fare", "critical", "investigating", "0.4 km trip billed at 88.00"),
        (None, 3, "license_flag", "medium", "resolved", "License suspension reported by the licensing authority"),
    ]
    .into_iter()
    .map(|(trip, driver, alert_type, severity, status, description)| {
        row(json!({
            "trip_id": trip.map_or(Value::Null, |i| id_at(trip_ids, i)),
            "driver_id": id_at(driver_ids, driver),
            "alert_type": alert_type,
            "severity": severity,
            "status": status,
            "description": description,
        }))
    })
    .collect()
}
