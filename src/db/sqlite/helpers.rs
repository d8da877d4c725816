//! Shared helpers for building and decoding SQLite queries.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, QueryBuilder, Row as _, Sqlite, TypeInfo, ValueRef};

use crate::db::filter::{SqlPredicate, SqlTest, SqlValue};
use crate::db::models::{Columns, QueryOptions, Row, SortOrder};

/// SQLite caps the number of bound parameters per statement.
pub const MAX_BIND_PARAMS: usize = 32_766;

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn push_columns(qb: &mut QueryBuilder<'_, Sqlite>, columns: &Columns) {
    match columns {
        Columns::All => {
            qb.push("*");
        }
        Columns::List(names) => {
            let quoted: Vec<String> = names.iter().map(|n| quote_ident(n)).collect();
            qb.push(quoted.join(", "));
        }
    }
}

/// Bind one value, picking the SQLite type from the JSON shape.
pub fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &SqlValue) {
    match value.clone() {
        SqlValue::Null => {
            qb.push_bind(None::<String>);
        }
        SqlValue::Bool(b) => {
            qb.push_bind(b);
        }
        SqlValue::Int(i) => {
            qb.push_bind(i);
        }
        SqlValue::Real(f) => {
            qb.push_bind(f);
        }
        SqlValue::Text(s) => {
            qb.push_bind(s);
        }
    }
}

/// Append ` WHERE ... AND ...` for the predicate, or nothing when it is empty.
pub fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &SqlPredicate) {
    for (i, condition) in predicate.conditions.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(quote_ident(&condition.column));
        match &condition.test {
            SqlTest::IsNull => {
                qb.push(" IS NULL");
            }
            SqlTest::IsNotNull => {
                qb.push(" IS NOT NULL");
            }
            SqlTest::Compare(op, value) => {
                qb.push(format!(" {op} "));
                push_value(qb, value);
            }
            SqlTest::In(values) => {
                qb.push(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            }
        }
    }
}

/// Append ORDER BY / LIMIT / OFFSET.
/// SQLite requires LIMIT when using OFFSET; `LIMIT -1` means no limit.
pub fn push_page(qb: &mut QueryBuilder<'_, Sqlite>, options: &QueryOptions) {
    if let Some(order) = &options.order_by {
        let direction = match order.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {} {}",
            quote_ident(&order.column),
            direction
        ));
    }

    let offset = options.offset.filter(|o| *o > 0);
    match (options.limit, offset) {
        (Some(limit), _) => {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }
        (None, Some(_)) => {
            qb.push(" LIMIT -1");
        }
        (None, None) => {}
    }
    if let Some(offset) = offset {
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(offset));
    }
}

/// Decode a row of any shape into a JSON object.
///
/// Values are decoded by their stored type: INTEGER and REAL become numbers,
/// TEXT a string, BLOB a base64 string, NULL null.
pub fn row_to_json(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" => Number::from_f64(row.try_get::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(STANDARD.encode(row.try_get::<Vec<u8>, _>(idx)?)),
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
