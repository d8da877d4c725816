//! Filter translation.
//!
//! A [`QueryFilter`] is first parsed into validated [`Condition`]s and then
//! rendered into the native predicate form of the active backend: bound SQL
//! conditions for the query builder, or PostgREST query parameters. Parsing
//! fails with `InvalidFilter` before anything touches a backend.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::config::ClientType;
use crate::db::models::{FilterValue, QueryFilter};
use crate::db::{DbError, DbResult};

/// Supported comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Operator::Eq),
            "neq" => Ok(Operator::Neq),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "in" => Ok(Operator::In),
            other => Err(DbError::invalid_filter(format!(
                "unsupported operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::In => "in",
        };
        f.write_str(name)
    }
}

/// A validated filter entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

/// Scalar bind value for the SQL backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            // Nested JSON is stored as its text form.
            other => SqlValue::Text(other.to_string()),
        }
    }
}

/// Test applied to one column in a SQL `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlTest {
    IsNull,
    IsNotNull,
    /// Binary comparison such as `>` with a bound operand.
    Compare(&'static str, SqlValue),
    In(Vec<SqlValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlCondition {
    pub column: String,
    pub test: SqlTest,
}

/// Conditions combined with AND, applied to a query builder by the SQL backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlPredicate {
    pub conditions: Vec<SqlCondition>,
}

/// PostgREST filter parameters, e.g. `("risk_score", "gt.5")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestPredicate {
    pub params: Vec<(String, String)>,
}

/// A filter rendered for one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendPredicate {
    Sql(SqlPredicate),
    Rest(RestPredicate),
}

impl BackendPredicate {
    pub fn is_empty(&self) -> bool {
        match self {
            BackendPredicate::Sql(p) => p.conditions.is_empty(),
            BackendPredicate::Rest(p) => p.params.is_empty(),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn check_operand(column: &str, operator: Operator, value: &Value) -> DbResult<()> {
    let ok = match operator {
        Operator::Eq | Operator::Neq => is_scalar(value),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            is_scalar(value) && !value.is_null()
        }
        Operator::Like => value.is_string(),
        Operator::In => match value {
            Value::Array(items) => items.iter().all(|v| is_scalar(v) && !v.is_null()),
            _ => false,
        },
    };

    if ok {
        Ok(())
    } else {
        let expected = match operator {
            Operator::Eq | Operator::Neq => "a scalar or null",
            Operator::Like => "a string pattern",
            Operator::In => "an array of non-null scalars",
            _ => "a non-null scalar",
        };
        Err(DbError::invalid_filter(format!(
            "operator '{operator}' on '{column}' expects {expected}, got {value}"
        )))
    }
}

/// Validate a filter and turn it into conditions.
pub fn parse(filter: &QueryFilter) -> DbResult<Vec<Condition>> {
    filter
        .iter()
        .map(|(column, entry)| {
            if column.trim().is_empty() {
                return Err(DbError::invalid_filter("filter column must not be empty"));
            }
            let (operator, value) = match entry {
                FilterValue::Literal(value) => (Operator::Eq, value),
                FilterValue::Compare { operator, value } => (operator.parse()?, value),
            };
            check_operand(column, operator, value)?;
            Ok(Condition {
                column: column.to_string(),
                operator,
                value: value.clone(),
            })
        })
        .collect()
}

/// Render a filter into the predicate form of `client`.
pub fn render(filter: &QueryFilter, client: ClientType) -> DbResult<BackendPredicate> {
    let conditions = parse(filter)?;
    Ok(match client {
        ClientType::Local => BackendPredicate::Sql(render_sql(&conditions)),
        ClientType::Supabase => BackendPredicate::Rest(render_rest(&conditions)),
    })
}

fn render_sql(conditions: &[Condition]) -> SqlPredicate {
    let conditions = conditions
        .iter()
        .map(|c| {
            let test = match (c.operator, &c.value) {
                (Operator::Eq, Value::Null) => SqlTest::IsNull,
                (Operator::Neq, Value::Null) => SqlTest::IsNotNull,
                (Operator::In, Value::Array(items)) => {
                    SqlTest::In(items.iter().map(SqlValue::from).collect())
                }
                (op, value) => SqlTest::Compare(sql_operator(op), SqlValue::from(value)),
            };
            SqlCondition {
                column: c.column.clone(),
                test,
            }
        })
        .collect();

    SqlPredicate { conditions }
}

fn sql_operator(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "=",
        Operator::Neq => "<>",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Like => "LIKE",
        Operator::In => "IN",
    }
}

fn render_rest(conditions: &[Condition]) -> RestPredicate {
    let params = conditions
        .iter()
        .map(|c| {
            let rendered = match (c.operator, &c.value) {
                (Operator::Eq, Value::Null) => "is.null".to_string(),
                (Operator::Neq, Value::Null) => "not.is.null".to_string(),
                (Operator::Like, value) => format!("like.{}", rest_scalar(value).replace('%', "*")),
                (Operator::In, Value::Array(items)) => {
                    let members: Vec<String> = items.iter().map(rest_list_member).collect();
                    format!("in.({})", members.join(","))
                }
                (op, value) => format!("{op}.{}", rest_scalar(value)),
            };
            (c.column.clone(), rendered)
        })
        .collect();

    RestPredicate { params }
}

fn rest_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Members of `in.(...)` lists are double-quoted when they contain
/// characters PostgREST reserves inside the list.
fn rest_list_member(value: &Value) -> String {
    let raw = rest_scalar(value);
    let reserved = |c: char| matches!(c, ',' | '(' | ')' | '"' | '\\' | ':') || c.is_whitespace();
    if raw.contains(reserved) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}
