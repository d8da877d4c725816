//! Request and result types for adapter operations.
//!
//! These types are backend-agnostic: the same filter, options and result
//! shapes are used whichever strategy is active.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{DbError, DbResult};

/// A table row as a column-name to value mapping.
pub type Row = serde_json::Map<String, Value>;

// =============================================================================
// Filters
// =============================================================================

/// Value side of a single filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A plain value, meaning equality.
    Literal(Value),
    /// An explicit comparison. The operator stays a string until the filter
    /// is rendered so unsupported operators surface as `InvalidFilter`.
    Compare { operator: String, value: Value },
}

/// Column filter combined with logical AND, in insertion order.
///
/// Column names are not checked against any schema; unknown columns are
/// passed through and rejected by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    entries: Vec<(String, FilterValue)>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality entry.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .push((column.into(), FilterValue::Literal(value.into())));
        self
    }

    /// Add an `{operator, value}` entry.
    pub fn op(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.entries.push((
            column.into(),
            FilterValue::Compare {
                operator: operator.into(),
                value: value.into(),
            },
        ));
        self
    }

    /// Parse a JSON object such as `{"status": "active", "risk_score": {"operator": "gt", "value": 5}}`.
    ///
    /// An object value is treated as a comparison only when it has exactly
    /// the keys `operator` and `value`; any other object is rejected.
    pub fn from_json(value: &Value) -> DbResult<Self> {
        let Value::Object(map) = value else {
            return Err(DbError::invalid_filter("filter must be a JSON object"));
        };

        let mut filter = Self::new();
        for (column, entry) in map {
            let entry = match entry {
                Value::Object(pair) => {
                    let operator = pair.get("operator").and_then(Value::as_str);
                    match (operator, pair.get("value"), pair.len()) {
                        (Some(operator), Some(value), 2) => FilterValue::Compare {
                            operator: operator.to_string(),
                            value: value.clone(),
                        },
                        _ => {
                            return Err(DbError::invalid_filter(format!(
                                "filter on '{column}' must be a scalar or an {{operator, value}} pair"
                            )));
                        }
                    }
                }
                other => FilterValue::Literal(other.clone()),
            };
            filter.entries.push((column.clone(), entry));
        }

        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

// =============================================================================
// Columns and options
// =============================================================================

/// Column projection for `select`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Columns {
    #[default]
    All,
    List(Vec<String>),
}

impl Columns {
    pub fn list<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Columns::List(columns.into_iter().map(Into::into).collect())
    }
}

/// Sort order for ordered selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// Optional modifiers for `select`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum number of rows to return. Must be at least 1.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: Option<u32>,
    pub order_by: Option<OrderBy>,
    /// Also report the total number of matching rows.
    pub with_count: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            order,
        });
        self
    }

    pub fn with_count(mut self) -> Self {
        self.with_count = true;
        self
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.limit == Some(0) {
            return Err(DbError::invalid_filter("limit must be a positive integer"));
        }
        if let Some(order) = &self.order_by
            && order.column.trim().is_empty()
        {
            return Err(DbError::invalid_filter("order_by column must not be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// Results
// =============================================================================

/// Result of `select`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectResult {
    pub data: Vec<Row>,
    /// Total matching rows, present when requested with `with_count`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Result of `count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountResult {
    pub count: u64,
}

/// Result of `insert`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsertResult {
    pub inserted: u64,
    /// `id` of each inserted row, in insertion order, for tables that have one.
    pub ids: Vec<Value>,
}

/// Result of `delete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted: u64,
}
