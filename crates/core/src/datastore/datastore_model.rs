//! Query model shared by every DataStore implementation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::{Result, ValidationError};

// =============================================================================
// Values
// =============================================================================

/// A scalar bound into a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Converts this value into its JSON form.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Real(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(s) => JsonValue::String(s.clone()),
        }
    }

    /// Converts a JSON scalar back into a bindable value. Arrays and objects
    /// are bound as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Orders two JSON scalars the way SQLite would for the types we store.
///
/// Numbers and booleans compare numerically, strings lexically (ISO dates and
/// `HH:MM` times sort correctly). Nulls and mixed types are incomparable.
pub fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

fn numeric(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Renders a JSON scalar as plain text (strings unquoted). Null yields `None`.
pub fn json_to_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(if *b { "1".to_string() } else { "0".to_string() }),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// A filter condition over one column. Top-level predicates of a [`Query`]
/// are AND-ed; [`Predicate::Any`] groups alternatives with OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Predicate {
    Eq { column: String, value: Value },
    NotEq { column: String, value: Value },
    Lt { column: String, value: Value },
    Lte { column: String, value: Value },
    Gt { column: String, value: Value },
    Gte { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    NotIn { column: String, values: Vec<Value> },
    IsNull { column: String },
    IsNotNull { column: String },
    Any { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq { column: column.into(), value: value.into() }
    }

    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::NotEq { column: column.into(), value: value.into() }
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt { column: column.into(), value: value.into() }
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lte { column: column.into(), value: value.into() }
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt { column: column.into(), value: value.into() }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gte { column: column.into(), value: value.into() }
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::NotIn {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull { column: column.into() }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull { column: column.into() }
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Predicate::Any { predicates }
    }

    /// Evaluates the predicate against a row using SQL null semantics
    /// (any comparison involving NULL is false).
    pub fn matches(&self, row: &Row) -> bool {
        let null = JsonValue::Null;
        let cell = |column: &str| row.get(column).unwrap_or(&null);
        let cmp = |column: &str, value: &Value| compare_json(cell(column), &value.to_json());

        match self {
            Predicate::Eq { column, value } => cmp(column, value) == Some(Ordering::Equal),
            Predicate::NotEq { column, value } => {
                matches!(cmp(column, value), Some(o) if o != Ordering::Equal)
            }
            Predicate::Lt { column, value } => cmp(column, value) == Some(Ordering::Less),
            Predicate::Lte { column, value } => {
                matches!(cmp(column, value), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::Gt { column, value } => cmp(column, value) == Some(Ordering::Greater),
            Predicate::Gte { column, value } => {
                matches!(cmp(column, value), Some(Ordering::Greater | Ordering::Equal))
            }
            Predicate::In { column, values } => values
                .iter()
                .any(|v| cmp(column, v) == Some(Ordering::Equal)),
            Predicate::NotIn { column, values } => {
                !cell(column).is_null()
                    && values.iter().all(|v| cmp(column, v) != Some(Ordering::Equal))
            }
            Predicate::IsNull { column } => cell(column).is_null(),
            Predicate::IsNotNull { column } => !cell(column).is_null(),
            Predicate::Any { predicates } => predicates.iter().any(|p| p.matches(row)),
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::NotEq { column, .. }
            | Predicate::Lt { column, .. }
            | Predicate::Lte { column, .. }
            | Predicate::Gt { column, .. }
            | Predicate::Gte { column, .. }
            | Predicate::In { column, .. }
            | Predicate::NotIn { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column } => out.push(column),
            Predicate::Any { predicates } => {
                for p in predicates {
                    p.collect_columns(out);
                }
            }
        }
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// A filtered, ordered, bounded read against one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub entity: String,
    /// Columns to return; empty means every column.
    pub fields: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// Starts a query over `entity`.
    pub fn table(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every identifier the query references, entity first.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = vec![self.entity.as_str()];
        out.extend(self.fields.iter().map(String::as_str));
        for p in &self.predicates {
            p.collect_columns(&mut out);
        }
        out.extend(self.order.iter().map(|o| o.column.as_str()));
        out
    }

    /// Rejects identifiers that could not be safely quoted into SQL.
    pub fn validate(&self) -> Result<()> {
        match self.identifiers().into_iter().find(|i| !is_valid_identifier(i)) {
            Some(bad) => Err(ValidationError::InvalidIdentifier(bad.to_string()).into()),
            None => Ok(()),
        }
    }

    /// True when a row satisfies every top-level predicate.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

/// Identifiers are ASCII `[A-Za-z_][A-Za-z0-9_]*`, at most 64 characters.
pub fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    ident.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Rows
// =============================================================================

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, JsonValue>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds a column value, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into().to_json());
        self
    }

    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(JsonValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.0.get(column).and_then(|v| match v {
            JsonValue::Bool(b) => Some(*b as i64),
            other => other.as_i64(),
        })
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.0.get(column).and_then(numeric)
    }

    /// Column value rendered as text; `None` when missing or NULL.
    pub fn text(&self, column: &str) -> Option<String> {
        self.0.get(column).and_then(json_to_text)
    }

    /// Keeps only the listed columns (missing ones become NULL).
    pub fn project(&self, fields: &[String]) -> Row {
        if fields.is_empty() {
            return self.clone();
        }
        Row(fields
            .iter()
            .map(|f| (f.clone(), self.0.get(f).cloned().unwrap_or(JsonValue::Null)))
            .collect())
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

impl From<Map<String, JsonValue>> for Row {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl From<JsonValue> for Row {
    /// Non-object JSON produces an empty row.
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

// =============================================================================
// Deadline
// =============================================================================

/// Point in time by which a DataStore call must complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }
}
