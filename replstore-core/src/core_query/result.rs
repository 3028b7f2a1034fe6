/*
    result.rs - Query result envelope

    Pairs a QueryStatus with the data a query produced. A failed query never
    carries data: its payload is always the default (null) value.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::{status, QueryStatus};

/// Outcome of a query, handed to the waiting continuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryResult")]
pub struct QueryResult {
    status: QueryStatus,
    data: Value,
}

/// Wire form, checked before it becomes a QueryResult
#[derive(Deserialize)]
struct RawQueryResult {
    status: QueryStatus,
    #[serde(default)]
    data: Value,
}

impl TryFrom<RawQueryResult> for QueryResult {
    type Error = String;

    fn try_from(raw: RawQueryResult) -> Result<Self, Self::Error> {
        match raw.status {
            QueryStatus::Success => Ok(QueryResult::success(raw.data)),
            QueryStatus::Failure if raw.data.is_null() => Ok(QueryResult::failure()),
            QueryStatus::Failure => Err("FAILURE result must not carry data".to_string()),
        }
    }
}

impl QueryResult {
    /// A failed query with no data
    pub fn failure() -> Self {
        QueryResult { status: status(false), data: Value::default() }
    }

    /// A successful query carrying `data`
    pub fn success(data: Value) -> Self {
        QueryResult { status: status(true), data }
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Raw payload. `Value::Null` for failures.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Payload of a successful query
    pub fn value(&self) -> Option<&Value> {
        self.is_success().then_some(&self.data)
    }

    pub fn into_data(self) -> Value {
        self.data
    }
}

impl Default for QueryResult {
    fn default() -> Self {
        Self::failure()
    }
}

/// Build a result with a FAILURE status and empty data
pub fn failure_result() -> QueryResult {
    QueryResult::failure()
}

/// Build a result with a SUCCESS status carrying `value`
pub fn success_result(value: Value) -> QueryResult {
    QueryResult::success(value)
}
