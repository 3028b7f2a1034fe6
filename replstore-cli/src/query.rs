//! `replstore query`: seed an owner, look keys up through a handle of the
//! requested role, report each result.

use anyhow::{bail, Context, Result};
use replstore_core::config::Config;
use replstore_core::{MemoryTransport, Query, StoreHandle, StoreRole};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;

pub struct QueryRequest {
    pub store: String,
    pub role: StoreRole,
    pub keys: Vec<Value>,
    pub seed: Map<String, Value>,
    pub timeout: Duration,
}

/// Command-line keys are JSON when they parse as JSON, strings otherwise
pub fn parse_key(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn load_seed(path: &Path) -> Result<Map<String, Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    match serde_json::from_str(&contents)? {
        Value::Object(entries) => Ok(entries),
        other => bail!("seed file must hold a JSON object, found {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run the lookups, returning one JSON record per key in request order
pub async fn run(config: &Config, request: QueryRequest) -> Result<Vec<Value>> {
    let transport = MemoryTransport::new(config.transport.clone());

    let owner = StoreHandle::open(
        &transport,
        request.store.as_str(),
        StoreRole::Owner,
        config.store.store_options(StoreRole::Owner),
    )
    .await?;

    for (key, value) in request.seed {
        transport.put(owner.id(), Value::String(key), value)?;
    }

    let reader = match request.role {
        StoreRole::Owner => None,
        role => Some(
            StoreHandle::open(
                &transport,
                request.store.as_str(),
                role,
                config.store.store_options(role),
            )
            .await?,
        ),
    };
    let handle = reader.as_ref().unwrap_or(&owner);

    let mut lines = Vec::with_capacity(request.keys.len());
    for key in request.keys {
        let result = handle.query_with_timeout(Query::Lookup(key.clone()), request.timeout).await;
        lines.push(json!({
            "key": key,
            "status": result.status().as_str(),
            "data": result.data(),
        }));
    }

    Ok(lines)
}
