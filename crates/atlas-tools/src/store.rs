// SPDX-License-Identifier: MIT OR Apache-2.0
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A generic in-memory JSON-object store, keyed by entity id.
///
/// Each tool module (tasks, notes, calendar, workflows) owns one of these
/// per entity kind. This is the fallback storage path the original service
/// used when its external dashboard integration was unavailable — here it
/// is the only storage path, see the workspace `DESIGN.md`.
#[derive(Clone, Default)]
pub struct EntityStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl EntityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity.
    pub async fn insert(&self, id: impl Into<String>, value: Value) {
        self.inner.write().await.insert(id.into(), value);
    }

    /// Fetch an entity by id.
    pub async fn get(&self, id: &str) -> Option<Value> {
        self.inner.read().await.get(id).cloned()
    }

    /// Remove and return an entity by id.
    pub async fn remove(&self, id: &str) -> Option<Value> {
        self.inner.write().await.remove(id)
    }

    /// Mutate an entity in place via `f`, returning `None` if it doesn't exist.
    pub async fn update<F: FnOnce(&mut Value)>(&self, id: &str, f: F) -> Option<Value> {
        let mut guard = self.inner.write().await;
        let entry = guard.get_mut(id)?;
        f(entry);
        Some(entry.clone())
    }

    /// A snapshot of every stored entity, in unspecified order.
    pub async fn values(&self) -> Vec<Value> {
        self.inner.read().await.values().cloned().collect()
    }
}

/// Generate an id of the form `"{prefix}_{12 hex chars}"`, mirroring the
/// original service's `f"{prefix}_{uuid4().hex[:12]}"` convention.
pub fn gen_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}

/// Current UTC time, ISO-8601 formatted.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Read a string field, falling back to `default` when absent or not a string.
pub fn str_field<'a>(args: &'a std::collections::BTreeMap<String, Value>, key: &str, default: &'a str) -> String {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string()
}

/// Read an optional string field (`None` when absent, null, or non-string).
pub fn opt_str_field(args: &std::collections::BTreeMap<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Read a string array field, defaulting to empty when absent.
pub fn str_array_field(args: &std::collections::BTreeMap<String, Value>, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Read a `usize` field, falling back to `default`.
pub fn usize_field(args: &std::collections::BTreeMap<String, Value>, key: &str, default: usize) -> usize {
    args.get(key).and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(default)
}
