//! Shared test fixtures: an in-memory remote store with call counting and
//! an optional artificial read delay (paired with paused tokio time) so
//! fetches can be observed while still in flight.

use async_trait::async_trait;
use dealboard::remote::{FilterOp, RemoteStore, SelectQuery, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    pub select_calls: AtomicU32,
    pub get_calls: AtomicU32,
    pub insert_calls: AtomicU32,
    pub update_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    read_delay: Option<Duration>,
    fail_reads_with: Mutex<Option<StoreError>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read suspends for this long; combine with paused tokio time to
    /// hold fetches in flight deterministically.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn with_table(self, table: &str, rows: Vec<Value>) -> Self {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
        self
    }

    /// Standard four-stage board used across tests.
    pub fn with_default_stages(self) -> Self {
        self.with_table(
            "stages",
            vec![
                json!({"id": "applied", "name": "Applied", "color": "#999999", "position": 0}),
                json!({"id": "due-diligence", "name": "Due Diligence", "color": "#3366ff", "position": 1}),
                json!({"id": "term-sheet", "name": "Term Sheet", "color": "#22aa55", "position": 2}),
                json!({"id": "declined", "name": "Declined", "color": "#aa2222", "position": 3}),
            ],
        )
    }

    pub fn fail_reads(&self, error: StoreError) {
        *self.fail_reads_with.lock().unwrap() = Some(error);
    }

    pub fn reads_total(&self) -> u32 {
        self.select_calls.load(Ordering::SeqCst) + self.get_calls.load(Ordering::SeqCst)
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)?
            .iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .cloned()
    }

    async fn before_read(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.fail_reads_with.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(())
    }

    fn matches(row: &Value, query: &SelectQuery) -> bool {
        query.filters.iter().all(|filter| {
            let cell = row.get(&filter.field);
            match filter.op {
                FilterOp::Eq => cell == Some(&filter.value),
                FilterOp::Neq => cell != Some(&filter.value),
                FilterOp::Is => {
                    filter.value.is_null() && cell.map(Value::is_null).unwrap_or(true)
                }
                FilterOp::Gt | FilterOp::Lt => {
                    let (Some(cell), Some(wanted)) =
                        (cell.and_then(Value::as_f64), filter.value.as_f64())
                    else {
                        return false;
                    };
                    if filter.op == FilterOp::Gt {
                        cell > wanted
                    } else {
                        cell < wanted
                    }
                }
            }
        })
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| Self::matches(row, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Value, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        self.row(table, id)
            .ok_or_else(|| StoreError::NotFound(format!("{table}/{id}")))
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<Value, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, table: &str, id: &str, patch: &Value) -> Result<Value, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NotFound(format!("{table}/{id}")))?;
        let row = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| StoreError::NotFound(format!("{table}/{id}")))?;
        if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                row.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }
}

/// A pipeline wired to the given store with the default schema, a fresh
/// cache, and the stock "declined" repair stage.
pub fn build_pipeline(store: std::sync::Arc<MockStore>) -> dealboard::board::Pipeline {
    use dealboard::cache::QueryCache;
    use dealboard::clock::SystemClock;
    use dealboard::config::DealboardConfig;
    use dealboard::remote::RetryHandler;
    use std::sync::Arc;

    let clock = Arc::new(SystemClock);
    let retry = RetryHandler::default();
    let cache = Arc::new(QueryCache::new(retry.clone(), clock.clone(), None));
    dealboard::board::Pipeline::new(
        store,
        cache,
        clock,
        retry,
        DealboardConfig::default().board.fields,
        "declined",
    )
}

/// A startup row in remote representation.
pub fn startup_row(id: &str, stage: Option<&str>, name: &str) -> Value {
    json!({
        "id": id,
        "stage": stage,
        "fields": {"name": {"type": "text", "value": name}},
        "priority": "medium",
        "labels": [],
        "created_at": "2025-06-01T08:00:00Z",
        "updated_at": "2025-06-01T08:00:00Z",
    })
}
