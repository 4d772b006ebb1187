// Pipeline service: every read and write of board data goes through the
// query cache so views never observe stale-after-write data.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::types::{
    validate_fields, validate_stages, FieldDef, NewStartup, Stage, Startup, StartupUpdate,
};
use crate::cache::{CacheKey, QueryCache};
use crate::clock::Clock;
use crate::remote::{RemoteStore, RetryHandler, SelectQuery, StoreError};

const STARTUPS_TABLE: &str = "startups";
const STAGES_TABLE: &str = "stages";

/// Outcome of the bulk repair of records missing their stage reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub updated: usize,
}

#[derive(Debug)]
pub struct Pipeline {
    store: Arc<dyn RemoteStore>,
    cache: Arc<QueryCache>,
    clock: Arc<dyn Clock>,
    retry: RetryHandler,
    schema: Vec<FieldDef>,
    default_repair_stage: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: Arc<QueryCache>,
        clock: Arc<dyn Clock>,
        retry: RetryHandler,
        schema: Vec<FieldDef>,
        default_repair_stage: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            retry,
            schema,
            default_repair_stage: default_repair_stage.into(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn schema(&self) -> &[FieldDef] {
        &self.schema
    }

    fn list_key() -> CacheKey {
        CacheKey::collection(STARTUPS_TABLE)
    }

    fn record_key(id: &str) -> CacheKey {
        CacheKey::record(STARTUPS_TABLE, id)
    }

    /// Stage-grouped view key, e.g. `startups/status/applied`.
    pub fn stage_view_key(stage: &str) -> CacheKey {
        CacheKey::view(STARTUPS_TABLE, format!("status/{stage}"))
    }

    /// Affected-key set for a write to a startup record: its own entry and
    /// the aggregate list always; the old and new stage-grouped views only
    /// when the stage reference differs between them. Both the stage-change
    /// and the null-stage repair paths compute through here.
    pub fn startup_invalidation(
        id: &str,
        old_stage: Option<&str>,
        new_stage: Option<&str>,
    ) -> Vec<CacheKey> {
        let mut keys = vec![Self::record_key(id), Self::list_key()];
        if old_stage != new_stage {
            if let Some(old) = old_stage {
                keys.push(Self::stage_view_key(old));
            }
            if let Some(new) = new_stage {
                keys.push(Self::stage_view_key(new));
            }
        }
        keys
    }

    /// Cache loader: rows as a single JSON value, owning its arguments so
    /// the future has no ties to the calling closure.
    async fn select_rows(
        store: Arc<dyn RemoteStore>,
        table: &'static str,
        query: SelectQuery,
    ) -> Result<Value, StoreError> {
        store.select(table, &query).await.map(Value::Array)
    }

    fn decode_startup(value: Value) -> Result<Startup, StoreError> {
        serde_json::from_value(value)
            .map_err(|e| StoreError::Unknown(format!("malformed startup record: {e}")))
    }

    fn decode_startups(rows: Vec<Value>) -> Result<Vec<Startup>, StoreError> {
        rows.into_iter().map(Self::decode_startup).collect()
    }

    /// Ordered pipeline stages. The position invariant is checked on every
    /// load; a violated ordering is a backend defect worth failing loudly on.
    pub async fn stages(&self) -> Result<Vec<Stage>, StoreError> {
        let key = CacheKey::collection(STAGES_TABLE);
        let query = SelectQuery::new().order_by("position", true);
        let value = self
            .cache
            .fetch(&key, || {
                Self::select_rows(self.store.clone(), STAGES_TABLE, query.clone())
            })
            .await?;
        let stages: Vec<Stage> = serde_json::from_value(value)
            .map_err(|e| StoreError::Unknown(format!("malformed stage record: {e}")))?;
        validate_stages(&stages)?;
        Ok(stages)
    }

    async fn ensure_stage_exists(&self, stage: &str) -> Result<(), StoreError> {
        let stages = self.stages().await?;
        if stages.iter().any(|s| s.id == stage) {
            Ok(())
        } else {
            Err(StoreError::Validation(format!(
                "stage {stage:?} does not exist"
            )))
        }
    }

    pub async fn startups(&self) -> Result<Vec<Startup>, StoreError> {
        let query = SelectQuery::new().order_by("updated_at", false);
        let value = self
            .cache
            .fetch(&Self::list_key(), || {
                Self::select_rows(self.store.clone(), STARTUPS_TABLE, query.clone())
            })
            .await?;
        let rows = match value {
            Value::Array(rows) => rows,
            other => vec![other],
        };
        Self::decode_startups(rows)
    }

    pub async fn startup(&self, id: &str) -> Result<Startup, StoreError> {
        let value = self
            .cache
            .fetch(&Self::record_key(id), || self.store.get(STARTUPS_TABLE, id))
            .await?;
        Self::decode_startup(value)
    }

    /// The stage-grouped view backing one kanban column.
    pub async fn startups_by_stage(&self, stage: &str) -> Result<Vec<Startup>, StoreError> {
        let query = SelectQuery::new()
            .eq("stage", json!(stage))
            .order_by("updated_at", false);
        let value = self
            .cache
            .fetch(&Self::stage_view_key(stage), || {
                Self::select_rows(self.store.clone(), STARTUPS_TABLE, query.clone())
            })
            .await?;
        let rows = match value {
            Value::Array(rows) => rows,
            other => vec![other],
        };
        Self::decode_startups(rows)
    }

    pub async fn create_startup(&self, new: NewStartup) -> Result<Startup, StoreError> {
        validate_fields(&self.schema, &new.fields)?;
        if let Some(stage) = &new.stage {
            self.ensure_stage_exists(stage).await?;
        }

        let now = self.clock.now();
        let startup = Startup {
            id: Uuid::new_v4().to_string(),
            stage: new.stage,
            fields: new.fields,
            priority: new.priority,
            labels: new.labels,
            created_at: now,
            updated_at: now,
        };
        let record = serde_json::to_value(&startup)
            .map_err(|e| StoreError::Unknown(format!("unserializable startup record: {e}")))?;

        let keys =
            Self::startup_invalidation(&startup.id, None, startup.stage.as_deref());
        let result = self
            .cache
            .mutate(&keys, || self.store.insert(STARTUPS_TABLE, &record))
            .await?;

        info!(id = %startup.id, stage = ?startup.stage, "startup created");
        if result.is_object() {
            Self::decode_startup(result)
        } else {
            Ok(startup)
        }
    }

    /// Apply a partial update. The pre-mutation stage reference is compared
    /// against the mutation result's; when they differ, both stage-grouped
    /// views are invalidated along with the default set.
    pub async fn update_startup(
        &self,
        id: &str,
        update: StartupUpdate,
    ) -> Result<Startup, StoreError> {
        if update.is_empty() {
            return Err(StoreError::Validation("empty update".into()));
        }

        let current = self.startup(id).await?;

        let mut merged_fields = current.fields.clone();
        for (key, value) in &update.fields {
            merged_fields.insert(key.clone(), value.clone());
        }
        validate_fields(&self.schema, &merged_fields)?;
        if let Some(stage) = &update.stage {
            self.ensure_stage_exists(stage).await?;
        }

        let mut patch = serde_json::Map::new();
        if let Some(stage) = &update.stage {
            patch.insert("stage".into(), json!(stage));
        }
        if let Some(priority) = update.priority {
            patch.insert("priority".into(), json!(priority));
        }
        if let Some(labels) = &update.labels {
            patch.insert("labels".into(), json!(labels));
        }
        if !update.fields.is_empty() {
            patch.insert(
                "fields".into(),
                serde_json::to_value(&merged_fields)
                    .map_err(|e| StoreError::Unknown(format!("unserializable fields: {e}")))?,
            );
        }
        patch.insert("updated_at".into(), json!(self.clock.now()));
        let patch = Value::Object(patch);

        let intended_stage = update
            .stage
            .clone()
            .or_else(|| current.stage.clone());
        let old_stage = current.stage.clone();

        let result = self
            .cache
            .mutate_with(
                || self.store.update(STARTUPS_TABLE, id, &patch),
                |value: &Value| {
                    // Prefer the stage echoed back in the mutation result;
                    // fall back to the patched intent when the backend
                    // returns no representation.
                    let result_stage = value
                        .get("stage")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .or(intended_stage);
                    Self::startup_invalidation(id, old_stage.as_deref(), result_stage.as_deref())
                },
            )
            .await?;

        info!(id, "startup updated");
        if result.is_object() {
            Self::decode_startup(result)
        } else {
            self.startup(id).await
        }
    }

    pub async fn move_startup(&self, id: &str, stage: &str) -> Result<Startup, StoreError> {
        self.update_startup(id, StartupUpdate::move_to(stage)).await
    }

    pub async fn delete_startup(&self, id: &str) -> Result<(), StoreError> {
        let current = self.startup(id).await?;
        let keys = Self::startup_invalidation(id, current.stage.as_deref(), None);
        self.cache
            .mutate(&keys, || self.store.delete(STARTUPS_TABLE, id))
            .await?;
        info!(id, "startup deleted");
        Ok(())
    }

    /// Assign the default terminal stage to every record whose stage
    /// reference is absent, and report how many were repaired.
    pub async fn repair_missing_stages(&self) -> Result<RepairReport, StoreError> {
        self.ensure_stage_exists(&self.default_repair_stage).await?;

        let query = SelectQuery::new().is_null("stage");
        let rows = self
            .retry
            .execute(|| self.store.select(STARTUPS_TABLE, &query))
            .await?;

        let mut updated = 0;
        for row in rows {
            let Some(id) = row.get("id").and_then(Value::as_str).map(String::from) else {
                warn!("skipping stage repair for a record without an id");
                continue;
            };
            let patch = json!({
                "stage": self.default_repair_stage,
                "updated_at": self.clock.now(),
            });
            let keys = Self::startup_invalidation(
                &id,
                None,
                Some(self.default_repair_stage.as_str()),
            );
            self.cache
                .mutate(&keys, || self.store.update(STARTUPS_TABLE, &id, &patch))
                .await?;
            updated += 1;
        }

        info!(updated, stage = %self.default_repair_stage, "missing stage references repaired");
        Ok(RepairReport { updated })
    }

    /// Count of records missing their stage reference, for dry runs.
    pub async fn missing_stage_count(&self) -> Result<usize, StoreError> {
        let query = SelectQuery::new().is_null("stage").columns(&["id"]);
        let rows = self
            .retry
            .execute(|| self.store.select(STARTUPS_TABLE, &query))
            .await?;
        Ok(rows.len())
    }
}
