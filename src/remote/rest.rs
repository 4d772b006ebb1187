use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::{Method, Url};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::errors::StoreError;
use super::store::{RemoteStore, SelectQuery};
use crate::config::RateLimitConfig;
use crate::observability::cache_metrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Rate-limited HTTP implementation of [`RemoteStore`] against a hosted
/// record store (PostgREST-style dialect: `?field=op.value` filters,
/// `Prefer: return=representation` on writes).
#[derive(Debug)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl RestStore {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, StoreError> {
        // A trailing slash keeps Url::join from replacing the last segment.
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| StoreError::Validation(format!("invalid endpoint URL: {e}")))?;

        let per_second = NonZeroU32::new(rate_limit.requests_per_second.max(1))
            .expect("clamped to at least 1");
        let burst =
            NonZeroU32::new(rate_limit.burst_capacity.max(1)).expect("clamped to at least 1");
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StoreError::from)?;

        Ok(Self {
            http,
            base_url,
            api_key,
            rate_limiter,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(table)
            .map_err(|e| StoreError::Validation(format!("invalid table name {table:?}: {e}")))
    }

    fn apply_query(url: &mut Url, query: &SelectQuery) {
        let mut pairs = url.query_pairs_mut();
        for filter in &query.filters {
            let (field, value) = filter.render();
            pairs.append_pair(&field, &value);
        }
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.append_pair("order", &format!("{}.{}", order.field, direction));
        }
        if let Some(columns) = &query.columns {
            pairs.append_pair("select", &columns.join(","));
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        write: bool,
    ) -> Result<Value, StoreError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        if write {
            cache_metrics().record_remote_write();
        } else {
            cache_metrics().record_remote_read();
        }
        debug!(%url, method = %method, "remote store request");

        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        if let Some(body) = body {
            request = request
                .header("Prefer", "return=representation")
                .json(body);
        }

        let response = request.send().await.map_err(StoreError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(StoreError::from)?;

        if !status.is_success() {
            return Err(StoreError::from_error_body(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| StoreError::Unknown(format!("malformed response body: {e}")))
    }

    /// Writes answer with a representation array; unwrap the affected row.
    fn single_row(value: Value, table: &str, id: &str) -> Result<Value, StoreError> {
        match value {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            Value::Array(_) => Err(StoreError::NotFound(format!("{table}/{id}"))),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        let mut url = self.table_url(table)?;
        Self::apply_query(&mut url, query);
        let value = self.request(Method::GET, url, None, false).await?;
        match value {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::Unknown(format!(
                "expected a row array from {table}, got {other}"
            ))),
        }
    }

    async fn get(&self, table: &str, id: &str) -> Result<Value, StoreError> {
        let query = SelectQuery::new().eq("id", Value::String(id.to_string())).limit(1);
        let mut rows = self.select(table, &query).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{table}/{id}")));
        }
        Ok(rows.remove(0))
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<Value, StoreError> {
        let url = self.table_url(table)?;
        let value = self.request(Method::POST, url, Some(record), true).await?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<new>");
        Self::single_row(value, table, id)
    }

    async fn update(&self, table: &str, id: &str, patch: &Value) -> Result<Value, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"));
        let value = self.request(Method::PATCH, url, Some(patch), true).await?;
        Self::single_row(value, table, id)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"));
        self.request(Method::DELETE, url, None, true).await?;
        Ok(())
    }
}
