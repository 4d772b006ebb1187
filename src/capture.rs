// Lead-capture contract: the embed snippet a host page includes, and the
// single-write submission it performs. Submissions deliberately bypass the
// retry policy; a visitor's form post either lands or fails once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::remote::{RemoteStore, StoreError};

const LEADS_TABLE: &str = "leads";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// The script tag a host page embeds. The endpoint URL travels as a data
/// attribute the loader script reads at load time.
pub fn embed_snippet(endpoint: &str) -> String {
    format!(
        r#"<script src="https://cdn.dealboard.dev/widget.js" data-dealboard-endpoint="{endpoint}" async></script>"#
    )
}

#[derive(Debug)]
pub struct CaptureClient {
    store: Arc<dyn RemoteStore>,
}

impl CaptureClient {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// One remote write, no retry.
    pub async fn submit(&self, lead: &Lead) -> Result<(), StoreError> {
        let record = serde_json::to_value(lead)
            .map_err(|e| StoreError::Unknown(format!("unserializable lead: {e}")))?;
        self.store.insert(LEADS_TABLE, &record).await?;
        info!(email = %lead.email, "lead captured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_carries_the_endpoint_attribute() {
        let snippet = embed_snippet("https://api.example.dev/rest/");
        assert!(snippet.contains(r#"data-dealboard-endpoint="https://api.example.dev/rest/""#));
        assert!(snippet.starts_with("<script"));
    }
}
