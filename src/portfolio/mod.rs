// Portfolio tracking collections, persisted in the local key-value store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::local::{load, save, LocalStore, LocalStoreError};

const KPIS_KEY: &str = "kpis";
const MEETINGS_KEY: &str = "board_meetings";
const HIGHLIGHTS_KEY: &str = "highlights";
const REPORTS_KEY: &str = "reports";

/// A tracked metric for a portfolio company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub startup_id: String,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub recorded_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMeeting {
    pub id: String,
    pub startup_id: String,
    pub scheduled_for: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub startup_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A periodic investor report draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub period: String,
    pub body: String,
}

pub fn load_kpis(store: &dyn LocalStore) -> Result<Vec<Kpi>, LocalStoreError> {
    Ok(load(store, KPIS_KEY)?.unwrap_or_default())
}

pub fn save_kpis(store: &dyn LocalStore, kpis: &[Kpi]) -> Result<(), LocalStoreError> {
    save(store, KPIS_KEY, &kpis.to_vec())
}

pub fn load_meetings(store: &dyn LocalStore) -> Result<Vec<BoardMeeting>, LocalStoreError> {
    Ok(load(store, MEETINGS_KEY)?.unwrap_or_default())
}

pub fn save_meetings(
    store: &dyn LocalStore,
    meetings: &[BoardMeeting],
) -> Result<(), LocalStoreError> {
    save(store, MEETINGS_KEY, &meetings.to_vec())
}

pub fn load_highlights(store: &dyn LocalStore) -> Result<Vec<Highlight>, LocalStoreError> {
    Ok(load(store, HIGHLIGHTS_KEY)?.unwrap_or_default())
}

pub fn save_highlights(
    store: &dyn LocalStore,
    highlights: &[Highlight],
) -> Result<(), LocalStoreError> {
    save(store, HIGHLIGHTS_KEY, &highlights.to_vec())
}

pub fn load_reports(store: &dyn LocalStore) -> Result<Vec<Report>, LocalStoreError> {
    Ok(load(store, REPORTS_KEY)?.unwrap_or_default())
}

pub fn save_reports(store: &dyn LocalStore, reports: &[Report]) -> Result<(), LocalStoreError> {
    save(store, REPORTS_KEY, &reports.to_vec())
}
