// Dealboard Library - Startup Pipeline Tracking
// This exposes the core components for testing and integration

pub mod board;
pub mod cache;
pub mod capture;
pub mod clock;
pub mod config;
pub mod export;
pub mod local;
pub mod observability;
pub mod portfolio;
pub mod priority;
pub mod remote;
pub mod rules;
pub mod telemetry;
pub mod templates;

// Re-export key types for easy access
pub use board::{Pipeline, RepairReport, Stage, Startup, StartupUpdate};
pub use cache::{CacheEntry, CacheKey, QueryCache};
pub use capture::{embed_snippet, CaptureClient, Lead};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{config, init_config, DealboardConfig};
pub use local::{FileStore, LocalStore};
pub use observability::{cache_metrics, CacheMetrics, OperationTimer};
pub use priority::Priority;
pub use remote::{RemoteStore, RestStore, RetryHandler, RetryPolicy, StoreError};
pub use rules::{Action, Condition, Rule, RuleEvent};
pub use telemetry::{init_telemetry, shutdown_telemetry};
pub use templates::EmailTemplate;
