use async_trait::async_trait;
use serde_json::Value;

use super::errors::StoreError;

/// Record-oriented remote store: reads and writes keyed by table name and
/// identifier, with filter/order/select support on reads.
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>, StoreError>;

    async fn get(&self, table: &str, id: &str) -> Result<Value, StoreError>;

    async fn insert(&self, table: &str, record: &Value) -> Result<Value, StoreError>;

    async fn update(&self, table: &str, id: &str, patch: &Value) -> Result<Value, StoreError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Lt,
    /// `IS` comparison, used for null checks.
    Is,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Is => "is",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Render as a query-string pair, e.g. `("stage", "eq.applied")`.
    pub fn render(&self) -> (String, String) {
        let scalar = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (self.field.clone(), format!("{}.{}", self.op.as_str(), scalar))
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

/// Read query: filters ANDed together, optional ordering, column projection,
/// and row limit.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub columns: Option<Vec<String>>,
    pub limit: Option<u32>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.filter(field, FilterOp::Is, Value::Null)
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            field: field.into(),
            ascending,
        });
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
