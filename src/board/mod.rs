pub mod pipeline;
pub mod types;

pub use pipeline::{Pipeline, RepairReport};
pub use types::{
    validate_fields, validate_stages, FieldDef, FieldKind, FieldValue, NewStartup, Stage,
    Startup, StartupUpdate,
};
