pub mod evaluator;
pub mod types;

pub use evaluator::{apply_actions, condition_holds, evaluate, ActionOutcome, Evaluation};
pub use types::{Action, Condition, Rule, RuleEvent};

use crate::local::{LocalStore, LocalStoreError};

const RULES_KEY: &str = "workflow_rules";

/// Load the stored rule list; absent key means no rules yet.
pub fn load_rules(store: &dyn LocalStore) -> Result<Vec<Rule>, LocalStoreError> {
    Ok(crate::local::load(store, RULES_KEY)?.unwrap_or_default())
}

/// Persist the rule list; last write wins.
pub fn save_rules(store: &dyn LocalStore, rules: &[Rule]) -> Result<(), LocalStoreError> {
    crate::local::save(store, RULES_KEY, &rules.to_vec())
}
