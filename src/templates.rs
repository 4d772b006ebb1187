// Email templates: stored locally, rendered against a startup record by
// substituting {{field}} placeholders.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::board::Startup;
use crate::local::{LocalStore, LocalStoreError};

const TEMPLATES_KEY: &str = "email_templates";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
}

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_pattern() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Substitute `{{field}}` placeholders from the startup's named fields and
/// built-ins (`id`, `stage`, `priority`, `labels`). Unknown placeholders are
/// left in place so the template author can spot them.
pub fn render(text: &str, startup: &Startup) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let field = &caps[1];
            startup
                .field_text(field)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn load_templates(store: &dyn LocalStore) -> Result<Vec<EmailTemplate>, LocalStoreError> {
    Ok(crate::local::load(store, TEMPLATES_KEY)?.unwrap_or_default())
}

pub fn save_templates(
    store: &dyn LocalStore,
    templates: &[EmailTemplate],
) -> Result<(), LocalStoreError> {
    crate::local::save(store, TEMPLATES_KEY, &templates.to_vec())
}
