// CSV export and import of startup records. The export contract is a fixed
// 9-column header; values carrying separators are quoted.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::board::{validate_fields, FieldDef, FieldValue, NewStartup, Startup};
use crate::priority::Priority;
use crate::remote::StoreError;

pub const EXPORT_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "stage",
    "priority",
    "labels",
    "sector",
    "website",
    "created_at",
    "updated_at",
];

/// Serialize startups as a comma-separated blob with the fixed header order.
pub fn startups_csv(startups: &[Startup]) -> String {
    let mut out = String::new();
    out.push_str(&EXPORT_COLUMNS.join(","));
    out.push('\n');
    for startup in startups {
        let row = [
            startup.id.clone(),
            startup.field_text("name").unwrap_or_default(),
            startup.stage.clone().unwrap_or_default(),
            startup.priority.to_string(),
            startup.labels.join(";"),
            startup.field_text("sector").unwrap_or_default(),
            startup.field_text("website").unwrap_or_default(),
            startup.created_at.to_rfc3339(),
            startup.updated_at.to_rfc3339(),
        ];
        let encoded: Vec<String> = row.iter().map(|cell| csv_cell(cell)).collect();
        out.push_str(&encoded.join(","));
        out.push('\n');
    }
    out
}

/// Download filename for an export taken on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("startups_export_{}.csv", date.format("%Y-%m-%d"))
}

fn csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A parsed import: records ready to create, plus per-line rejections.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub records: Vec<NewStartup>,
    /// (1-based line number, reason)
    pub rejected: Vec<(usize, String)>,
}

/// Map import rows (header `name,stage,priority,labels,sector,website`) into
/// new records validated against the field schema. Malformed rows are
/// reported, not silently dropped.
pub fn import_startups(text: &str, schema: &[FieldDef]) -> ImportReport {
    let mut report = ImportReport::default();
    let mut lines = text.lines().enumerate();

    // Header row is required; it fixes the column order.
    let Some((_, header)) = lines.next() else {
        return report;
    };
    let columns: Vec<String> = split_row(header)
        .into_iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();

    for (index, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_row(line);
        match row_to_startup(&columns, &cells, schema) {
            Ok(record) => report.records.push(record),
            Err(reason) => report.rejected.push((index + 1, reason)),
        }
    }
    report
}

fn row_to_startup(
    columns: &[String],
    cells: &[String],
    schema: &[FieldDef],
) -> Result<NewStartup, String> {
    let cell = |name: &str| -> Option<&str> {
        columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| cells.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    };

    let mut fields = BTreeMap::new();
    for key in ["name", "sector", "website"] {
        if let Some(value) = cell(key) {
            fields.insert(key.to_string(), FieldValue::Text(value.to_string()));
        }
    }

    let priority = match cell("priority") {
        Some(raw) => Priority::parse(raw).ok_or_else(|| format!("unknown priority {raw:?}"))?,
        None => Priority::default(),
    };

    let record = NewStartup {
        stage: cell("stage").map(String::from),
        fields,
        priority,
        labels: cell("labels")
            .map(|raw| raw.split(';').map(|l| l.trim().to_string()).collect())
            .unwrap_or_default(),
    };

    validate_fields(schema, &record.fields).map_err(|e| match e {
        StoreError::Validation(msg) => msg,
        other => other.to_string(),
    })?;
    Ok(record)
}

/// Split one line into cells, honoring double-quoted values.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}
