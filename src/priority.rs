use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority levels for startup records on the deal board
/// Higher values = more urgent attention in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// priority:low (0)
    #[default]
    Low = 0,
    /// priority:medium (1)
    Medium = 1,
    /// priority:high (2)
    High = 2,
}

impl Priority {
    /// Determine priority from record labels
    pub fn from_labels(labels: &[impl AsRef<str>]) -> Self {
        let mut highest_priority = Priority::Low;

        for label in labels {
            let priority = match label.as_ref() {
                "priority:high" => Priority::High,
                "priority:medium" => Priority::Medium,
                "priority:low" => Priority::Low,
                _ => continue,
            };

            if priority > highest_priority {
                highest_priority = priority;
            }
        }

        highest_priority
    }

    /// Parse a bare priority name, as found in CSV imports and rule configs
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    /// Get the numeric priority value
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{}", label)
    }
}
