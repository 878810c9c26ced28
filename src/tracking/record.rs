//! Error record types
//!
//! Structured entries stored by the [`ErrorSink`](super::ErrorSink).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Failed remote call (non-2xx, network, timeout, undecodable payload)
    #[serde(rename = "API")]
    Transport,
    /// Error raised while rendering a view
    #[serde(rename = "UI")]
    Presentation,
    /// Panic or failed background task not tied to a specific call
    #[serde(rename = "Runtime")]
    Runtime,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "API",
            ErrorCategory::Presentation => "UI",
            ErrorCategory::Runtime => "Runtime",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged error, as stored in the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl ErrorRecord {
    /// Look up a single context value
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }
}

/// An error record before the sink stamps it
///
/// Built with chained setters:
///
/// ```
/// use finboard::tracking::{ErrorCategory, NewErrorRecord};
///
/// let entry = NewErrorRecord::new(ErrorCategory::Presentation, "chart failed")
///     .component("RevenueChart")
///     .context("series", 3);
/// assert_eq!(entry.component.as_deref(), Some("RevenueChart"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewErrorRecord {
    pub category: ErrorCategory,
    pub message: String,
    pub stack: Option<String>,
    pub component: Option<String>,
    pub context: Option<Map<String, Value>>,
}

impl NewErrorRecord {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            stack: None,
            component: None,
            context: None,
        }
    }

    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn component(mut self, name: impl Into<String>) -> Self {
        self.component = Some(name.into());
        self
    }

    /// Set the component only when one is given
    pub fn maybe_component(mut self, name: Option<&str>) -> Self {
        self.component = name.map(str::to_string);
        self
    }

    /// Add one context entry. `null` values are kept so that absent fields
    /// (e.g. a status code on a network failure) stay visible.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Stamp the record with the given time
    pub(crate) fn stamp(self, timestamp: DateTime<Utc>) -> ErrorRecord {
        ErrorRecord {
            timestamp,
            category: self.category,
            message: self.message,
            stack: self.stack,
            component: self.component,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCategory::Transport).unwrap(),
            "\"API\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCategory::Presentation).unwrap(),
            "\"UI\""
        );
        let parsed: ErrorCategory = serde_json::from_str("\"Runtime\"").unwrap();
        assert_eq!(parsed, ErrorCategory::Runtime);
    }

    #[test]
    fn test_builder_collects_context() {
        let entry = NewErrorRecord::new(ErrorCategory::Transport, "boom")
            .context("status", 500)
            .context("url", "/reports")
            .maybe_component(None);

        let ctx = entry.context.as_ref().unwrap();
        assert_eq!(ctx.get("status"), Some(&Value::from(500)));
        assert_eq!(ctx.get("url"), Some(&Value::from("/reports")));
        assert!(entry.component.is_none());
    }

    #[test]
    fn test_stamped_record_omits_empty_fields() {
        let record = NewErrorRecord::new(ErrorCategory::Runtime, "oops").stamp(Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "Runtime");
        assert!(json.get("stack").is_none());
        assert!(json.get("context").is_none());
    }
}
