//! Event type filtering for subscriptions.

use crate::error::SubscriptionError;
use crate::settings::TypeMatchRule;
use crate::types::EventRecord;
use regex::Regex;

/// A compiled allow-list rule.
#[derive(Clone, Debug)]
enum TypeMatch {
    /// Exact match on the event type.
    Literal(String),
    /// Full-string pattern match on the event type.
    Pattern(Regex),
}

/// Decides whether an event passes the configured type allow-list.
///
/// An empty allow-list passes everything. Rules are evaluated in list
/// order; the first match wins. The engine applies the filter to the
/// effective record after link resolution when resolution is enabled,
/// otherwise to the raw record.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    rules: Vec<TypeMatch>,
}

impl EventFilter {
    /// Compile an allow-list into a filter.
    ///
    /// Patterns are anchored so they must match the entire event type.
    /// An invalid pattern is a configuration error.
    pub fn compile(rules: &[TypeMatchRule]) -> Result<Self, SubscriptionError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            match rule {
                TypeMatchRule::Literal(s) => compiled.push(TypeMatch::Literal(s.clone())),
                TypeMatchRule::Pattern(p) => {
                    let anchored = format!("^(?:{})$", p);
                    let regex = Regex::new(&anchored).map_err(|e| {
                        SubscriptionError::Configuration(format!(
                            "invalid event type pattern {:?}: {}",
                            p, e
                        ))
                    })?;
                    compiled.push(TypeMatch::Pattern(regex));
                }
            }
        }
        Ok(Self { rules: compiled })
    }

    /// Whether the filter restricts anything at all.
    pub fn is_unrestricted(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a record passes the allow-list.
    pub fn passes(&self, record: &EventRecord) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        self.rules.iter().any(|rule| match rule {
            TypeMatch::Literal(s) => record.event_type == *s,
            TypeMatch::Pattern(regex) => regex.is_match(&record.event_type),
        })
    }
}
