//! Navigation event extraction from message payloads
//!
//! Extraction is field-targeted: only known fields are read and unrecognized
//! structure is ignored, never rejected. Two strategies sit behind the same
//! trait so the dispatcher does not care which one is active.

use serde_json::Value;

use crate::config::ExtractorKind;

/// Literal that marks a payload as a navigation event
const NAVIGATION_MARKER: &str = "\"navigation\"";

/// Opening of the message field, up to its first character
const MESSAGE_FIELD: &str = "\"message\":\"";

/// Text the server wants spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub message: String,
}

/// Pulls a navigation event out of a message payload
pub trait EventExtractor: Send + Sync {
    /// Returns `None` when the payload is not a navigation event or carries
    /// an empty message
    fn extract(&self, payload: &str) -> Option<NavigationEvent>;
}

/// Substring strategy: look for the marker, then read up to the next quote
///
/// A message value containing an escaped quote is cut at that quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerExtractor;

impl EventExtractor for MarkerExtractor {
    fn extract(&self, payload: &str) -> Option<NavigationEvent> {
        if !payload.contains(NAVIGATION_MARKER) {
            return None;
        }

        let start = payload.find(MESSAGE_FIELD)? + MESSAGE_FIELD.len();
        let len = payload[start..].find('"')?;
        let message = &payload[start..start + len];

        if message.is_empty() {
            return None;
        }

        Some(NavigationEvent {
            message: message.to_string(),
        })
    }
}

/// Structural strategy using a full JSON parse
///
/// Accepts either `["navigation", {"message": ..}]` or an object carrying a
/// `navigation` key next to `message`. Escaped quotes are handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl EventExtractor for JsonExtractor {
    fn extract(&self, payload: &str) -> Option<NavigationEvent> {
        let value: Value = serde_json::from_str(payload).ok()?;
        let items: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&value],
            _ => return None,
        };

        let is_navigation = items.iter().any(|item| match item {
            Value::String(name) => name == "navigation",
            Value::Object(map) => map.contains_key("navigation"),
            _ => false,
        });
        if !is_navigation {
            return None;
        }

        items
            .iter()
            .filter_map(|item| item.as_object())
            .find_map(|map| {
                map.get("message")
                    .or_else(|| map.get("data").and_then(|d| d.get("message")))
                    .and_then(Value::as_str)
            })
            .filter(|message| !message.is_empty())
            .map(|message| NavigationEvent {
                message: message.to_string(),
            })
    }
}

/// Build the extractor for a configured strategy
#[must_use]
pub fn extractor_for(kind: ExtractorKind) -> Box<dyn EventExtractor> {
    match kind {
        ExtractorKind::Marker => Box::new(MarkerExtractor),
        ExtractorKind::Json => Box::new(JsonExtractor),
    }
}
