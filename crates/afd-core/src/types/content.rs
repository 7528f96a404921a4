//! Content blocks carried by tool call results.

use serde::{Deserialize, Serialize};

/// A content block of a tool call result.
///
/// Only text blocks are produced by command executors; other block kinds a
/// peer may send are kept as raw JSON so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// A text block.
    Text(TextContent),
    /// Any other block kind.
    Other(serde_json::Value),
}

/// A `{"type": "text", "text": ...}` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "text")]
pub struct TextContent {
    /// The text.
    pub text: String,
}

impl Content {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent { text: text.into() })
    }

    /// The text, if this is a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(block) => Some(&block.text),
            Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_block_wire_shape() {
        let json = serde_json::to_value(Content::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn test_unknown_block_is_preserved() {
        let raw = serde_json::json!({"type": "image", "data": "AAAA", "mimeType": "image/png"});
        let block: Content = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(block.as_text(), None);
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }
}
