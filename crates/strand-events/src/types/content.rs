//! Event content: an ordered list of parts under a role.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One piece of event content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A function/tool call requested by the model.
    FunctionCall {
        /// Call id, echoed by the matching response.
        id: String,
        /// Function name.
        name: String,
        /// Call arguments.
        #[serde(default)]
        args: Value,
    },
    /// The result of a function/tool call.
    FunctionResponse {
        /// Id of the call this answers.
        id: String,
        /// Function name.
        name: String,
        /// Response payload.
        #[serde(default)]
        response: Value,
    },
}

impl Part {
    /// Text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Approximate rendered length in characters, used for token estimates.
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text { text } => text.chars().count(),
            Self::FunctionCall { name, args, .. } => name.len() + args.to_string().len(),
            Self::FunctionResponse { name, response, .. } => {
                name.len() + response.to_string().len()
            }
        }
    }
}

/// Ordered content parts attributed to a role (`user`, `model`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Conversational role.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Parts in order.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Content with the given role and parts.
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts,
        }
    }

    /// Single text part under `role`.
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }

    /// True when there are no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Concatenated text of all text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sum of [`Part::char_len`] over all parts.
    pub fn char_len(&self) -> usize {
        self.parts.iter().map(Part::char_len).sum()
    }
}
