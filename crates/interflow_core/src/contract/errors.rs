//! Field-keyed validation error tree.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Key used for failures not tied to a single field.
pub const BASE_KEY: &str = "base";

/// One validation failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub text: String,
    pub code: Option<String>,
}

impl ErrorMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Plain string when uncoded, `{code, text}` otherwise.
    pub fn to_value(&self) -> Value {
        match &self.code {
            None => Value::String(self.text.clone()),
            Some(code) => json!({ "code": code, "text": self.text }),
        }
    }
}

/// Errors recorded for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorNode {
    Messages(Vec<ErrorMessage>),
    Nested(ErrorMap),
    Indexed(BTreeMap<usize, ErrorNode>),
}

impl ErrorNode {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Messages(messages) => {
                Value::Array(messages.iter().map(ErrorMessage::to_value).collect())
            }
            Self::Nested(map) => map.to_value(),
            Self::Indexed(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(index, node)| (index.to_string(), node.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Ordered mapping from field key to errors, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMap {
    entries: IndexMap<String, ErrorNode>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ErrorNode> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Message texts recorded directly under `key`.
    pub fn texts(&self, key: &str) -> Vec<&str> {
        match self.entries.get(key) {
            Some(ErrorNode::Messages(messages)) => {
                messages.iter().map(|message| message.text.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Appends a message under `key`.
    ///
    /// A key that already holds nested errors keeps them; the message is
    /// dropped in that case since the structural detail is more specific.
    pub fn push(&mut self, key: &str, message: ErrorMessage) {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| ErrorNode::Messages(Vec::new()))
        {
            ErrorNode::Messages(messages) => messages.push(message),
            ErrorNode::Nested(_) | ErrorNode::Indexed(_) => {}
        }
    }

    pub fn insert(&mut self, key: &str, node: ErrorNode) {
        self.entries.insert(key.to_string(), node);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, node)| (key.clone(), node.to_value()))
                .collect::<Map<String, Value>>(),
        )
    }
}
