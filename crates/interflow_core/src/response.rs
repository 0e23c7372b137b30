//! Immutable interactor result: `{status, content}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged result value; fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: Status,
    content: Value,
}

impl Response {
    pub fn new(status: Status, content: impl Into<Value>) -> Self {
        Self {
            status,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<Value>) -> Self {
        Self::new(Status::Success, content)
    }

    pub fn failure(content: impl Into<Value>) -> Self {
        Self::new(Status::Failure, content)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == Status::Failure
    }

    pub fn into_content(self) -> Value {
        self.content
    }

    /// Keyed access to `status` or `content`; other keys resolve to `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "status" => Some(Value::String(self.status.as_str().to_string())),
            "content" => Some(self.content.clone()),
            _ => None,
        }
    }

    /// Resolves a path whose first segment is `status` or `content`.
    ///
    /// Later segments descend into objects by key and into arrays by index.
    /// Any segment that does not resolve yields `None`.
    pub fn dig<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        match first.as_ref() {
            "content" => {
                let mut current = &self.content;
                for segment in rest {
                    current = descend(current, segment.as_ref())?;
                }
                Some(current.clone())
            }
            "status" if rest.is_empty() => self.get("status"),
            _ => None,
        }
    }
}

fn descend<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}
