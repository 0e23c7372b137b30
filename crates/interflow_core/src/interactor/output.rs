//! Converts the terminal pipeline outcome into a [`Response`].
//!
//! # Invariants
//! - Failures pass through untouched.
//! - Successes must carry every exposed key (null allowed); the response
//!   content holds exactly those keys.

use super::error::InteractorError;
use super::step::Outcome;
use crate::model::entity::Attributes;
use crate::response::Response;

pub struct OutputHandler<'a> {
    exposed: &'a [String],
}

impl<'a> OutputHandler<'a> {
    pub fn new(exposed: &'a [String]) -> Self {
        Self { exposed }
    }

    pub fn handle(&self, outcome: Outcome) -> Result<Response, InteractorError> {
        let state = match outcome {
            Outcome::Failure(content) => return Ok(Response::failure(content)),
            Outcome::Success(state) => state,
        };

        let unset: Vec<String> = self
            .exposed
            .iter()
            .filter(|key| !state.contains_key(key.as_str()))
            .cloned()
            .collect();
        if !unset.is_empty() {
            return Err(InteractorError::UnsetExposedAttributes(unset));
        }

        let content: Attributes = self
            .exposed
            .iter()
            .filter_map(|key| state.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        Ok(Response::success(content))
    }
}

#[cfg(test)]
mod tests {
    use super::OutputHandler;
    use crate::interactor::error::InteractorError;
    use crate::interactor::step::Outcome;
    use crate::model::entity::Attributes;
    use serde_json::{json, Value};

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn success_projects_exposed_keys_only() {
        let exposed = vec!["route".to_string(), "eta".to_string()];
        let response = OutputHandler::new(&exposed)
            .handle(Outcome::Success(attrs(json!({"route": [1, 2], "eta": null, "debug": true}))))
            .expect("all exposed keys are set");
        assert!(response.is_success());
        assert_eq!(response.content(), &json!({"route": [1, 2], "eta": null}));
    }

    #[test]
    fn missing_exposed_keys_are_reported_in_declaration_order() {
        let exposed = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let err = OutputHandler::new(&exposed)
            .handle(Outcome::Success(attrs(json!({"a": 1}))))
            .expect_err("c and b are unset");
        match err {
            InteractorError::UnsetExposedAttributes(keys) => assert_eq!(keys, vec!["c", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_content_is_untouched() {
        let exposed = vec!["route".to_string()];
        let content = attrs(json!({"errors": {"base": ["no route"]}, "from": "A"}));
        let response = OutputHandler::new(&exposed)
            .handle(Outcome::Failure(content.clone()))
            .expect("failures never raise");
        assert!(response.is_failure());
        assert_eq!(response.content(), &Value::Object(content));
    }
}
