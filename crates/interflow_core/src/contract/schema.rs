//! Structural field rules: presence, type, and ordered predicates.
//!
//! # Invariants
//! - Per field, the first failing rule is recorded and later rules skipped.
//! - Optional absent fields never produce errors.
//! - Nested hashes and arrays of hashes recurse with the same rules.

use super::errors::{ErrorMap, ErrorMessage, ErrorNode};
use super::i18n::Translator;
use crate::model::entity::Attributes;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// Expected value type of a field.
#[derive(Debug, Clone)]
pub enum Shape {
    Any,
    String,
    Integer,
    Number,
    Bool,
    Array,
    Hash(Vec<Field>),
    /// Array whose items are hashes validated by the nested fields.
    Each(Vec<Field>),
}

impl Shape {
    fn mismatch(&self, value: &Value) -> Option<&'static str> {
        let matches = match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Array | Self::Each(_) => value.is_array(),
            Self::Hash(_) => value.is_object(),
        };
        if matches {
            return None;
        }
        Some(match self {
            Self::Any => "any?",
            Self::String => "str?",
            Self::Integer => "int?",
            Self::Number => "number?",
            Self::Bool => "bool?",
            Self::Array | Self::Each(_) => "array?",
            Self::Hash(_) => "hash?",
        })
    }
}

/// Value predicate with its message key.
#[derive(Debug, Clone)]
pub enum Check {
    Filled,
    MinSize(usize),
    MaxSize(usize),
    Size { min: usize, max: usize },
    Gt(Number),
    Gteq(Number),
    Lt(Number),
    Lteq(Number),
    Format(Regex),
    IncludedIn(Vec<Value>),
}

type Failure = (&'static str, Vec<(&'static str, String)>);

impl Check {
    fn evaluate(&self, value: &Value) -> Option<Failure> {
        match self {
            Self::Filled => is_empty(value).then(|| ("filled?", Vec::new())),
            Self::MinSize(min) => size_of(value)
                .filter(|size| size < min)
                .map(|_| ("min_size?", vec![("num", min.to_string())])),
            Self::MaxSize(max) => size_of(value)
                .filter(|size| size > max)
                .map(|_| ("max_size?", vec![("num", max.to_string())])),
            Self::Size { min, max } => size_of(value)
                .filter(|size| size < min || size > max)
                .map(|_| {
                    (
                        "size?.range",
                        vec![("size_left", min.to_string()), ("size_right", max.to_string())],
                    )
                }),
            Self::Gt(bound) => compare(value, bound, "gt?", |actual, limit| actual > limit),
            Self::Gteq(bound) => compare(value, bound, "gteq?", |actual, limit| actual >= limit),
            Self::Lt(bound) => compare(value, bound, "lt?", |actual, limit| actual < limit),
            Self::Lteq(bound) => compare(value, bound, "lteq?", |actual, limit| actual <= limit),
            Self::Format(pattern) => value
                .as_str()
                .filter(|text| !pattern.is_match(text))
                .map(|_| ("format?", Vec::new())),
            Self::IncludedIn(allowed) => (!allowed.contains(value)).then(|| {
                let list = allowed
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                ("included_in?", vec![("list", list)])
            }),
        }
    }
}

/// One declared input key with its structural rules.
#[derive(Debug, Clone)]
pub struct Field {
    key: String,
    presence: Presence,
    shape: Shape,
    nullable: bool,
    checks: Vec<Check>,
}

impl Field {
    pub fn required(key: impl Into<String>) -> Self {
        Self::declare(key, Presence::Required)
    }

    pub fn optional(key: impl Into<String>) -> Self {
        Self::declare(key, Presence::Optional)
    }

    fn declare(key: impl Into<String>, presence: Presence) -> Self {
        Self {
            key: key.into(),
            presence,
            shape: Shape::Any,
            nullable: false,
            checks: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn string(self) -> Self {
        self.shaped(Shape::String)
    }

    pub fn integer(self) -> Self {
        self.shaped(Shape::Integer)
    }

    pub fn number(self) -> Self {
        self.shaped(Shape::Number)
    }

    pub fn boolean(self) -> Self {
        self.shaped(Shape::Bool)
    }

    pub fn array(self) -> Self {
        self.shaped(Shape::Array)
    }

    pub fn hash(self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.shaped(Shape::Hash(fields.into_iter().collect()))
    }

    pub fn each(self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.shaped(Shape::Each(fields.into_iter().collect()))
    }

    /// Accepts `null` (and the empty string) for a present key.
    pub fn maybe(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn filled(self) -> Self {
        self.checked(Check::Filled)
    }

    pub fn min_size(self, min: usize) -> Self {
        self.checked(Check::MinSize(min))
    }

    pub fn max_size(self, max: usize) -> Self {
        self.checked(Check::MaxSize(max))
    }

    pub fn size(self, min: usize, max: usize) -> Self {
        self.checked(Check::Size { min, max })
    }

    pub fn gt(self, bound: impl Into<Number>) -> Self {
        self.checked(Check::Gt(bound.into()))
    }

    pub fn gteq(self, bound: impl Into<Number>) -> Self {
        self.checked(Check::Gteq(bound.into()))
    }

    pub fn lt(self, bound: impl Into<Number>) -> Self {
        self.checked(Check::Lt(bound.into()))
    }

    pub fn lteq(self, bound: impl Into<Number>) -> Self {
        self.checked(Check::Lteq(bound.into()))
    }

    pub fn format(self, pattern: Regex) -> Self {
        self.checked(Check::Format(pattern))
    }

    pub fn included_in<V: Into<Value>>(self, allowed: impl IntoIterator<Item = V>) -> Self {
        self.checked(Check::IncludedIn(allowed.into_iter().map(Into::into).collect()))
    }

    fn shaped(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    fn checked(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Records the first structural failure of this field into `errors`.
    pub(crate) fn validate(&self, input: &Attributes, translator: &Translator, errors: &mut ErrorMap) {
        match input.get(&self.key) {
            None if self.presence == Presence::Required => {
                errors.push(&self.key, message(translator, ("key?", Vec::new())));
            }
            None => {}
            Some(value) => {
                if let Some(node) = self.check_value(value, translator) {
                    errors.insert(&self.key, node);
                }
            }
        }
    }

    fn check_value(&self, value: &Value, translator: &Translator) -> Option<ErrorNode> {
        let fail = |failure: Failure| Some(ErrorNode::Messages(vec![message(translator, failure)]));

        if self.nullable && is_blank(value) {
            return None;
        }
        if is_empty(value) && self.checks.iter().any(|check| matches!(check, Check::Filled)) {
            return fail(("filled?", Vec::new()));
        }
        if let Some(key) = self.shape.mismatch(value) {
            return fail((key, Vec::new()));
        }

        match (&self.shape, value) {
            (Shape::Hash(fields), Value::Object(nested)) => {
                let nested_errors = validate_fields(fields, nested, translator);
                if !nested_errors.is_empty() {
                    return Some(ErrorNode::Nested(nested_errors));
                }
            }
            (Shape::Each(fields), Value::Array(items)) => {
                let mut indexed = BTreeMap::new();
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(nested) => {
                            let nested_errors = validate_fields(fields, nested, translator);
                            if !nested_errors.is_empty() {
                                indexed.insert(index, ErrorNode::Nested(nested_errors));
                            }
                        }
                        _ => {
                            let node = ErrorNode::Messages(vec![message(
                                translator,
                                ("hash?", Vec::new()),
                            )]);
                            indexed.insert(index, node);
                        }
                    }
                }
                if !indexed.is_empty() {
                    return Some(ErrorNode::Indexed(indexed));
                }
            }
            _ => {}
        }

        self.checks
            .iter()
            .find_map(|check| check.evaluate(value))
            .and_then(fail)
    }
}

/// Validates `fields` in declaration order against `input`.
pub(crate) fn validate_fields(fields: &[Field], input: &Attributes, translator: &Translator) -> ErrorMap {
    let mut errors = ErrorMap::new();
    for field in fields {
        field.validate(input, translator, &mut errors);
    }
    errors
}

fn message(translator: &Translator, (key, args): Failure) -> ErrorMessage {
    ErrorMessage::new(translator.translate(key, &args).text)
}

fn compare(
    value: &Value,
    bound: &Number,
    key: &'static str,
    holds: impl Fn(f64, f64) -> bool,
) -> Option<Failure> {
    let actual = value.as_f64()?;
    let limit = bound.as_f64()?;
    (!holds(actual, limit)).then(|| (key, vec![("num", bound.to_string())]))
}

fn size_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(entries) => Some(entries.len()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_fields, Field};
    use crate::contract::i18n::Translator;
    use serde_json::{json, Value};

    fn check(fields: &[Field], value: Value) -> Value {
        let Value::Object(input) = value else {
            panic!("fixture must be an object");
        };
        validate_fields(fields, &input, &Translator::default()).to_value()
    }

    #[test]
    fn nested_hash_reports_per_subkey_entries() {
        let fields = [Field::required("address").hash([
            Field::required("street").string(),
            Field::required("city").string(),
        ])];

        assert_eq!(
            check(&fields, json!({"address": {}})),
            json!({"address": {"street": ["is missing"], "city": ["is missing"]}})
        );
        assert_eq!(
            check(&fields, json!({})),
            json!({"address": ["is missing"]})
        );
        assert_eq!(
            check(&fields, json!({"address": "Main St"})),
            json!({"address": ["must be a hash"]})
        );
    }

    #[test]
    fn array_of_hashes_reports_invalid_indexes_only() {
        let fields = [Field::required("stops").each([Field::required("name").string()])];

        assert_eq!(check(&fields, json!({"stops": []})), json!({}));
        assert_eq!(
            check(&fields, json!({"stops": [{"name": "a"}, {"name": 1}, 7]})),
            json!({"stops": {"1": {"name": ["must be a string"]}, "2": ["must be a hash"]}})
        );
    }

    #[test]
    fn maybe_accepts_null_and_empty_string() {
        let fields = [Field::required("note").string().maybe().min_size(3)];
        assert_eq!(check(&fields, json!({"note": null})), json!({}));
        assert_eq!(check(&fields, json!({"note": ""})), json!({}));
        assert_eq!(
            check(&fields, json!({"note": "ab"})),
            json!({"note": ["size cannot be less than 3"]})
        );
    }

    #[test]
    fn filled_runs_before_type_check() {
        let fields = [Field::required("tags").array().filled()];
        assert_eq!(
            check(&fields, json!({"tags": []})),
            json!({"tags": ["must be filled"]})
        );
        assert_eq!(
            check(&fields, json!({"tags": null})),
            json!({"tags": ["must be filled"]})
        );
    }

    #[test]
    fn filled_only_rejects_the_empty_string() {
        let fields = [Field::required("name").string().filled()];
        assert_eq!(
            check(&fields, json!({"name": ""})),
            json!({"name": ["must be filled"]})
        );
        assert_eq!(check(&fields, json!({"name": "   "})), json!({}));
    }

    #[test]
    fn range_and_inclusion_messages_interpolate_arguments() {
        let fields = [
            Field::required("code").string().size(2, 3),
            Field::required("kind").included_in(["car", "bike"]),
            Field::required("ratio").number().lteq(1),
        ];
        assert_eq!(
            check(&fields, json!({"code": "abcd", "kind": "bus", "ratio": 1.5})),
            json!({
                "code": ["size must be within 2 - 3"],
                "kind": ["must be one of: car, bike"],
                "ratio": ["must be less than or equal to 1"]
            })
        );
    }
}
