//! Input contracts: structural field rules plus cross-field business rules.
//!
//! # Responsibility
//! - Validate an attribute mapping against declared [`Field`]s in order.
//! - Run business rules only over keys that passed structural validation.
//! - Produce a locale-resolved [`ErrorMap`].
//!
//! # Invariants
//! - Structural validation always runs before any business rule.
//! - A rule referencing a key with structural errors is skipped.
//!
//! # See also
//! - `crate::interactor` runs contracts as pipeline steps.

use crate::model::entity::Attributes;
use log::debug;

pub mod errors;
pub mod i18n;
pub mod schema;

pub use errors::{ErrorMap, ErrorMessage, ErrorNode, BASE_KEY};
pub use i18n::{Catalog, CatalogError, Resolved, Translator, DEFAULT_LOCALE};
pub use schema::{Check, Field, Presence, Shape};

type RuleFn = dyn Fn(&Attributes, &mut RuleContext<'_>);

struct Rule {
    name: String,
    keys: Vec<String>,
    check: Box<RuleFn>,
}

/// Ordered structural fields and business rules for one input shape.
pub struct Contract {
    name: String,
    fields: Vec<Field>,
    rules: Vec<Rule>,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a business rule over `keys`.
    ///
    /// The rule receives the whole input and reports failures through the
    /// [`RuleContext`]. An empty `keys` list means the rule always runs.
    pub fn rule<F>(mut self, name: impl Into<String>, keys: &[&str], check: F) -> Self
    where
        F: Fn(&Attributes, &mut RuleContext<'_>) + 'static,
    {
        self.rules.push(Rule {
            name: name.into(),
            keys: keys.iter().map(|key| key.to_string()).collect(),
            check: Box::new(check),
        });
        self
    }

    pub fn validate(&self, input: &Attributes, translator: &Translator) -> Validation {
        let mut errors = schema::validate_fields(&self.fields, input, translator);
        let structural = errors.len();

        for rule in &self.rules {
            if rule.keys.iter().any(|key| errors.contains(key)) {
                debug!(
                    "event=contract_rule module=contract status=skipped contract={} rule={}",
                    self.name, rule.name
                );
                continue;
            }
            let mut ctx = RuleContext {
                translator,
                failures: Vec::new(),
            };
            (rule.check)(input, &mut ctx);
            for (key, message) in ctx.failures {
                errors.push(&key, message);
            }
        }

        debug!(
            "event=contract_check module=contract status={} contract={} structural_errors={} error_keys={}",
            if errors.is_empty() { "ok" } else { "failure" },
            self.name,
            structural,
            errors.len()
        );
        Validation { errors }
    }
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("rules", &self.rules.iter().map(|rule| &rule.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of [`Contract::validate`].
#[derive(Debug, Clone, Default)]
pub struct Validation {
    errors: ErrorMap,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn into_errors(self) -> ErrorMap {
        self.errors
    }
}

/// Failure sink handed to business rules.
pub struct RuleContext<'a> {
    translator: &'a Translator,
    failures: Vec<(String, ErrorMessage)>,
}

impl RuleContext<'_> {
    pub fn translator(&self) -> &Translator {
        self.translator
    }

    pub fn failure(&mut self, key: &str, message: RuleMessage) {
        let resolved = message.resolve(self.translator);
        self.failures.push((key.to_string(), resolved));
    }

    /// Failure about the input as a whole, keyed under [`BASE_KEY`].
    pub fn base_failure(&mut self, message: RuleMessage) {
        self.failure(BASE_KEY, message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MessageSource {
    Text(String),
    Key(String),
}

/// Rule failure message: literal text or a catalog key, with optional code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMessage {
    source: MessageSource,
    code: Option<String>,
    args: Vec<(String, String)>,
}

impl RuleMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_source(MessageSource::Text(text.into()))
    }

    /// Message resolved through the active translator.
    pub fn key(key: impl Into<String>) -> Self {
        Self::from_source(MessageSource::Key(key.into()))
    }

    fn from_source(source: MessageSource) -> Self {
        Self {
            source,
            code: None,
            args: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.args.push((name.into(), value.to_string()));
        self
    }

    fn resolve(self, translator: &Translator) -> ErrorMessage {
        let text = match self.source {
            MessageSource::Text(text) => text,
            MessageSource::Key(key) => {
                let args: Vec<(&str, String)> = self
                    .args
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.clone()))
                    .collect();
                translator.translate(&key, &args).text
            }
        };
        match self.code {
            Some(code) => ErrorMessage::new(text).with_code(code),
            None => ErrorMessage::new(text),
        }
    }
}
