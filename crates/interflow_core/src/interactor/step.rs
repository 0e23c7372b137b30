//! Pipeline steps, their outcomes, and the context handed to business code.

use crate::contract::{Contract, Translator};
use crate::model::entity::Attributes;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::RepositoryHandle;
use log::debug;
use serde_json::Value;

/// Key under which contract failures are merged into the state.
pub const ERRORS_KEY: &str = "errors";

/// Result of one step: the next state, or the terminal failure state.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Attributes),
    Failure(Attributes),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Self::Success(attributes) | Self::Failure(attributes) => attributes,
        }
    }

    pub fn into_attributes(self) -> Attributes {
        match self {
            Self::Success(attributes) | Self::Failure(attributes) => attributes,
        }
    }
}

impl From<RepoError> for Outcome {
    fn from(err: RepoError) -> Self {
        Self::Failure(err.to_attributes())
    }
}

impl From<RepoResult<Attributes>> for Outcome {
    fn from(result: RepoResult<Attributes>) -> Self {
        match result {
            Ok(attributes) => Self::Success(attributes),
            Err(err) => err.into(),
        }
    }
}

pub(crate) type StepFn = dyn Fn(&Context<'_>, Attributes) -> Outcome;

pub(crate) enum Step {
    Business { name: String, run: Box<StepFn> },
    Contract(Contract),
}

impl Step {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Business { name, .. } => name,
            Self::Contract(contract) => contract.name(),
        }
    }

    pub(crate) fn run(&self, ctx: &Context<'_>, state: Attributes) -> Outcome {
        match self {
            Self::Business { run, .. } => run(ctx, state),
            Self::Contract(contract) => {
                let validation = contract.validate(&state, ctx.translator());
                if validation.is_valid() {
                    return Outcome::Success(state);
                }
                let mut state = state;
                state.insert(ERRORS_KEY.to_string(), validation.errors().to_value());
                Outcome::Failure(state)
            }
        }
    }
}

pub(crate) struct ResolvedRepository {
    pub(crate) name: String,
    pub(crate) handle: Box<dyn RepositoryHandle>,
}

/// Per-invocation view given to business steps.
pub struct Context<'a> {
    interactor: &'a str,
    repositories: &'a [ResolvedRepository],
    translator: &'a Translator,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        interactor: &'a str,
        repositories: &'a [ResolvedRepository],
        translator: &'a Translator,
    ) -> Self {
        Self {
            interactor,
            repositories,
            translator,
        }
    }

    pub fn interactor(&self) -> &str {
        self.interactor
    }

    /// Repository resolved under `name`, downcast to its concrete type.
    ///
    /// Returns `None` when no repository has that name or the type differs.
    pub fn repository<R: 'static>(&self, name: &str) -> Option<&R> {
        let found = self
            .repositories
            .iter()
            .find(|repository| repository.name == name)
            .and_then(|repository| repository.handle.as_any().downcast_ref::<R>());
        if found.is_none() {
            debug!(
                "event=repository_lookup module=interactor status=miss interactor={} name={}",
                self.interactor, name
            );
        }
        found
    }

    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.repositories.iter().map(|repository| repository.name.as_str())
    }

    pub fn translator(&self) -> &Translator {
        self.translator
    }
}

/// Builds a failure state `{key: [message]}` under `errors`.
pub fn failure_with(key: &str, message: impl Into<String>) -> Outcome {
    let mut errors = serde_json::Map::new();
    errors.insert(
        key.to_string(),
        Value::Array(vec![Value::String(message.into())]),
    );
    let mut state = Attributes::new();
    state.insert(ERRORS_KEY.to_string(), Value::Object(errors));
    Outcome::Failure(state)
}
