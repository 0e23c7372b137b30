//! Interactors: ordered business and contract steps run inside nested
//! backend transactions, producing an exposed-attribute-checked response.
//!
//! # Responsibility
//! - Validate the declaration (exposed attributes, repository names) before
//!   any step runs.
//! - Resolve repositories from their factories once per call.
//! - Run steps in order, stopping at the first failure.
//!
//! # Invariants
//! - Declaration defects are returned as [`InteractorError`], never as a
//!   failed [`Response`].
//! - Business failures are returned as failed responses, never as errors.
//! - Repositories are request-scoped: factories run on every call.
//! - Repositories of one backend kind share one store, since they share one
//!   transaction layer.
//!
//! # See also
//! - `transaction` for the nesting order of backend transactions.

use crate::contract::{Contract, Translator};
use crate::model::entity::Attributes;
use crate::persistence::BackendKind;
use crate::repo::error::RepoResult;
use crate::repo::{RepositoryHandle, REPOSITORY_SUFFIX};
use crate::response::Response;
use log::{debug, error, info};
use std::time::Instant;

pub mod error;
pub mod output;
pub mod step;
pub mod transaction;

pub use error::InteractorError;
pub use output::OutputHandler;
pub use step::{failure_with, Context, Outcome, ERRORS_KEY};
pub use transaction::{distinct_kinds, within_transactions, PipelineResult};

use step::{ResolvedRepository, Step};

type RepositoryFactory = dyn Fn(&Attributes) -> RepoResult<Box<dyn RepositoryHandle>>;

struct RepositoryBinding {
    name: String,
    factory: Box<RepositoryFactory>,
}

/// Immutable pipeline declaration; call it any number of times.
pub struct Interactor {
    name: String,
    exposed: Vec<String>,
    repositories: Vec<RepositoryBinding>,
    steps: Vec<Step>,
    translator: Translator,
}

impl Interactor {
    pub fn builder(name: impl Into<String>) -> InteractorBuilder {
        InteractorBuilder {
            interactor: Interactor {
                name: name.into(),
                exposed: Vec::new(),
                repositories: Vec::new(),
                steps: Vec::new(),
                translator: Translator::default(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exposed(&self) -> &[String] {
        &self.exposed
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(Step::name)
    }

    /// Runs the pipeline over `input`.
    ///
    /// # Errors
    /// - [`InteractorError::MissingExposedAttributes`] when nothing is exposed.
    /// - [`InteractorError::InvalidRepository`] when a repository name lacks the
    ///   `_repository` suffix or its factory fails.
    /// - [`InteractorError::UnsetExposedAttributes`] when a successful run
    ///   leaves exposed keys unset.
    /// - [`InteractorError::Transaction`] when a backend cannot begin or commit.
    pub fn call(&self, input: Attributes) -> Result<Response, InteractorError> {
        let started_at = Instant::now();
        info!(
            "event=interactor_call module=interactor status=start interactor={} steps={} repositories={}",
            self.name,
            self.steps.len(),
            self.repositories.len()
        );

        let result = self.run(input);
        let elapsed_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(response) if response.is_success() => info!(
                "event=interactor_call module=interactor status=ok interactor={} duration_ms={}",
                self.name, elapsed_ms
            ),
            Ok(_) => info!(
                "event=interactor_call module=interactor status=failure interactor={} duration_ms={}",
                self.name, elapsed_ms
            ),
            Err(err) => error!(
                "event=interactor_call module=interactor status=error interactor={} duration_ms={} error={}",
                self.name, elapsed_ms, err
            ),
        }
        result
    }

    fn run(&self, input: Attributes) -> Result<Response, InteractorError> {
        if self.exposed.is_empty() {
            return Err(InteractorError::MissingExposedAttributes(self.name.clone()));
        }
        let repositories = self.resolve_repositories(&input)?;
        let ctx = Context::new(&self.name, &repositories, &self.translator);
        let backends: Vec<_> = repositories
            .iter()
            .map(|repository| repository.handle.transactional())
            .collect();

        let outcome = within_transactions(&backends, || Ok(self.run_steps(&ctx, input)))?;
        OutputHandler::new(&self.exposed).handle(outcome)
    }

    fn resolve_repositories(
        &self,
        input: &Attributes,
    ) -> Result<Vec<ResolvedRepository>, InteractorError> {
        let mut resolved = Vec::with_capacity(self.repositories.len());
        let mut stores: Vec<(BackendKind, usize, &str)> = Vec::new();
        for binding in &self.repositories {
            if !binding.name.ends_with(REPOSITORY_SUFFIX) {
                return Err(InteractorError::InvalidRepository {
                    name: binding.name.clone(),
                    reason: format!("name needs the `{REPOSITORY_SUFFIX}` suffix"),
                });
            }
            let handle =
                (binding.factory)(input).map_err(|err| InteractorError::InvalidRepository {
                    name: binding.name.clone(),
                    reason: err.to_string(),
                })?;
            let backend = handle.transactional();
            if let Some(identity) = backend.store_identity() {
                let kind = backend.kind();
                match stores.iter().find(|(seen, _, _)| *seen == kind) {
                    Some((_, first, owner)) if *first != identity => {
                        return Err(InteractorError::InvalidRepository {
                            name: binding.name.clone(),
                            reason: format!(
                                "uses a different `{}` store than `{owner}`",
                                kind.name()
                            ),
                        });
                    }
                    Some(_) => {}
                    None => stores.push((kind, identity, &binding.name)),
                }
            }
            resolved.push(ResolvedRepository {
                name: binding.name.clone(),
                handle,
            });
        }
        Ok(resolved)
    }

    fn run_steps(&self, ctx: &Context<'_>, input: Attributes) -> Outcome {
        let mut state = input;
        for step in &self.steps {
            match step.run(ctx, state) {
                Outcome::Success(next) => {
                    debug!(
                        "event=step_run module=interactor status=ok interactor={} step={}",
                        self.name,
                        step.name()
                    );
                    state = next;
                }
                failure @ Outcome::Failure(_) => {
                    debug!(
                        "event=step_run module=interactor status=failure interactor={} step={}",
                        self.name,
                        step.name()
                    );
                    return failure;
                }
            }
        }
        Outcome::Success(state)
    }
}

/// Declares an [`Interactor`]. Steps run in the order they are added.
pub struct InteractorBuilder {
    interactor: Interactor,
}

impl InteractorBuilder {
    pub fn expose<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interactor.exposed = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Binds a repository built from the call input.
    ///
    /// The name must end with `_repository`; it is checked on every call
    /// before the factory runs.
    pub fn repository<R, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        R: RepositoryHandle + 'static,
        F: Fn(&Attributes) -> RepoResult<R> + 'static,
    {
        self.interactor.repositories.push(RepositoryBinding {
            name: name.into(),
            factory: Box::new(move |input| {
                factory(input).map(|repository| Box::new(repository) as Box<dyn RepositoryHandle>)
            }),
        });
        self
    }

    pub fn step<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Context<'_>, Attributes) -> Outcome + 'static,
    {
        self.interactor.steps.push(Step::Business {
            name: name.into(),
            run: Box::new(run),
        });
        self
    }

    /// Business step whose repository errors become failures.
    pub fn try_step<F>(self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Context<'_>, Attributes) -> RepoResult<Attributes> + 'static,
    {
        self.step(name, move |ctx, input| Outcome::from(run(ctx, input)))
    }

    /// Validates the current state; failures merge errors under `errors`.
    pub fn contract(mut self, contract: Contract) -> Self {
        self.interactor.steps.push(Step::Contract(contract));
        self
    }

    pub fn translator(mut self, translator: Translator) -> Self {
        self.interactor.translator = translator;
        self
    }

    pub fn build(self) -> Interactor {
        self.interactor
    }
}
