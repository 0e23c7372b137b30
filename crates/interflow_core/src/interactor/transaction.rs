//! Nested per-backend-kind transactions around a pipeline run.
//!
//! # Invariants
//! - One layer per distinct [`BackendKind`], in first-declaration order.
//! - The first declared kind is the outermost layer.
//! - A failed or aborted run rolls back every entered layer, innermost first,
//!   and the run's result is returned unchanged.
//! - A layer whose commit fails is rolled back before the error propagates,
//!   so every outer layer rolls back too.
//! - With no backends the body runs unwrapped.

use super::error::InteractorError;
use super::step::Outcome;
use crate::persistence::{BackendKind, Transactional};
use log::{debug, warn};

pub type PipelineResult = Result<Outcome, InteractorError>;

type Body<'a> = Box<dyn FnOnce() -> PipelineResult + 'a>;

/// Keeps the first backend seen for each kind, preserving order.
pub fn distinct_kinds<'a>(
    backends: impl IntoIterator<Item = &'a dyn Transactional>,
) -> Vec<&'a dyn Transactional> {
    let mut seen: Vec<BackendKind> = Vec::new();
    let mut distinct = Vec::new();
    for backend in backends {
        let kind = backend.kind();
        if !seen.contains(&kind) {
            seen.push(kind);
            distinct.push(backend);
        }
    }
    distinct
}

/// Runs `body` inside one transaction per distinct backend kind.
pub fn within_transactions<'a>(
    backends: &[&'a dyn Transactional],
    body: impl FnOnce() -> PipelineResult + 'a,
) -> PipelineResult {
    let layers = distinct_kinds(backends.iter().copied());
    debug!(
        "event=tx_plan module=interactor status=ok layers={}",
        layers.len()
    );
    let terminal: Body<'a> = Box::new(body);
    let wrapped = layers
        .into_iter()
        .rev()
        .fold(terminal, |inner, backend| -> Body<'a> {
            Box::new(move || run_within(backend, inner))
        });
    wrapped()
}

fn run_within(backend: &dyn Transactional, inner: Body<'_>) -> PipelineResult {
    let kind = backend.kind();
    backend
        .begin()
        .map_err(|source| InteractorError::Transaction {
            kind: kind.name(),
            source,
        })?;
    debug!(
        "event=tx_begin module=interactor status=ok backend={}",
        kind.name()
    );

    let result = inner();
    match &result {
        Ok(Outcome::Success(_)) => {
            if let Err(source) = backend.commit() {
                warn!(
                    "event=tx_commit module=interactor status=error backend={} error={}",
                    kind.name(),
                    source
                );
                // A failed commit leaves the layer open.
                roll_back(backend, kind);
                return Err(InteractorError::Transaction {
                    kind: kind.name(),
                    source,
                });
            }
            debug!(
                "event=tx_commit module=interactor status=ok backend={}",
                kind.name()
            );
        }
        Ok(Outcome::Failure(_)) | Err(_) => roll_back(backend, kind),
    }
    result
}

fn roll_back(backend: &dyn Transactional, kind: BackendKind) {
    match backend.rollback() {
        Ok(()) => debug!(
            "event=tx_rollback module=interactor status=ok backend={}",
            kind.name()
        ),
        Err(err) => warn!(
            "event=tx_rollback module=interactor status=error backend={} error={}",
            kind.name(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{distinct_kinds, within_transactions};
    use crate::db::DbResult;
    use crate::interactor::step::Outcome;
    use crate::model::entity::Attributes;
    use crate::persistence::{BackendKind, Transactional};
    use std::cell::RefCell;

    struct Alpha;
    struct Beta;

    struct Recorder<'a, K> {
        label: &'static str,
        journal: &'a RefCell<Vec<String>>,
        kind: std::marker::PhantomData<K>,
    }

    impl<'a, K> Recorder<'a, K> {
        fn new(label: &'static str, journal: &'a RefCell<Vec<String>>) -> Self {
            Self {
                label,
                journal,
                kind: std::marker::PhantomData,
            }
        }

        fn note(&self, event: &str) {
            self.journal
                .borrow_mut()
                .push(format!("{}:{event}", self.label));
        }
    }

    impl<K: 'static> Transactional for Recorder<'_, K> {
        fn kind(&self) -> BackendKind {
            BackendKind::of::<K>()
        }

        fn begin(&self) -> DbResult<()> {
            self.note("begin");
            Ok(())
        }

        fn commit(&self) -> DbResult<()> {
            self.note("commit");
            Ok(())
        }

        fn rollback(&self) -> DbResult<()> {
            self.note("rollback");
            Ok(())
        }
    }

    #[test]
    fn first_declared_kind_is_outermost() {
        let journal = RefCell::new(Vec::new());
        let a = Recorder::<Alpha>::new("a", &journal);
        let b = Recorder::<Beta>::new("b", &journal);

        let result = within_transactions(&[&a, &b], || {
            journal.borrow_mut().push("body".into());
            Ok(Outcome::Success(Attributes::new()))
        })
        .expect("pipeline should succeed");

        assert!(result.is_success());
        assert_eq!(
            journal.into_inner(),
            vec!["a:begin", "b:begin", "body", "b:commit", "a:commit"]
        );
    }

    #[test]
    fn repeated_kinds_collapse_to_first_occurrence() {
        let journal = RefCell::new(Vec::new());
        let first = Recorder::<Alpha>::new("first", &journal);
        let other = Recorder::<Beta>::new("other", &journal);
        let second = Recorder::<Alpha>::new("second", &journal);

        let backends: [&dyn Transactional; 3] = [&first, &other, &second];
        let kinds = distinct_kinds(backends);
        assert_eq!(kinds.len(), 2);

        within_transactions(&backends, || {
            Ok(Outcome::Success(Attributes::new()))
        })
        .expect("pipeline should succeed");
        let events = journal.into_inner();
        assert_eq!(events.iter().filter(|e| e.ends_with(":begin")).count(), 2);
        assert!(!events.iter().any(|e| e.starts_with("second:")));
    }

    #[test]
    fn failure_rolls_back_inner_first_and_keeps_content() {
        let journal = RefCell::new(Vec::new());
        let a = Recorder::<Alpha>::new("a", &journal);
        let b = Recorder::<Beta>::new("b", &journal);
        let mut content = Attributes::new();
        content.insert("reason".into(), "declined".into());
        let expected = content.clone();

        let result = within_transactions(&[&a, &b], move || Ok(Outcome::Failure(content)))
            .expect("failure is not an error");

        assert_eq!(result, Outcome::Failure(expected));
        assert_eq!(
            journal.into_inner(),
            vec!["a:begin", "b:begin", "b:rollback", "a:rollback"]
        );
    }

    #[test]
    fn no_backends_runs_body_unwrapped() {
        let result = within_transactions(&[], || Ok(Outcome::Success(Attributes::new())))
            .expect("pipeline should succeed");
        assert!(result.is_success());
    }
}
