//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run a small registration pipeline over a JSON object given as the first
//!   argument and print the resulting response as JSON.
//! - Verify `interflow_core` wiring without any external service.

use interflow_core::interactor::failure_with;
use interflow_core::{
    init_logging, Attributes, Contract, CoreConfig, Entity, Field, Interactor, Outcome,
    Repository, RuleMessage, Translator, VolatilePersistence, VolatileStore,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::ExitCode;
use std::rc::Rc;

const DEFAULT_INPUT: &str = r#"{"name": "Ada", "age": 20}"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Person {
    #[serde(default)]
    id: Option<String>,
    name: String,
    age: i64,
}

impl Entity for Person {}

type PersonRepository = Repository<Person, VolatilePersistence<Person>>;

fn registration(store: Rc<VolatileStore>, translator: Translator) -> Interactor {
    Interactor::builder("register_person")
        .translator(translator)
        .expose(["person"])
        .repository("person_repository", move |_input| {
            Ok(PersonRepository::new(VolatilePersistence::new(
                Rc::clone(&store),
                "people",
            )))
        })
        .contract(
            Contract::new("person")
                .field(Field::required("name").string().filled())
                .field(Field::required("age").integer().gt(18))
                .rule("reserved_name", &["name"], |input, ctx| {
                    if input.get("name").and_then(Value::as_str) == Some("root") {
                        ctx.failure("name", RuleMessage::text("is reserved").with_code("reserved"));
                    }
                }),
        )
        .step("create_person", |ctx, mut input| {
            let Some(people) = ctx.repository::<PersonRepository>("person_repository") else {
                return failure_with("base", "person repository unavailable");
            };
            let created = people
                .create(input.clone())
                .and_then(|person| Ok(person.attributes()?));
            match created {
                Ok(person) => {
                    input.insert("person".to_string(), Value::Object(person));
                    Outcome::Success(input)
                }
                Err(err) => err.into(),
            }
        })
        .build()
}

fn main() -> ExitCode {
    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.logging()) {
        eprintln!("logging error: {err}");
        return ExitCode::FAILURE;
    }

    let raw = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_INPUT.to_string());
    let input: Attributes = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("input must be a JSON object: {err}");
            return ExitCode::FAILURE;
        }
    };

    let interactor = registration(VolatileStore::shared(), config.translator());
    match interactor.call(input) {
        Ok(response) => {
            info!(
                "event=cli_run module=cli status={} interactor={}",
                response.status(),
                interactor.name()
            );
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("failed to render response: {err}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("interactor error: {err}");
            ExitCode::FAILURE
        }
    }
}
