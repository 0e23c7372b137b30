mod support;

use interflow_core::{Catalog, Contract, CoreConfig, Field, RuleMessage, Translator};
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use support::attrs;

fn address_contract() -> Contract {
    Contract::new("trace_route")
        .field(Field::required("origin").hash([
            Field::required("street").string().filled(),
            Field::required("number").integer().gteq(1),
            Field::optional("zip_code")
                .string()
                .format(Regex::new(r"^\d{5}-\d{3}$").expect("valid zip regex")),
        ]))
        .field(Field::required("stops").each([Field::required("street").string()]))
        .field(Field::optional("mode").included_in(["driving", "walking"]))
        .rule("distinct_stops", &["origin", "stops"], |input, ctx| {
            let origin = &input["origin"]["street"];
            let repeated = input["stops"]
                .as_array()
                .is_some_and(|stops| stops.iter().any(|stop| &stop["street"] == origin));
            if repeated {
                ctx.failure(
                    "stops",
                    RuleMessage::key("errors.repeated_origin").with_code("REPEATED_ORIGIN"),
                );
            }
        })
}

fn translator(locale: &str) -> Translator {
    let mut catalog = Catalog::builtin();
    catalog
        .load_json(
            "en",
            r#"{"errors": {"repeated_origin": "cannot include the origin"}}"#,
        )
        .expect("catalog json is valid");
    catalog
        .load_json(
            "pt-BR",
            r#"{"errors": {"repeated_origin": "não pode incluir a origem"}}"#,
        )
        .expect("catalog json is valid");
    Translator::new(Arc::new(catalog), locale)
}

#[test]
fn valid_input_has_no_errors() {
    let input = attrs(json!({
        "origin": {"street": "Rua A", "number": 10, "zip_code": "01234-000"},
        "stops": [{"street": "Rua B"}],
        "mode": "walking"
    }));
    assert!(address_contract().validate(&input, &translator("en")).is_valid());
}

#[test]
fn nested_and_indexed_errors_are_field_keyed() {
    let input = attrs(json!({
        "origin": {"street": "", "number": 0, "zip_code": "0123"},
        "stops": [{"street": "Rua B"}, {}],
        "mode": "flying"
    }));
    let validation = address_contract().validate(&input, &translator("en"));

    assert_eq!(
        validation.errors().to_value(),
        json!({
            "origin": {
                "street": ["must be filled"],
                "number": ["must be greater than or equal to 1"],
                "zip_code": ["is in invalid format"]
            },
            "stops": {"1": {"street": ["is missing"]}},
            "mode": ["must be one of: driving, walking"]
        })
    );
}

#[test]
fn empty_stop_list_is_valid_presence() {
    let input = attrs(json!({"origin": {"street": "Rua A", "number": 1}, "stops": []}));
    assert!(address_contract().validate(&input, &translator("en")).is_valid());
}

#[test]
fn business_rule_runs_after_structure_passes_and_is_localized() {
    let input = attrs(json!({
        "origin": {"street": "Rua A", "number": 1},
        "stops": [{"street": "Rua A"}]
    }));

    let english = address_contract().validate(&input, &translator("en"));
    assert_eq!(
        english.errors().to_value(),
        json!({"stops": [{"code": "REPEATED_ORIGIN", "text": "cannot include the origin"}]})
    );

    let portuguese = address_contract().validate(&input, &translator("pt-BR"));
    assert_eq!(
        portuguese.errors().to_value(),
        json!({"stops": [{"code": "REPEATED_ORIGIN", "text": "não pode incluir a origem"}]})
    );
}

#[test]
fn business_rule_is_skipped_when_its_fields_failed() {
    let input = attrs(json!({"origin": {"street": "Rua A"}, "stops": [{"street": "Rua A"}]}));
    let validation = address_contract().validate(&input, &translator("en"));
    assert_eq!(
        validation.errors().to_value(),
        json!({"origin": {"number": ["is missing"]}})
    );
}

#[test]
fn missing_translation_falls_back_to_default_locale() {
    let spanish = translator("es");
    let resolved = spanish.translate("included_in?", &[("list", "a, b".to_string())]);
    assert!(resolved.fell_back);
    assert_eq!(resolved.locale, "en");
    assert_eq!(resolved.text, "must be one of: a, b");

    let native = spanish.translate("key?", &[]);
    assert!(!native.fell_back);
    assert_eq!(native.text, "falta");

    let input = attrs(json!({"origin": {"street": "Rua A", "number": 1}, "stops": [], "mode": "x"}));
    let validation = address_contract().validate(&input, &spanish);
    assert_eq!(validation.errors().texts("mode"), vec!["must be one of: driving, walking"]);
}

#[test]
fn configured_default_locale_drives_fallback() {
    let config = CoreConfig {
        default_locale: "pt-BR".to_string(),
        active_locale: "es".to_string(),
        ..CoreConfig::default()
    };
    let resolved = config.translator().translate("format?", &[]);
    assert!(resolved.fell_back);
    assert_eq!(resolved.text, "está em formato inválido");
}
