//! Locale-keyed message catalog with explicit default-locale fallback.
//!
//! # Responsibility
//! - Hold translation tables keyed by locale and dotted message key.
//! - Resolve a key for the active locale, falling back to the default locale
//!   and reporting when that happened.
//!
//! # Invariants
//! - The default locale is always consulted last, never first.
//! - Resolution never fails: an unknown key resolves to the key itself.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_LOCALE: &str = "en";

const EN: &[(&str, &str)] = &[
    ("key?", "is missing"),
    ("str?", "must be a string"),
    ("int?", "must be an integer"),
    ("number?", "must be a number"),
    ("bool?", "must be boolean"),
    ("array?", "must be an array"),
    ("hash?", "must be a hash"),
    ("filled?", "must be filled"),
    ("min_size?", "size cannot be less than %{num}"),
    ("max_size?", "size cannot be greater than %{num}"),
    ("size?.range", "size must be within %{size_left} - %{size_right}"),
    ("gt?", "must be greater than %{num}"),
    ("gteq?", "must be greater than or equal to %{num}"),
    ("lt?", "must be less than %{num}"),
    ("lteq?", "must be less than or equal to %{num}"),
    ("format?", "is in invalid format"),
    ("included_in?", "must be one of: %{list}"),
];

const PT_BR: &[(&str, &str)] = &[
    ("key?", "está faltando"),
    ("str?", "deve ser um texto"),
    ("int?", "deve ser um número inteiro"),
    ("number?", "deve ser um número"),
    ("bool?", "deve ser booleano"),
    ("array?", "deve ser uma lista"),
    ("hash?", "deve ser um objeto"),
    ("filled?", "deve ser preenchido"),
    ("min_size?", "o tamanho não pode ser menor que %{num}"),
    ("max_size?", "o tamanho não pode ser maior que %{num}"),
    ("size?.range", "o tamanho deve estar entre %{size_left} e %{size_right}"),
    ("gt?", "deve ser maior que %{num}"),
    ("gteq?", "deve ser maior ou igual a %{num}"),
    ("lt?", "deve ser menor que %{num}"),
    ("lteq?", "deve ser menor ou igual a %{num}"),
    ("format?", "está em formato inválido"),
    ("included_in?", "deve ser um de: %{list}"),
];

// Partial table: format/inclusion messages resolve through the default locale.
const ES: &[(&str, &str)] = &[
    ("key?", "falta"),
    ("str?", "debe ser una cadena"),
    ("int?", "debe ser un entero"),
    ("number?", "debe ser un número"),
    ("bool?", "debe ser booleano"),
    ("array?", "debe ser una lista"),
    ("hash?", "debe ser un objeto"),
    ("filled?", "debe estar lleno"),
    ("min_size?", "el tamaño no puede ser menor que %{num}"),
    ("max_size?", "el tamaño no puede ser mayor que %{num}"),
    ("size?.range", "el tamaño debe estar entre %{size_left} y %{size_right}"),
    ("gt?", "debe ser mayor que %{num}"),
    ("gteq?", "debe ser mayor o igual que %{num}"),
    ("lt?", "debe ser menor que %{num}"),
    ("lteq?", "debe ser menor o igual que %{num}"),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("translation table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("translation table for `{0}` must be a JSON object")]
    NotAnObject(String),
    #[error("translation `{key}` for `{locale}` must be a string")]
    NotAString { locale: String, key: String },
}

/// Message text resolved for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub text: String,
    /// Locale whose table supplied the text.
    pub locale: String,
    /// `true` when the active locale had no entry and the default was used.
    pub fell_back: bool,
}

/// Translation tables keyed by locale.
#[derive(Debug, Clone)]
pub struct Catalog {
    default_locale: String,
    tables: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    /// Empty catalog with the given default locale.
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            tables: HashMap::new(),
        }
    }

    /// Catalog preloaded with structural validation messages for `en`,
    /// `pt-BR` and `es`.
    pub fn builtin() -> Self {
        let mut catalog = Self::new(DEFAULT_LOCALE);
        for (locale, table) in [("en", EN), ("pt-BR", PT_BR), ("es", ES)] {
            for (key, text) in table {
                catalog.insert(locale, *key, *text);
            }
        }
        catalog
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn insert(&mut self, locale: &str, key: impl Into<String>, text: impl Into<String>) {
        self.tables
            .entry(locale.to_string())
            .or_default()
            .insert(key.into(), text.into());
    }

    /// Merges a nested JSON table into `locale`, flattening nested objects
    /// into dotted keys (`{"rules": {"age": "..."}}` -> `rules.age`).
    pub fn load_json(&mut self, locale: &str, json: &str) -> Result<(), CatalogError> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(entries) = value else {
            return Err(CatalogError::NotAnObject(locale.to_string()));
        };
        let mut flat = Vec::new();
        flatten(locale, "", &Value::Object(entries), &mut flat)?;
        for (key, text) in flat {
            self.insert(locale, key, text);
        }
        Ok(())
    }

    /// Looks `key` up in `locale`, then in the default locale.
    pub fn lookup(&self, locale: &str, key: &str) -> Option<Resolved> {
        if let Some(text) = self.tables.get(locale).and_then(|table| table.get(key)) {
            return Some(Resolved {
                text: text.clone(),
                locale: locale.to_string(),
                fell_back: false,
            });
        }
        self.tables
            .get(&self.default_locale)
            .and_then(|table| table.get(key))
            .map(|text| Resolved {
                text: text.clone(),
                locale: self.default_locale.clone(),
                fell_back: locale != self.default_locale,
            })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn flatten(
    locale: &str,
    prefix: &str,
    value: &Value,
    out: &mut Vec<(String, String)>,
) -> Result<(), CatalogError> {
    match value {
        Value::Object(entries) => {
            for (key, nested) in entries {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(locale, &path, nested, out)?;
            }
            Ok(())
        }
        Value::String(text) => {
            out.push((prefix.to_string(), text.clone()));
            Ok(())
        }
        _ => Err(CatalogError::NotAString {
            locale: locale.to_string(),
            key: prefix.to_string(),
        }),
    }
}

/// Catalog bound to an active locale.
#[derive(Debug, Clone)]
pub struct Translator {
    catalog: Arc<Catalog>,
    locale: String,
}

impl Translator {
    pub fn new(catalog: Arc<Catalog>, locale: impl Into<String>) -> Self {
        Self {
            catalog,
            locale: locale.into(),
        }
    }

    /// Same catalog, different active locale.
    pub fn with_locale(&self, locale: impl Into<String>) -> Self {
        Self::new(Arc::clone(&self.catalog), locale)
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolves `key` and interpolates `%{name}` placeholders from `args`.
    pub fn translate(&self, key: &str, args: &[(&str, String)]) -> Resolved {
        let mut resolved = self.catalog.lookup(&self.locale, key).unwrap_or_else(|| Resolved {
            text: key.to_string(),
            locale: self.locale.clone(),
            fell_back: false,
        });
        for (name, value) in args {
            resolved.text = resolved.text.replace(&format!("%{{{name}}}"), value);
        }
        resolved
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(Arc::new(Catalog::builtin()), DEFAULT_LOCALE)
    }
}
