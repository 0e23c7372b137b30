//! Entity trait and attribute mapping helpers.
//!
//! # Responsibility
//! - Convert typed entities to and from plain attribute mappings.
//! - Provide full replace and partial merge of attributes.
//!
//! # Invariants
//! - `attributes()` output fed to `from_attributes()` yields an equal entity.
//! - A failed replace/merge leaves the entity unchanged.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Plain, insertion-ordered attribute mapping.
pub type Attributes = Map<String, Value>;

/// Conversion failure between an entity and its attribute mapping.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity did not export an attribute mapping")]
    NotAMapping,
    #[error("attributes do not match entity shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Typed attribute bag persisted through repositories.
///
/// Implementors only need serde derives; every method has a default built on
/// the serde representation. Optional attributes should carry
/// `#[serde(default)]` so mappings that omit them are still accepted.
pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    /// Builds an entity from an attribute mapping.
    fn from_attributes(attributes: Attributes) -> Result<Self, EntityError> {
        Ok(serde_json::from_value(Value::Object(attributes))?)
    }

    /// Exports this entity as a plain attribute mapping.
    fn attributes(&self) -> Result<Attributes, EntityError> {
        match serde_json::to_value(self)? {
            Value::Object(attributes) => Ok(attributes),
            _ => Err(EntityError::NotAMapping),
        }
    }

    /// Replaces every attribute with `attributes`.
    fn replace_attributes(&mut self, attributes: Attributes) -> Result<(), EntityError> {
        *self = Self::from_attributes(attributes)?;
        Ok(())
    }

    /// Merges `attributes` over the current ones, keeping keys not mentioned.
    fn assign_attributes(&mut self, attributes: Attributes) -> Result<(), EntityError> {
        let mut merged = self.attributes()?;
        merge_attributes(&mut merged, attributes);
        *self = Self::from_attributes(merged)?;
        Ok(())
    }
}

/// Overwrites keys of `target` with the ones present in `changes`.
pub fn merge_attributes(target: &mut Attributes, changes: Attributes) {
    for (key, value) in changes {
        target.insert(key, value);
    }
}
