//! Domain entity contracts shared by repositories and persistence backends.
//!
//! # Responsibility
//! - Define the attribute-bag shape every entity exports and accepts.
//! - Keep backends agnostic of concrete entity structs.
//!
//! # Invariants
//! - An entity always round-trips through its exported attribute mapping.
//! - Replace/merge operations re-validate the typed shape before mutating.

pub mod entity;
