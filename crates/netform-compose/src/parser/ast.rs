//! Syntax tree for `.nf` templates.
//!
//! A template is a single map of attributes. Values are limited to the
//! fixed set of shapes environments need: strings, integers, booleans,
//! lists, and nested maps.

use std::collections::BTreeMap;

/// An ordered-by-key attribute map.
pub type Block = BTreeMap<String, Value>;

/// Root node of a parsed `.nf` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    /// Top-level attributes.
    pub attributes: Block,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A string literal.
    String(String),
    /// An integer literal.
    Integer(i64),
    /// `true` or `false`.
    Bool(bool),
    /// `[ ... ]`.
    List(Vec<Value>),
    /// `{ ... }`.
    Map(Block),
}

impl Value {
    /// Returns a short name for the value's shape, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Returns the inner map, if this value is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&Block> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}
