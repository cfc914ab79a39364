//! Typed extraction of entry fields from template maps.
//!
//! Every accessor reports failures with the resource kind, the entry key,
//! and the field name so the offending declaration can be located.

use netform_common::error::{NetformError, Result};
use netform_common::types::ResourceKind;

use crate::parser::ast::{Block, Value};

/// Read-only view over one keyed entry of a template collection.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    kind: ResourceKind,
    key: &'a str,
    block: &'a Block,
}

impl<'a> Fields<'a> {
    /// Wraps `block`, rejecting any field not listed in `allowed`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unknown field.
    pub fn new(
        kind: ResourceKind,
        key: &'a str,
        block: &'a Block,
        allowed: &[&str],
    ) -> Result<Self> {
        if let Some(unknown) = block.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(NetformError::InvalidField {
                kind,
                key: key.to_string(),
                field: unknown.clone(),
                message: "unknown field".into(),
            });
        }
        Ok(Self { kind, key, block })
    }

    fn invalid(&self, field: &str, message: impl Into<String>) -> NetformError {
        NetformError::InvalidField {
            kind: self.kind,
            key: self.key.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn expected(&self, field: &str, wanted: &str, got: &Value) -> NetformError {
        self.invalid(field, format!("expected {wanted}, got {}", got.type_name()))
    }

    /// Returns a string field, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a string.
    pub fn string(&self, field: &str) -> Result<Option<String>> {
        match self.block.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.expected(field, "string", other)),
        }
    }

    /// Returns a boolean field, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a boolean.
    pub fn bool(&self, field: &str) -> Result<Option<bool>> {
        match self.block.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.expected(field, "bool", other)),
        }
    }

    /// Returns an integer field, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not an integer.
    pub fn integer(&self, field: &str) -> Result<Option<i64>> {
        match self.block.get(field) {
            None => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(*n)),
            Some(other) => Err(self.expected(field, "integer", other)),
        }
    }

    /// Returns a list of strings, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a list or holds a non-string.
    pub fn string_list(&self, field: &str) -> Result<Option<Vec<String>>> {
        match self.block.get(field) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.expected(field, "list of strings", other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.expected(field, "list", other)),
        }
    }

    /// Returns a list of maps, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a list or holds a non-map.
    pub fn map_list(&self, field: &str) -> Result<Option<Vec<&'a Block>>> {
        let block: &'a Block = self.block;
        match block.get(field) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_map()
                        .ok_or_else(|| self.expected(field, "list of maps", item))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.expected(field, "list", other)),
        }
    }

    /// Parses a string field through `FromStr`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not a string or does not parse.
    pub fn parsed<T>(&self, field: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr<Err = String>,
    {
        self.string(field)?
            .map(|s| s.parse::<T>().map_err(|e| self.invalid(field, e)))
            .transpose()
    }
}

/// Unwraps a required value, reporting a missing-field error otherwise.
///
/// Empty strings count as missing.
///
/// # Errors
///
/// Returns [`NetformError::MissingField`] when `value` is `None` or empty.
pub fn require_string(
    kind: ResourceKind,
    key: &str,
    field: &'static str,
    value: Option<&String>,
) -> Result<String> {
    match value {
        Some(s) if !s.is_empty() => Ok(s.clone()),
        _ => Err(NetformError::MissingField {
            kind,
            key: key.to_string(),
            field,
        }),
    }
}

/// Checks that a priority lies in `0..=MAX_PRIORITY`.
///
/// # Errors
///
/// Returns [`NetformError::MissingField`] when absent and
/// [`NetformError::InvalidField`] when out of range.
pub fn require_priority(kind: ResourceKind, key: &str, value: Option<i64>) -> Result<u32> {
    let raw = value.ok_or_else(|| NetformError::MissingField {
        kind,
        key: key.to_string(),
        field: "priority",
    })?;
    u32::try_from(raw)
        .ok()
        .filter(|p| *p <= netform_common::constants::MAX_PRIORITY)
        .ok_or_else(|| NetformError::InvalidField {
            kind,
            key: key.to_string(),
            field: "priority".into(),
            message: format!(
                "{raw} is outside 0..={}",
                netform_common::constants::MAX_PRIORITY
            ),
        })
}
