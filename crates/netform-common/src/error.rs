//! Unified error types for the netform workspace.
//!
//! The taxonomy separates problems found before any remote call
//! (configuration errors) from problems reported by the cloud API
//! (remote rejections) and from state-handle contention.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ResourceKind;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NetformError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A template or configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required field is absent from a keyed entry.
    #[error("{kind} \"{key}\": missing required field `{field}`")]
    MissingField {
        /// Kind of the entry being resolved.
        kind: ResourceKind,
        /// Map key of the offending entry.
        key: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field is present but its value is unacceptable.
    #[error("{kind} \"{key}\": invalid field `{field}`: {message}")]
    InvalidField {
        /// Kind of the entry being resolved.
        kind: ResourceKind,
        /// Map key of the offending entry.
        key: String,
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The cloud API rejected an operation.
    #[error("remote error on {address}: {message}")]
    Remote {
        /// Address of the resource the operation targeted.
        address: String,
        /// Message returned by the API, verbatim.
        message: String,
    },

    /// The state handle is held by another operation.
    #[error("state at {path} is locked by {holder}")]
    StateLocked {
        /// Lock file path.
        path: PathBuf,
        /// Description of the current holder.
        holder: String,
    },

    /// The persisted state belongs to a different environment.
    #[error("state belongs to environment \"{found}\", expected \"{expected}\"")]
    StateMismatch {
        /// Environment label of the template.
        expected: String,
        /// Environment label recorded in the state.
        found: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl NetformError {
    /// Returns `true` for errors detected before any remote operation.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::MissingField { .. } | Self::InvalidField { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NetformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_kind_key_and_field() {
        let err = NetformError::MissingField {
            kind: ResourceKind::Subnet,
            key: "app".into(),
            field: "region",
        };
        assert_eq!(err.to_string(), "subnet \"app\": missing required field `region`");
        assert!(err.is_configuration());
    }

    #[test]
    fn remote_error_is_not_configuration() {
        let err = NetformError::Remote {
            address: "route.egress".into(),
            message: "quota exceeded".into(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("route.egress"));
    }
}
