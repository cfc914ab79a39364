//! The state document: what has been applied for one environment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use netform_common::constants::STATE_FORMAT_VERSION;
use netform_common::error::{NetformError, Result};
use netform_common::types::ResourceAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent record of one applied resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Self-link returned when the resource was created.
    pub self_link: String,
    /// Attributes as last applied (or refreshed).
    pub attributes: serde_json::Value,
    /// Resources this one was created after.
    #[serde(default)]
    pub depends_on: Vec<ResourceAddress>,
}

/// Persistent state of one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// On-disk format version.
    pub version: u32,
    /// Identity of this state's history; fixed at creation.
    pub lineage: Uuid,
    /// Incremented on every write.
    pub serial: u64,
    /// Environment label the state belongs to.
    pub environment: String,
    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
    /// Applied resources by address.
    #[serde(default)]
    pub resources: BTreeMap<ResourceAddress, ResourceRecord>,
}

impl StateDocument {
    /// Creates an empty state for `environment` with a fresh lineage.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            lineage: Uuid::new_v4(),
            serial: 0,
            environment: environment.into(),
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    /// Checks that the state belongs to `environment` and has a known version.
    ///
    /// # Errors
    ///
    /// Returns [`NetformError::StateMismatch`] for a foreign environment and
    /// [`NetformError::Config`] for an unsupported version.
    pub fn ensure_environment(&self, environment: &str) -> Result<()> {
        if self.version != STATE_FORMAT_VERSION {
            return Err(NetformError::Config {
                message: format!(
                    "unsupported state format version {} (expected {STATE_FORMAT_VERSION})",
                    self.version
                ),
            });
        }
        if self.environment != environment {
            return Err(NetformError::StateMismatch {
                expected: environment.to_string(),
                found: self.environment.clone(),
            });
        }
        Ok(())
    }

    /// Returns the recorded self-links of resources of `kind`, keyed by name.
    #[must_use]
    pub fn self_links(
        &self,
        kind: netform_common::types::ResourceKind,
    ) -> BTreeMap<String, String> {
        self.resources
            .iter()
            .filter(|(address, _)| address.kind() == kind)
            .map(|(address, record)| (address.name().to_string(), record.self_link.clone()))
            .collect()
    }
}
