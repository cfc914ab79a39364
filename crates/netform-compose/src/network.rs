//! The network module: one isolated virtual network per environment.
//!
//! Produces the two outputs every dependent resolver consumes: the network's
//! self-link and its plain name.

use netform_common::constants;
use netform_common::error::{NetformError, Result};
use netform_common::types::{ResourceAddress, ResourceKind, RoutingMode};
use serde::{Deserialize, Serialize};

use crate::fields::Fields;

/// Declared inputs of the network module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Cloud project identifier.
    pub project_id: String,
    /// Network name, unique within the project.
    pub network_name: String,
    /// Routing scope; `GLOBAL` when absent.
    pub routing_mode: Option<RoutingMode>,
}

impl NetworkSpec {
    /// Reads the network inputs from an environment's top-level fields.
    ///
    /// Absent names decode as empty strings and are rejected by
    /// [`resolve_network`].
    ///
    /// # Errors
    ///
    /// Returns an error if a field has the wrong type or an unknown routing mode.
    pub fn from_fields(fields: &Fields<'_>) -> Result<Self> {
        Ok(Self {
            project_id: fields.string("project_id")?.unwrap_or_default(),
            network_name: fields.string("network_name")?.unwrap_or_default(),
            routing_mode: fields.parsed("routing_mode")?,
        })
    }
}

/// A resolved network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Cloud project identifier.
    pub project_id: String,
    /// Network name.
    pub name: String,
    /// Effective routing scope.
    pub routing_mode: RoutingMode,
    /// Always `false`: subnets are only ever created explicitly.
    pub auto_create_subnetworks: bool,
}

/// Values the network exposes to dependent resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOutputs {
    /// Fully-qualified reference to the network.
    pub network_self_link: String,
    /// Plain network name.
    pub network_name: String,
}

impl Network {
    /// Returns the network's address in the dependency graph.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Network, &self.name)
    }

    /// Returns the network's self-link.
    #[must_use]
    pub fn self_link(&self) -> String {
        constants::self_link(&constants::network_path(&self.project_id, &self.name))
    }

    /// Returns the outputs consumed by subnet, firewall, and route resolution.
    #[must_use]
    pub fn outputs(&self) -> NetworkOutputs {
        NetworkOutputs {
            network_self_link: self.self_link(),
            network_name: self.name.clone(),
        }
    }

    /// Returns the attribute set recorded in state and compared by plans.
    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::json!({
            "project_id": self.project_id,
            "name": self.name,
            "routing_mode": self.routing_mode,
            "auto_create_subnetworks": self.auto_create_subnetworks,
        })
    }
}

/// Resolves the network module.
///
/// # Errors
///
/// Returns an error if the project identifier or network name is empty.
pub fn resolve_network(spec: &NetworkSpec) -> Result<Network> {
    for (field, value) in [
        ("project_id", &spec.project_id),
        ("network_name", &spec.network_name),
    ] {
        if value.is_empty() {
            return Err(NetformError::MissingField {
                kind: ResourceKind::Network,
                key: spec.network_name.clone(),
                field,
            });
        }
    }

    let network = Network {
        project_id: spec.project_id.clone(),
        name: spec.network_name.clone(),
        routing_mode: spec.routing_mode.unwrap_or_default(),
        auto_create_subnetworks: false,
    };
    tracing::debug!(network = %network.name, routing_mode = %network.routing_mode, "resolved network");
    Ok(network)
}
