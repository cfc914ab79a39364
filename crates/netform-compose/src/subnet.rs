//! Subnet resolution: a keyed map of subnet specs into concrete subnets.

use std::collections::BTreeMap;

use netform_common::constants;
use netform_common::error::Result;
use netform_common::types::{ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::fields::{Fields, require_string};
use crate::parser::ast::Block;

const FIELDS: &[&str] = &[
    "region",
    "ip_cidr_range",
    "private_ip_google_access",
    "description",
];

/// One declared subnet, as written in the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// Region the subnet lives in.
    pub region: Option<String>,
    /// Primary range in CIDR notation.
    pub ip_cidr_range: Option<String>,
    /// Private API access; `true` when absent.
    pub private_ip_google_access: Option<bool>,
    /// Free-text description.
    pub description: Option<String>,
}

impl SubnetSpec {
    /// Decodes a subnet entry.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown fields or mistyped values.
    pub fn from_block(key: &str, block: &Block) -> Result<Self> {
        let f = Fields::new(ResourceKind::Subnet, key, block, FIELDS)?;
        Ok(Self {
            region: f.string("region")?,
            ip_cidr_range: f.string("ip_cidr_range")?,
            private_ip_google_access: f.bool("private_ip_google_access")?,
            description: f.string("description")?,
        })
    }
}

/// A resolved subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet name (the map key).
    pub name: String,
    /// Owning project.
    pub project_id: String,
    /// Region, verbatim.
    pub region: String,
    /// CIDR range, verbatim.
    pub ip_cidr_range: String,
    /// Private API access flag.
    pub private_ip_google_access: bool,
    /// Description, empty when not declared.
    pub description: String,
    /// `projects/{project_id}/global/networks/{network_name}`.
    pub network: String,
}

impl Subnet {
    /// Returns the subnet's address in the dependency graph.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Subnet, &self.name)
    }

    /// Returns the subnet's self-link.
    #[must_use]
    pub fn self_link(&self) -> String {
        constants::self_link(&format!(
            "projects/{}/regions/{}/subnetworks/{}",
            self.project_id, self.region, self.name
        ))
    }

    /// Returns the attribute set recorded in state and compared by plans.
    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "region": self.region,
            "ip_cidr_range": self.ip_cidr_range,
            "private_ip_google_access": self.private_ip_google_access,
            "description": self.description,
            "network": self.network,
        })
    }
}

/// Resolves every subnet in `specs` against the named network.
///
/// The output has exactly the input's key set. Region and range are copied
/// verbatim; address-space conflicts are left to the cloud API.
///
/// # Errors
///
/// Returns an error for the first entry (in key order) missing `region` or
/// `ip_cidr_range`; no subnet is returned in that case.
pub fn resolve_subnets(
    project_id: &str,
    network_name: &str,
    specs: &BTreeMap<String, SubnetSpec>,
) -> Result<BTreeMap<String, Subnet>> {
    tracing::info!(count = specs.len(), network = network_name, "resolving subnets");
    let network = constants::network_path(project_id, network_name);

    specs
        .iter()
        .map(|(key, spec)| {
            let subnet = Subnet {
                name: key.clone(),
                project_id: project_id.to_string(),
                region: require_string(ResourceKind::Subnet, key, "region", spec.region.as_ref())?,
                ip_cidr_range: require_string(
                    ResourceKind::Subnet,
                    key,
                    "ip_cidr_range",
                    spec.ip_cidr_range.as_ref(),
                )?,
                private_ip_google_access: spec.private_ip_google_access.unwrap_or(true),
                description: spec.description.clone().unwrap_or_default(),
                network: network.clone(),
            };
            Ok((key.clone(), subnet))
        })
        .collect()
}
