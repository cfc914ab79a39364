//! Address-space overlap between environments.
//!
//! Resolution accepts any CIDR text; this report is the only place where
//! subnets of different environments are compared.

use netform_common::cidr::Ipv4Cidr;
use netform_common::error::{NetformError, Result};
use netform_common::types::ResourceKind;
use serde::Serialize;

use crate::environment::ResolvedEnvironment;

/// A subnet identified by environment and key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetRef {
    /// Environment label.
    pub environment: String,
    /// Subnet key.
    pub subnet: String,
    /// Declared range.
    pub cidr: Ipv4Cidr,
}

/// Two subnets in different environments sharing addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    /// First subnet, from the earlier environment in input order.
    pub first: SubnetRef,
    /// Second subnet.
    pub second: SubnetRef,
}

/// Lists every pair of subnets from distinct environments whose ranges overlap.
///
/// # Errors
///
/// Returns an error naming the subnet if a range is not a valid IPv4 CIDR.
pub fn find_overlaps(environments: &[&ResolvedEnvironment]) -> Result<Vec<Overlap>> {
    let mut subnets = Vec::new();
    for (index, env) in environments.iter().enumerate() {
        for (key, subnet) in &env.subnets {
            let cidr = subnet
                .ip_cidr_range
                .parse::<Ipv4Cidr>()
                .map_err(|e| NetformError::InvalidField {
                    kind: ResourceKind::Subnet,
                    key: key.clone(),
                    field: "ip_cidr_range".into(),
                    message: e.to_string(),
                })?;
            subnets.push((
                index,
                SubnetRef {
                    environment: env.label.clone(),
                    subnet: key.clone(),
                    cidr,
                },
            ));
        }
    }

    let mut overlaps = Vec::new();
    for (i, (env_a, a)) in subnets.iter().enumerate() {
        for (env_b, b) in &subnets[i + 1..] {
            if env_a != env_b && a.cidr.overlaps(&b.cidr) {
                tracing::debug!(first = %a.cidr, second = %b.cidr, "overlapping ranges");
                overlaps.push(Overlap {
                    first: a.clone(),
                    second: b.clone(),
                });
            }
        }
    }
    Ok(overlaps)
}
