//! Route resolution.
//!
//! A route has exactly one next hop. When a declaration names both a
//! gateway and an IP, the gateway takes precedence under
//! [`NextHopPolicy::GatewayWins`]; [`NextHopPolicy::Strict`] rejects it.

use std::collections::BTreeMap;
use std::fmt;

use netform_common::config::NextHopPolicy;
use netform_common::constants;
use netform_common::error::{NetformError, Result};
use netform_common::types::{ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::fields::{Fields, require_priority, require_string};
use crate::parser::ast::Block;

const FIELDS: &[&str] = &[
    "description",
    "dest_range",
    "priority",
    "next_hop_gateway",
    "next_hop_ip",
    "tags",
];

/// One declared route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Free-text description.
    pub description: Option<String>,
    /// Destination range in CIDR notation.
    pub dest_range: Option<String>,
    /// Priority, lower wins.
    pub priority: Option<i64>,
    /// Gateway reference, e.g. `default-internet-gateway`.
    pub next_hop_gateway: Option<String>,
    /// Next-hop instance IP address.
    pub next_hop_ip: Option<String>,
    /// Instance tags the route applies to.
    pub tags: Option<Vec<String>>,
}

impl RouteSpec {
    /// Decodes a route entry.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown fields or mistyped values.
    pub fn from_block(key: &str, block: &Block) -> Result<Self> {
        let f = Fields::new(ResourceKind::Route, key, block, FIELDS)?;
        Ok(Self {
            description: f.string("description")?,
            dest_range: f.string("dest_range")?,
            priority: f.integer("priority")?,
            next_hop_gateway: f.string("next_hop_gateway")?,
            next_hop_ip: f.string("next_hop_ip")?,
            tags: f.string_list("tags")?,
        })
    }
}

/// The single place a route sends matching traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum NextHop {
    /// A gateway reference.
    Gateway(String),
    /// An instance IP address.
    Ip(String),
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway(g) => write!(f, "gateway {g}"),
            Self::Ip(ip) => write!(f, "ip {ip}"),
        }
    }
}

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route name (the map key).
    pub name: String,
    /// Owning project.
    pub project_id: String,
    /// `projects/{project_id}/global/networks/{network_name}`.
    pub network: String,
    /// Description, empty when not declared.
    pub description: String,
    /// Destination range, verbatim.
    pub dest_range: String,
    /// Priority in `0..=65535`.
    pub priority: u32,
    /// Resolved next hop.
    pub next_hop: NextHop,
    /// Instance tags, empty when not declared.
    pub tags: Vec<String>,
}

impl Route {
    /// Returns the route's address in the dependency graph.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Route, &self.name)
    }

    /// Returns the route's self-link.
    #[must_use]
    pub fn self_link(&self) -> String {
        constants::self_link(&format!(
            "projects/{}/global/routes/{}",
            self.project_id, self.name
        ))
    }

    /// Returns the attribute set recorded in state and compared by plans.
    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        let (gateway, ip) = match &self.next_hop {
            NextHop::Gateway(g) => (Some(g), None),
            NextHop::Ip(ip) => (None, Some(ip)),
        };
        serde_json::json!({
            "name": self.name,
            "network": self.network,
            "description": self.description,
            "dest_range": self.dest_range,
            "priority": self.priority,
            "next_hop_gateway": gateway,
            "next_hop_ip": ip,
            "tags": self.tags,
        })
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.is_empty())
}

/// Picks the next hop for one route entry.
///
/// # Errors
///
/// Returns an error when neither selector is present, or when both are
/// present under [`NextHopPolicy::Strict`].
pub fn select_next_hop(key: &str, spec: &RouteSpec, policy: NextHopPolicy) -> Result<NextHop> {
    match (
        non_empty(spec.next_hop_gateway.as_ref()),
        non_empty(spec.next_hop_ip.as_ref()),
    ) {
        (Some(gateway), Some(ip)) => match policy {
            NextHopPolicy::GatewayWins => {
                tracing::warn!(
                    route = key,
                    gateway = %gateway,
                    ignored_ip = %ip,
                    "route declares both next_hop_gateway and next_hop_ip; using the gateway"
                );
                Ok(NextHop::Gateway(gateway.clone()))
            }
            NextHopPolicy::Strict => Err(NetformError::InvalidField {
                kind: ResourceKind::Route,
                key: key.to_string(),
                field: "next_hop_ip".into(),
                message: "next_hop_gateway and next_hop_ip are mutually exclusive".into(),
            }),
        },
        (Some(gateway), None) => Ok(NextHop::Gateway(gateway.clone())),
        (None, Some(ip)) => Ok(NextHop::Ip(ip.clone())),
        (None, None) => Err(NetformError::MissingField {
            kind: ResourceKind::Route,
            key: key.to_string(),
            field: "next_hop_gateway",
        }),
    }
}

/// Resolves every route in `specs` against the named network.
///
/// # Errors
///
/// Returns an error for the first entry (in key order) missing `dest_range`,
/// `priority`, or a resolvable next hop.
pub fn resolve_routes(
    project_id: &str,
    network_name: &str,
    specs: &BTreeMap<String, RouteSpec>,
    policy: NextHopPolicy,
) -> Result<BTreeMap<String, Route>> {
    tracing::info!(count = specs.len(), network = network_name, "resolving routes");
    let network = constants::network_path(project_id, network_name);

    specs
        .iter()
        .map(|(key, spec)| {
            let route = Route {
                name: key.clone(),
                project_id: project_id.to_string(),
                network: network.clone(),
                description: spec.description.clone().unwrap_or_default(),
                dest_range: require_string(
                    ResourceKind::Route,
                    key,
                    "dest_range",
                    spec.dest_range.as_ref(),
                )?,
                priority: require_priority(ResourceKind::Route, key, spec.priority)?,
                next_hop: select_next_hop(key, spec, policy)?,
                tags: spec.tags.clone().unwrap_or_default(),
            };
            Ok((key.clone(), route))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn route(gateway: Option<&str>, ip: Option<&str>) -> RouteSpec {
        RouteSpec {
            dest_range: Some("192.168.0.0/16".into()),
            priority: Some(1000),
            next_hop_gateway: gateway.map(Into::into),
            next_hop_ip: ip.map(Into::into),
            ..RouteSpec::default()
        }
    }

    fn resolve_one(spec: RouteSpec, policy: NextHopPolicy) -> Result<Route> {
        let specs = BTreeMap::from([("r".to_string(), spec)]);
        resolve_routes("acme", "vpc", &specs, policy).map(|mut m| m.remove("r").expect("key"))
    }

    #[test]
    fn gateway_wins_over_ip() {
        let r = resolve_one(
            route(Some("default-internet-gateway"), Some("10.0.1.1")),
            NextHopPolicy::GatewayWins,
        )
        .expect("resolve");
        assert_eq!(r.next_hop, NextHop::Gateway("default-internet-gateway".into()));
        assert_eq!(r.attributes()["next_hop_ip"], serde_json::Value::Null);
    }

    #[test]
    fn strict_policy_rejects_both() {
        let err = resolve_one(
            route(Some("default-internet-gateway"), Some("10.0.1.1")),
            NextHopPolicy::Strict,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"), "got: {err}");
    }

    #[test]
    fn ip_only_is_used() {
        let r = resolve_one(route(None, Some("10.0.1.1")), NextHopPolicy::GatewayWins)
            .expect("resolve");
        assert_eq!(r.next_hop, NextHop::Ip("10.0.1.1".into()));
    }

    #[test]
    fn empty_gateway_counts_as_absent() {
        let r = resolve_one(route(Some(""), Some("10.0.1.1")), NextHopPolicy::Strict)
            .expect("resolve");
        assert_eq!(r.next_hop, NextHop::Ip("10.0.1.1".into()));
    }

    #[test]
    fn no_next_hop_fails() {
        let err = resolve_one(route(None, None), NextHopPolicy::GatewayWins).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("\"r\""), "got: {err}");
    }

    #[test]
    fn tags_default_to_empty() {
        let r = resolve_one(route(Some("gw"), None), NextHopPolicy::GatewayWins).expect("resolve");
        assert!(r.tags.is_empty());
    }

    #[test]
    fn missing_dest_range_fails() {
        let mut spec = route(Some("gw"), None);
        spec.dest_range = None;
        let err = resolve_one(spec, NextHopPolicy::GatewayWins).unwrap_err();
        assert!(err.to_string().contains("dest_range"), "got: {err}");
    }

    #[test]
    fn self_link_is_global() {
        let r = resolve_one(route(Some("gw"), None), NextHopPolicy::GatewayWins).expect("resolve");
        assert_eq!(
            r.self_link(),
            "https://www.googleapis.com/compute/v1/projects/acme/global/routes/r"
        );
    }

    proptest! {
        #[test]
        fn gateway_always_wins_when_present(
            gateway in "[a-z][a-z-]{1,30}",
            ip in prop::option::of("10\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}"),
        ) {
            let spec = RouteSpec {
                dest_range: Some("0.0.0.0/0".into()),
                priority: Some(1000),
                next_hop_gateway: Some(gateway.clone()),
                next_hop_ip: ip,
                ..RouteSpec::default()
            };
            let r = resolve_one(spec, NextHopPolicy::GatewayWins).expect("resolve");
            prop_assert_eq!(r.next_hop, NextHop::Gateway(gateway));
        }

        #[test]
        fn ip_is_used_when_alone(ip in "10\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}") {
            let r = resolve_one(route(None, Some(&ip)), NextHopPolicy::GatewayWins).expect("resolve");
            prop_assert_eq!(r.next_hop, NextHop::Ip(ip));
        }
    }
}
