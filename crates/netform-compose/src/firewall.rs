//! Firewall rule resolution.
//!
//! Direction selects which range field a rule populates: ingress rules match
//! on sources, egress rules on destinations. The choice is carried as a
//! [`RangeRole`] so a resolved rule can never hold both or neither.

use std::collections::BTreeMap;

use netform_common::constants;
use netform_common::error::{NetformError, Result};
use netform_common::types::{Direction, ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::fields::{Fields, require_priority};
use crate::parser::ast::Block;

const FIELDS: &[&str] = &[
    "description",
    "direction",
    "priority",
    "ranges",
    "allow",
    "target_tags",
    "source_tags",
    "destination_tags",
];

const ALLOW_FIELDS: &[&str] = &["protocol", "ports"];

/// One `(protocol, ports)` pair as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowSpec {
    /// IP protocol name or number, e.g. `tcp` or `icmp`.
    pub protocol: Option<String>,
    /// Ports or port ranges; empty means all ports.
    pub ports: Vec<String>,
}

/// One declared firewall rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRuleSpec {
    /// Free-text description.
    pub description: Option<String>,
    /// Traffic direction.
    pub direction: Option<Direction>,
    /// Priority, lower wins.
    pub priority: Option<i64>,
    /// CIDR ranges; their role depends on `direction`.
    pub ranges: Vec<String>,
    /// Allowed traffic.
    pub allow: Vec<AllowSpec>,
    /// Instances the rule applies to.
    pub target_tags: Vec<String>,
    /// Source instances (ingress only has an effect).
    pub source_tags: Vec<String>,
    /// Destination instances (egress only has an effect).
    pub destination_tags: Vec<String>,
}

impl FirewallRuleSpec {
    /// Decodes a firewall entry.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown fields, mistyped values, or an unknown direction.
    pub fn from_block(key: &str, block: &Block) -> Result<Self> {
        let f = Fields::new(ResourceKind::Firewall, key, block, FIELDS)?;
        let allow = f
            .map_list("allow")?
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                let a = Fields::new(ResourceKind::Firewall, key, entry, ALLOW_FIELDS)?;
                Ok(AllowSpec {
                    protocol: a.string("protocol")?,
                    ports: a.string_list("ports")?.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            description: f.string("description")?,
            direction: f.parsed("direction")?,
            priority: f.integer("priority")?,
            ranges: f.string_list("ranges")?.unwrap_or_default(),
            allow,
            target_tags: f.string_list("target_tags")?.unwrap_or_default(),
            source_tags: f.string_list("source_tags")?.unwrap_or_default(),
            destination_tags: f.string_list("destination_tags")?.unwrap_or_default(),
        })
    }
}

/// A resolved `(protocol, ports)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allow {
    /// IP protocol.
    pub protocol: String,
    /// Ports or port ranges.
    pub ports: Vec<String>,
}

/// Which side of the connection a rule's ranges describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeRole {
    /// Ranges are matched against the packet source.
    Source(Vec<String>),
    /// Ranges are matched against the packet destination.
    Destination(Vec<String>),
}

impl RangeRole {
    fn for_direction(direction: Direction, ranges: Vec<String>) -> Self {
        match direction {
            Direction::Ingress => Self::Source(ranges),
            Direction::Egress => Self::Destination(ranges),
        }
    }
}

/// A resolved firewall rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// Rule name (the map key).
    pub name: String,
    /// Owning project.
    pub project_id: String,
    /// `projects/{project_id}/global/networks/{network_name}`.
    pub network: String,
    /// Description, empty when not declared.
    pub description: String,
    /// Traffic direction.
    pub direction: Direction,
    /// Priority in `0..=65535`.
    pub priority: u32,
    /// Direction-selected ranges.
    pub ranges: RangeRole,
    /// Allowed traffic, in declaration order.
    pub allow: Vec<Allow>,
    /// Target tags, verbatim.
    pub target_tags: Vec<String>,
    /// Source tags, verbatim.
    pub source_tags: Vec<String>,
    /// Destination tags, verbatim.
    pub destination_tags: Vec<String>,
}

impl FirewallRule {
    /// Source ranges; empty for egress rules.
    #[must_use]
    pub fn source_ranges(&self) -> &[String] {
        match &self.ranges {
            RangeRole::Source(r) => r,
            RangeRole::Destination(_) => &[],
        }
    }

    /// Destination ranges; empty for ingress rules.
    #[must_use]
    pub fn destination_ranges(&self) -> &[String] {
        match &self.ranges {
            RangeRole::Destination(r) => r,
            RangeRole::Source(_) => &[],
        }
    }

    /// Returns the rule's address in the dependency graph.
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Firewall, &self.name)
    }

    /// Returns the rule's self-link.
    #[must_use]
    pub fn self_link(&self) -> String {
        constants::self_link(&format!(
            "projects/{}/global/firewalls/{}",
            self.project_id, self.name
        ))
    }

    /// Returns the attribute set recorded in state and compared by plans.
    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "network": self.network,
            "description": self.description,
            "direction": self.direction,
            "priority": self.priority,
            "source_ranges": self.source_ranges(),
            "destination_ranges": self.destination_ranges(),
            "allow": self.allow,
            "target_tags": self.target_tags,
            "source_tags": self.source_tags,
            "destination_tags": self.destination_tags,
        })
    }
}

fn resolve_rule(
    project_id: &str,
    network: &str,
    key: &str,
    spec: &FirewallRuleSpec,
) -> Result<FirewallRule> {
    let missing = |field| NetformError::MissingField {
        kind: ResourceKind::Firewall,
        key: key.to_string(),
        field,
    };

    let direction = spec.direction.ok_or_else(|| missing("direction"))?;
    let priority = require_priority(ResourceKind::Firewall, key, spec.priority)?;
    if spec.ranges.is_empty() {
        return Err(missing("ranges"));
    }
    if spec.allow.is_empty() {
        return Err(missing("allow"));
    }

    let allow = spec
        .allow
        .iter()
        .enumerate()
        .map(|(i, pair)| match pair.protocol.as_deref() {
            Some(protocol) if !protocol.is_empty() => Ok(Allow {
                protocol: protocol.to_string(),
                ports: pair.ports.clone(),
            }),
            _ => Err(NetformError::InvalidField {
                kind: ResourceKind::Firewall,
                key: key.to_string(),
                field: format!("allow[{i}].protocol"),
                message: "protocol is required".into(),
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FirewallRule {
        name: key.to_string(),
        project_id: project_id.to_string(),
        network: network.to_string(),
        description: spec.description.clone().unwrap_or_default(),
        direction,
        priority,
        ranges: RangeRole::for_direction(direction, spec.ranges.clone()),
        allow,
        target_tags: spec.target_tags.clone(),
        source_tags: spec.source_tags.clone(),
        destination_tags: spec.destination_tags.clone(),
    })
}

/// Resolves every firewall rule in `specs` against the named network.
///
/// Tag fields are forwarded without cross-checking them against the
/// direction: a `source_tags` list on an egress rule is accepted.
///
/// # Errors
///
/// Returns an error for the first entry (in key order) missing a direction
/// or priority, with an out-of-range priority, or with no ranges or no
/// allow pairs.
pub fn resolve_firewall_rules(
    project_id: &str,
    network_name: &str,
    specs: &BTreeMap<String, FirewallRuleSpec>,
) -> Result<BTreeMap<String, FirewallRule>> {
    tracing::info!(count = specs.len(), network = network_name, "resolving firewall rules");
    let network = constants::network_path(project_id, network_name);

    specs
        .iter()
        .map(|(key, spec)| Ok((key.clone(), resolve_rule(project_id, &network, key, spec)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tcp(ports: &[&str]) -> AllowSpec {
        AllowSpec {
            protocol: Some("tcp".into()),
            ports: ports.iter().map(ToString::to_string).collect(),
        }
    }

    fn rule(direction: Direction, ranges: &[&str]) -> FirewallRuleSpec {
        FirewallRuleSpec {
            direction: Some(direction),
            priority: Some(1000),
            ranges: ranges.iter().map(ToString::to_string).collect(),
            allow: vec![tcp(&["443"])],
            ..FirewallRuleSpec::default()
        }
    }

    fn resolve_one(spec: FirewallRuleSpec) -> Result<FirewallRule> {
        let specs = BTreeMap::from([("r".to_string(), spec)]);
        resolve_firewall_rules("acme", "vpc", &specs).map(|mut m| m.remove("r").expect("key"))
    }

    #[test]
    fn egress_populates_destination_only() {
        let r = resolve_one(rule(Direction::Egress, &["0.0.0.0/0"])).expect("resolve");
        assert_eq!(r.destination_ranges(), ["0.0.0.0/0"]);
        assert!(r.source_ranges().is_empty());
        let attrs = r.attributes();
        assert_eq!(attrs["source_ranges"], serde_json::json!([]));
        assert_eq!(attrs["destination_ranges"], serde_json::json!(["0.0.0.0/0"]));
    }

    #[test]
    fn ingress_populates_source_only() {
        let r = resolve_one(rule(Direction::Ingress, &["35.235.240.0/20"])).expect("resolve");
        assert_eq!(r.source_ranges(), ["35.235.240.0/20"]);
        assert!(r.destination_ranges().is_empty());
    }

    #[test]
    fn source_tags_on_egress_are_forwarded() {
        let mut spec = rule(Direction::Egress, &["0.0.0.0/0"]);
        spec.source_tags = vec!["web".into()];
        let r = resolve_one(spec).expect("permissive");
        assert_eq!(r.source_tags, vec!["web"]);
    }

    #[test]
    fn missing_direction_fails() {
        let mut spec = rule(Direction::Ingress, &["10.0.0.0/8"]);
        spec.direction = None;
        let err = resolve_one(spec).unwrap_err();
        assert!(err.to_string().contains("direction"), "got: {err}");
    }

    #[test]
    fn missing_priority_fails() {
        let mut spec = rule(Direction::Ingress, &["10.0.0.0/8"]);
        spec.priority = None;
        let err = resolve_one(spec).unwrap_err();
        assert!(err.to_string().contains("priority"), "got: {err}");
    }

    #[test]
    fn out_of_range_priority_fails() {
        let mut spec = rule(Direction::Ingress, &["10.0.0.0/8"]);
        spec.priority = Some(70_000);
        assert!(resolve_one(spec).is_err());
    }

    #[test]
    fn empty_allow_fails() {
        let mut spec = rule(Direction::Ingress, &["10.0.0.0/8"]);
        spec.allow.clear();
        let err = resolve_one(spec).unwrap_err();
        assert!(err.to_string().contains("allow"), "got: {err}");
    }

    #[test]
    fn empty_ranges_fail() {
        let err = resolve_one(rule(Direction::Ingress, &[])).unwrap_err();
        assert!(err.to_string().contains("ranges"), "got: {err}");
    }

    #[test]
    fn allow_without_protocol_fails() {
        let mut spec = rule(Direction::Ingress, &["10.0.0.0/8"]);
        spec.allow.push(AllowSpec::default());
        let err = resolve_one(spec).unwrap_err();
        assert!(err.to_string().contains("allow[1].protocol"), "got: {err}");
    }

    #[test]
    fn empty_rule_map_yields_empty_output() {
        let out = resolve_firewall_rules("acme", "vpc", &BTreeMap::new()).expect("resolve");
        assert!(out.is_empty());
    }

    #[test]
    fn decode_allow_pairs_with_optional_ports() {
        let input = r#"environment = "dev"
firewall_rules = {
    icmp = { direction = "INGRESS", priority = 65534, ranges = ["10.0.0.0/8"], allow = [{ protocol = "icmp" }] }
}"#;
        let t = crate::parser::parse_template(input).expect("parse");
        let entry = t.attributes["firewall_rules"].as_map().expect("map")["icmp"]
            .as_map()
            .expect("map");
        let spec = FirewallRuleSpec::from_block("icmp", entry).expect("decode");
        assert_eq!(spec.allow.len(), 1);
        assert!(spec.allow[0].ports.is_empty());
        assert_eq!(spec.direction, Some(Direction::Ingress));
    }

    #[test]
    fn decode_rejects_lowercase_direction() {
        let block: Block = [(
            "direction".to_string(),
            crate::parser::ast::Value::String("ingress".into()),
        )]
        .into_iter()
        .collect();
        let err = FirewallRuleSpec::from_block("x", &block).unwrap_err();
        assert!(err.to_string().contains("INGRESS or EGRESS"), "got: {err}");
    }

    fn allow_list() -> impl Strategy<Value = Vec<AllowSpec>> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["tcp", "udp", "icmp", "esp"]),
                prop::collection::vec("[0-9]{1,5}", 0..4),
            )
                .prop_map(|(protocol, ports)| AllowSpec {
                    protocol: Some(protocol.to_string()),
                    ports,
                }),
            1..6,
        )
    }

    proptest! {
        #[test]
        fn direction_selects_exactly_one_range_field(
            egress in any::<bool>(),
            ranges in prop::collection::vec("10\\.[0-9]{1,2}\\.0\\.0/16", 1..5),
        ) {
            let direction = if egress { Direction::Egress } else { Direction::Ingress };
            let spec = FirewallRuleSpec {
                direction: Some(direction),
                priority: Some(1000),
                ranges: ranges.clone(),
                allow: vec![tcp(&["22"])],
                ..FirewallRuleSpec::default()
            };
            let r = resolve_one(spec).expect("resolve");
            if egress {
                prop_assert_eq!(r.destination_ranges(), ranges.as_slice());
                prop_assert!(r.source_ranges().is_empty());
            } else {
                prop_assert_eq!(r.source_ranges(), ranges.as_slice());
                prop_assert!(r.destination_ranges().is_empty());
            }
        }

        #[test]
        fn every_allow_pair_survives_once(allow in allow_list()) {
            let spec = FirewallRuleSpec {
                direction: Some(Direction::Ingress),
                priority: Some(100),
                ranges: vec!["0.0.0.0/0".into()],
                allow: allow.clone(),
                ..FirewallRuleSpec::default()
            };
            let r = resolve_one(spec).expect("resolve");
            prop_assert_eq!(r.allow.len(), allow.len());
            for (declared, resolved) in allow.iter().zip(&r.allow) {
                prop_assert_eq!(declared.protocol.as_deref(), Some(resolved.protocol.as_str()));
                prop_assert_eq!(&declared.ports, &resolved.ports);
            }
        }
    }
}
