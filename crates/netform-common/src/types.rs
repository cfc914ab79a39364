//! Domain primitive types used across the netform workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NetformError, Result};

/// The four kinds of resource an environment can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// The isolated virtual network container.
    Network,
    /// A region-scoped address range inside the network.
    Subnet,
    /// A directional traffic rule.
    Firewall,
    /// A destination-range route.
    Route,
}

impl ResourceKind {
    /// Returns the lowercase name used in addresses and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::Firewall => "firewall",
            Self::Route => "route",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = NetformError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "network" => Ok(Self::Network),
            "subnet" => Ok(Self::Subnet),
            "firewall" => Ok(Self::Firewall),
            "route" => Ok(Self::Route),
            other => Err(NetformError::Config {
                message: format!("unknown resource kind: {other}"),
            }),
        }
    }
}

/// Stable identity of one resource within an environment: `kind.name`.
///
/// For keyed collections the name is the user-chosen map key, so adding or
/// removing a sibling never changes the address of another entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddress {
    kind: ResourceKind,
    name: String,
}

impl ResourceAddress {
    /// Creates an address from a kind and a name.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Returns the resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the resource name (the map key for keyed kinds).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl FromStr for ResourceAddress {
    type Err = NetformError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s.split_once('.').ok_or_else(|| NetformError::Config {
            message: format!("malformed resource address: {s}"),
        })?;
        if name.is_empty() {
            return Err(NetformError::Config {
                message: format!("resource address has an empty name: {s}"),
            });
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

impl TryFrom<String> for ResourceAddress {
    type Error = NetformError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceAddress> for String {
    fn from(value: ResourceAddress) -> Self {
        value.to_string()
    }
}

/// Dynamic routing scope of a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutingMode {
    /// Routes are advertised to all regions.
    #[default]
    Global,
    /// Routes are advertised only within their region.
    Regional,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "GLOBAL"),
            Self::Regional => write!(f, "REGIONAL"),
        }
    }
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GLOBAL" => Ok(Self::Global),
            "REGIONAL" => Ok(Self::Regional),
            other => Err(format!("expected GLOBAL or REGIONAL, got \"{other}\"")),
        }
    }
}

/// Direction of traffic a firewall rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Incoming traffic; ranges describe sources.
    Ingress,
    /// Outgoing traffic; ranges describe destinations.
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "INGRESS"),
            Self::Egress => write!(f, "EGRESS"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INGRESS" => Ok(Self::Ingress),
            "EGRESS" => Ok(Self::Egress),
            other => Err(format!("expected INGRESS or EGRESS, got \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display_and_parse_agree() {
        let addr = ResourceAddress::new(ResourceKind::Firewall, "allow-ssh");
        assert_eq!(addr.to_string(), "firewall.allow-ssh");
        let parsed: ResourceAddress = "firewall.allow-ssh".parse().expect("parse");
        assert_eq!(parsed, addr);
    }

    #[test]
    fn address_keeps_dots_in_name() {
        let parsed: ResourceAddress = "subnet.a.b".parse().expect("parse");
        assert_eq!(parsed.kind(), ResourceKind::Subnet);
        assert_eq!(parsed.name(), "a.b");
    }

    #[test]
    fn address_rejects_unknown_kind() {
        assert!("bucket.x".parse::<ResourceAddress>().is_err());
        assert!("subnet.".parse::<ResourceAddress>().is_err());
        assert!("subnet".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn addresses_order_network_first() {
        let net = ResourceAddress::new(ResourceKind::Network, "z");
        let sub = ResourceAddress::new(ResourceKind::Subnet, "a");
        assert!(net < sub);
    }

    #[test]
    fn routing_mode_defaults_to_global() {
        assert_eq!(RoutingMode::default(), RoutingMode::Global);
        assert_eq!("REGIONAL".parse::<RoutingMode>(), Ok(RoutingMode::Regional));
        assert!("regional".parse::<RoutingMode>().is_err());
    }

    #[test]
    fn direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::Egress).expect("serialize");
        assert_eq!(json, "\"EGRESS\"");
    }
}
