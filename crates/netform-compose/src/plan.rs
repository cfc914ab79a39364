//! Plans: the difference between declared and recorded infrastructure.
//!
//! A plan never changes anything by itself. Drift reported by a refresh is
//! shown on the affected change and is only reconciled by an explicit apply.

use std::collections::BTreeMap;
use std::fmt;

use netform_common::types::{ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource as the templates want it to exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    /// Stable address.
    pub address: ResourceAddress,
    /// Self-link the resource will have once created.
    pub self_link: String,
    /// Full attribute set.
    pub attributes: Value,
    /// Resources that must exist first.
    pub depends_on: Vec<ResourceAddress>,
}

/// What is currently known about an existing resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    /// Current attributes (from state, or from a refresh).
    pub attributes: Value,
    /// Whether a refresh found attributes differing from state.
    pub drifted: bool,
}

/// The operation a plan schedules for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The resource does not exist yet.
    Create,
    /// Mutable attributes changed.
    Update,
    /// An immutable attribute changed: delete, then create.
    Replace,
    /// The resource is no longer declared.
    Delete,
    /// Nothing to do.
    NoOp,
}

impl Action {
    /// Returns the one-to-three character marker used in plan output.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoOp => " ",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
        };
        f.write_str(word)
    }
}

/// One entry of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChange {
    /// Target resource.
    pub address: ResourceAddress,
    /// Scheduled operation.
    pub action: Action,
    /// Names of attributes whose values differ, sorted.
    pub changed: Vec<String>,
    /// Whether the difference was caused by out-of-band changes.
    pub drifted: bool,
    /// Current attributes, if the resource exists.
    pub before: Option<Value>,
    /// Desired attributes, if the resource stays declared.
    pub after: Option<Value>,
}

/// Counts of scheduled operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Resources to create.
    pub create: usize,
    /// Resources to update in place.
    pub update: usize,
    /// Resources to replace.
    pub replace: usize,
    /// Resources to delete.
    pub delete: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete",
            self.create, self.update, self.replace, self.delete
        )
    }
}

/// The full set of changes for one environment, sorted by address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    /// Every known resource and its scheduled operation.
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    /// Returns whether applying the plan would change anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != Action::NoOp)
    }

    /// Returns the changes that are not no-ops.
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action != Action::NoOp)
    }

    /// Returns the change scheduled for `address`, if any.
    #[must_use]
    pub fn get(&self, address: &ResourceAddress) -> Option<&PlannedChange> {
        self.changes.iter().find(|c| &c.address == address)
    }

    /// Counts scheduled operations by kind.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            match change.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Replace => summary.replace += 1,
                Action::Delete => summary.delete += 1,
                Action::NoOp => {}
            }
        }
        summary
    }
}

/// Attributes that cannot change without recreating the resource.
///
/// Routes cannot be modified at all, so every change replaces them.
fn forces_replacement(kind: ResourceKind, attribute: &str) -> bool {
    match kind {
        ResourceKind::Network => matches!(attribute, "name" | "project_id" | "auto_create_subnetworks"),
        ResourceKind::Subnet => matches!(attribute, "name" | "region" | "ip_cidr_range" | "network"),
        ResourceKind::Firewall => matches!(attribute, "name" | "direction" | "network"),
        ResourceKind::Route => true,
    }
}

fn changed_attributes(before: &Value, after: &Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut changed: Vec<String> = before
        .keys()
        .chain(after.keys())
        .filter(|k| before.get(*k) != after.get(*k))
        .cloned()
        .collect();
    changed.sort();
    changed.dedup();
    changed
}

/// Computes the plan that takes `observed` to `desired`.
#[must_use]
pub fn diff(desired: &[DesiredResource], observed: &BTreeMap<ResourceAddress, Observed>) -> Plan {
    let mut changes: BTreeMap<ResourceAddress, PlannedChange> = BTreeMap::new();

    for resource in desired {
        let change = match observed.get(&resource.address) {
            None => PlannedChange {
                address: resource.address.clone(),
                action: Action::Create,
                changed: Vec::new(),
                drifted: false,
                before: None,
                after: Some(resource.attributes.clone()),
            },
            Some(current) => {
                let changed = changed_attributes(&current.attributes, &resource.attributes);
                let kind = resource.address.kind();
                let action = if changed.is_empty() {
                    Action::NoOp
                } else if changed.iter().any(|a| forces_replacement(kind, a)) {
                    Action::Replace
                } else {
                    Action::Update
                };
                PlannedChange {
                    address: resource.address.clone(),
                    action,
                    changed,
                    drifted: current.drifted,
                    before: Some(current.attributes.clone()),
                    after: Some(resource.attributes.clone()),
                }
            }
        };
        let _ = changes.insert(change.address.clone(), change);
    }

    for (address, current) in observed {
        if changes.contains_key(address) {
            continue;
        }
        let _ = changes.insert(
            address.clone(),
            PlannedChange {
                address: address.clone(),
                action: Action::Delete,
                changed: Vec::new(),
                drifted: current.drifted,
                before: Some(current.attributes.clone()),
                after: None,
            },
        );
    }

    let plan = Plan {
        changes: changes.into_values().collect(),
    };
    tracing::info!(summary = %plan.summary(), "computed plan");
    plan
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn desired(kind: ResourceKind, name: &str, attributes: Value) -> DesiredResource {
        DesiredResource {
            address: ResourceAddress::new(kind, name),
            self_link: format!("link/{name}"),
            attributes,
            depends_on: Vec::new(),
        }
    }

    fn observed(entries: Vec<(ResourceKind, &str, Value)>) -> BTreeMap<ResourceAddress, Observed> {
        entries
            .into_iter()
            .map(|(kind, name, attributes)| {
                (
                    ResourceAddress::new(kind, name),
                    Observed {
                        attributes,
                        drifted: false,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn empty_everything_is_empty_plan() {
        let plan = diff(&[], &BTreeMap::new());
        assert!(plan.changes.is_empty());
        assert!(!plan.has_changes());
    }

    #[test]
    fn new_resource_is_created() {
        let plan = diff(
            &[desired(ResourceKind::Subnet, "a", json!({"region": "r"}))],
            &BTreeMap::new(),
        );
        assert_eq!(plan.changes[0].action, Action::Create);
        assert_eq!(plan.summary().create, 1);
    }

    #[test]
    fn identical_resource_is_noop() {
        let attrs = json!({"region": "r", "ip_cidr_range": "10.0.0.0/24"});
        let plan = diff(
            &[desired(ResourceKind::Subnet, "a", attrs.clone())],
            &observed(vec![(ResourceKind::Subnet, "a", attrs)]),
        );
        assert_eq!(plan.changes[0].action, Action::NoOp);
        assert!(!plan.has_changes());
    }

    #[test]
    fn mutable_change_updates_in_place() {
        let plan = diff(
            &[desired(
                ResourceKind::Subnet,
                "a",
                json!({"region": "r", "private_ip_google_access": false}),
            )],
            &observed(vec![(
                ResourceKind::Subnet,
                "a",
                json!({"region": "r", "private_ip_google_access": true}),
            )]),
        );
        let change = &plan.changes[0];
        assert_eq!(change.action, Action::Update);
        assert_eq!(change.changed, vec!["private_ip_google_access"]);
    }

    #[test]
    fn immutable_change_replaces() {
        let plan = diff(
            &[desired(ResourceKind::Subnet, "a", json!({"ip_cidr_range": "10.0.2.0/24"}))],
            &observed(vec![(ResourceKind::Subnet, "a", json!({"ip_cidr_range": "10.0.1.0/24"}))]),
        );
        assert_eq!(plan.changes[0].action, Action::Replace);
    }

    #[test]
    fn any_route_change_replaces() {
        let plan = diff(
            &[desired(ResourceKind::Route, "r", json!({"description": "new"}))],
            &observed(vec![(ResourceKind::Route, "r", json!({"description": "old"}))]),
        );
        assert_eq!(plan.changes[0].action, Action::Replace);
    }

    #[test]
    fn removed_key_deletes_only_that_resource() {
        let attrs = json!({"region": "r"});
        let plan = diff(
            &[desired(ResourceKind::Subnet, "keep", attrs.clone())],
            &observed(vec![
                (ResourceKind::Subnet, "keep", attrs.clone()),
                (ResourceKind::Subnet, "gone", attrs),
            ]),
        );
        let gone = plan
            .get(&ResourceAddress::new(ResourceKind::Subnet, "gone"))
            .expect("gone planned");
        assert_eq!(gone.action, Action::Delete);
        let keep = plan
            .get(&ResourceAddress::new(ResourceKind::Subnet, "keep"))
            .expect("keep planned");
        assert_eq!(keep.action, Action::NoOp);
    }

    #[test]
    fn drift_is_flagged_on_change() {
        let mut current = observed(vec![(ResourceKind::Firewall, "ssh", json!({"priority": 900}))]);
        if let Some(o) = current.values_mut().next() {
            o.drifted = true;
        }
        let plan = diff(
            &[desired(ResourceKind::Firewall, "ssh", json!({"priority": 1000}))],
            &current,
        );
        let change = &plan.changes[0];
        assert!(change.drifted);
        assert_eq!(change.action, Action::Update);
        assert_eq!(change.before, Some(json!({"priority": 900})));
    }

    #[test]
    fn summary_display() {
        let summary = PlanSummary {
            create: 2,
            update: 1,
            replace: 0,
            delete: 3,
        };
        assert_eq!(
            summary.to_string(),
            "2 to create, 1 to update, 0 to replace, 3 to delete"
        );
    }
}
