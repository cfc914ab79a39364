//! Environment composition.
//!
//! Binds one template's values to the network module and the three
//! resolvers. The network is resolved first and its `network_name` output,
//! not the literal from the template, is what the resolvers receive; the
//! same reference becomes the dependency edge in the resource graph.

use std::collections::BTreeMap;
use std::path::Path;

use netform_common::config::NextHopPolicy;
use netform_common::error::{NetformError, Result};
use netform_common::types::{ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

use crate::fields::Fields;
use crate::firewall::{FirewallRule, FirewallRuleSpec, resolve_firewall_rules};
use crate::graph::DependencyGraph;
use crate::network::{Network, NetworkSpec, resolve_network};
use crate::parser::ast::{Block, Template, Value};
use crate::parser::validator::{self, TOP_LEVEL_KEYS};
use crate::plan::DesiredResource;
use crate::route::{Route, RouteSpec, resolve_routes};
use crate::subnet::{Subnet, SubnetSpec, resolve_subnets};

/// Remote state store coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Bucket name.
    pub bucket: String,
    /// Object prefix within the bucket.
    pub prefix: String,
}

/// Everything one environment template declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Environment label, e.g. `dev`.
    pub label: String,
    /// Region context, recorded in state.
    pub region: Option<String>,
    /// Remote state store; local state when absent.
    pub backend: Option<BackendSpec>,
    /// Network module inputs.
    pub network: NetworkSpec,
    /// Declared subnets by key.
    pub subnets: BTreeMap<String, SubnetSpec>,
    /// Declared firewall rules by key.
    pub firewall_rules: BTreeMap<String, FirewallRuleSpec>,
    /// Declared routes by key.
    pub routes: BTreeMap<String, RouteSpec>,
}

fn collection<'a>(template: &'a Template, name: &str) -> impl Iterator<Item = (&'a String, &'a Block)> {
    template
        .attributes
        .get(name)
        .and_then(Value::as_map)
        .into_iter()
        .flatten()
        .filter_map(|(key, value)| value.as_map().map(|block| (key, block)))
}

fn decode_collection<T>(
    template: &Template,
    name: &str,
    decode: impl Fn(&str, &Block) -> Result<T>,
) -> Result<BTreeMap<String, T>> {
    collection(template, name)
        .map(|(key, block)| Ok((key.clone(), decode(key, block)?)))
        .collect()
}

impl EnvironmentSpec {
    /// Validates and decodes a template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is structurally invalid or any
    /// entry has unknown or mistyped fields.
    pub fn from_template(template: &Template) -> Result<Self> {
        validator::validate(template)?;
        let label = match template.attributes.get("environment") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(NetformError::Config {
                    message: "missing required attribute `environment`".into(),
                });
            }
        };
        let top = Fields::new(ResourceKind::Network, &label, &template.attributes, TOP_LEVEL_KEYS)?;

        let backend = match template.attributes.get("backend").and_then(Value::as_map) {
            Some(block) => {
                let f = Fields::new(ResourceKind::Network, &label, block, &["bucket", "prefix"])?;
                Some(BackendSpec {
                    bucket: f.string("bucket")?.unwrap_or_default(),
                    prefix: f.string("prefix")?.unwrap_or_default(),
                })
            }
            None => None,
        };

        Ok(Self {
            region: top.string("region")?,
            backend,
            network: NetworkSpec::from_fields(&top)?,
            subnets: decode_collection(template, "subnets", SubnetSpec::from_block)?,
            firewall_rules: decode_collection(
                template,
                "firewall_rules",
                FirewallRuleSpec::from_block,
            )?,
            routes: decode_collection(template, "routes", RouteSpec::from_block)?,
            label,
        })
    }

    /// Parses and decodes template source text.
    ///
    /// # Errors
    ///
    /// Returns an error on syntax, structure, or field errors.
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_template(&crate::parser::parse_syntax(input)?)
    }

    /// Reads, parses, and decodes a template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not decode.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading environment template");
        let content = std::fs::read_to_string(path).map_err(|e| NetformError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }
}

/// A fully resolved environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    /// Environment label.
    pub label: String,
    /// Region context.
    pub region: Option<String>,
    /// Remote state store, if declared.
    pub backend: Option<BackendSpec>,
    /// The network.
    pub network: Network,
    /// Subnets by key.
    pub subnets: BTreeMap<String, Subnet>,
    /// Firewall rules by key.
    pub firewall_rules: BTreeMap<String, FirewallRule>,
    /// Routes by key.
    pub routes: BTreeMap<String, Route>,
}

/// Outputs published by an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOutputs {
    /// Network self-link.
    pub network_self_link: String,
    /// Network name.
    pub network_name: String,
    /// Subnet self-links by key.
    pub subnets: BTreeMap<String, String>,
    /// Firewall rule self-links by key.
    pub firewall_rules: BTreeMap<String, String>,
    /// Route self-links by key.
    pub routes: BTreeMap<String, String>,
}

/// Resolves an environment: network first, then its three dependents.
///
/// # Errors
///
/// Returns the first configuration error found. Subnets are checked
/// before firewall rules, and firewall rules before routes.
pub fn compose(spec: &EnvironmentSpec, policy: NextHopPolicy) -> Result<ResolvedEnvironment> {
    let _span = tracing::info_span!("compose", environment = %spec.label).entered();

    let network = resolve_network(&spec.network)?;
    let outputs = network.outputs();
    let project_id = &network.project_id;

    let subnets = resolve_subnets(project_id, &outputs.network_name, &spec.subnets)?;
    let firewall_rules =
        resolve_firewall_rules(project_id, &outputs.network_name, &spec.firewall_rules)?;
    let routes = resolve_routes(project_id, &outputs.network_name, &spec.routes, policy)?;

    Ok(ResolvedEnvironment {
        label: spec.label.clone(),
        region: spec.region.clone(),
        backend: spec.backend.clone(),
        network,
        subnets,
        firewall_rules,
        routes,
    })
}

impl ResolvedEnvironment {
    /// Returns every resource with its attributes and dependencies.
    #[must_use]
    pub fn resources(&self) -> Vec<DesiredResource> {
        let network = self.network.address();
        let dependent = |address: ResourceAddress, self_link, attributes| DesiredResource {
            address,
            self_link,
            attributes,
            depends_on: vec![network.clone()],
        };

        let mut resources = vec![DesiredResource {
            address: network.clone(),
            self_link: self.network.self_link(),
            attributes: self.network.attributes(),
            depends_on: Vec::new(),
        }];
        resources.extend(
            self.subnets
                .values()
                .map(|s| dependent(s.address(), s.self_link(), s.attributes())),
        );
        resources.extend(
            self.firewall_rules
                .values()
                .map(|r| dependent(r.address(), r.self_link(), r.attributes())),
        );
        resources.extend(
            self.routes
                .values()
                .map(|r| dependent(r.address(), r.self_link(), r.attributes())),
        );
        resources
    }

    /// Builds the dependency graph of this environment's resources.
    #[must_use]
    pub fn graph(&self) -> DependencyGraph {
        let resources = self.resources();
        DependencyGraph::from_resources(
            resources
                .iter()
                .map(|r| (&r.address, r.depends_on.as_slice())),
        )
    }

    /// Returns the outputs this environment publishes.
    #[must_use]
    pub fn outputs(&self) -> EnvironmentOutputs {
        let network = self.network.outputs();
        EnvironmentOutputs {
            network_self_link: network.network_self_link,
            network_name: network.network_name,
            subnets: self
                .subnets
                .iter()
                .map(|(k, s)| (k.clone(), s.self_link()))
                .collect(),
            firewall_rules: self
                .firewall_rules
                .iter()
                .map(|(k, r)| (k.clone(), r.self_link()))
                .collect(),
            routes: self
                .routes
                .iter()
                .map(|(k, r)| (k.clone(), r.self_link()))
                .collect(),
        }
    }
}
