//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from resource references and groups
//! resources into stages: every resource in a stage depends only on
//! resources in earlier stages, so a stage boundary is a barrier and
//! members of one stage may be processed in parallel.

use std::collections::{BTreeMap, HashMap};

use netform_common::error::{NetformError, Result};
use netform_common::types::ResourceAddress;
use petgraph::Direction;
use petgraph::graph::NodeIndex;

/// A dependency graph of resources.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: petgraph::Graph<ResourceAddress, ()>,
    nodes: HashMap<ResourceAddress, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Builds a graph from `(address, depends_on)` pairs.
    ///
    /// Dependencies that are not themselves listed are added as nodes.
    pub fn from_resources<'a, I>(resources: I) -> Self
    where
        I: IntoIterator<Item = (&'a ResourceAddress, &'a [ResourceAddress])>,
    {
        let mut graph = Self::new();
        for (address, depends_on) in resources {
            let node = graph.add_resource(address.clone());
            for dependency in depends_on {
                let dep = graph.add_resource(dependency.clone());
                graph.add_dependency(node, dep);
            }
        }
        graph
    }

    /// Adds a resource node, returning the existing node if already present.
    pub fn add_resource(&mut self, address: ResourceAddress) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&address) {
            return idx;
        }
        let idx = self.graph.add_node(address.clone());
        let _ = self.nodes.insert(address, idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns the number of resources in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns whether the graph has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a topological ordering: dependencies before dependents.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<ResourceAddress>> {
        let indices = self.toposort()?;
        Ok(indices
            .iter()
            .filter_map(|&idx| self.graph.node_weight(idx).cloned())
            .collect())
    }

    /// Groups resources into creation stages.
    ///
    /// A resource's stage is one more than the deepest stage among its
    /// dependencies. Addresses within a stage are sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn stages(&self) -> Result<Vec<Vec<ResourceAddress>>> {
        let order = self.toposort()?;
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        let mut by_depth: BTreeMap<usize, Vec<ResourceAddress>> = BTreeMap::new();

        for idx in order {
            let level = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .filter_map(|dep| depth.get(&dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            let _ = depth.insert(idx, level);
            by_depth
                .entry(level)
                .or_default()
                .push(self.graph[idx].clone());
        }

        Ok(by_depth
            .into_values()
            .map(|mut stage| {
                stage.sort();
                stage
            })
            .collect())
    }

    fn toposort(&self) -> Result<Vec<NodeIndex>> {
        petgraph::algo::toposort(&self.graph, None).map_err(|cycle| NetformError::Config {
            message: format!(
                "cyclic dependency detected involving {}",
                self.graph[cycle.node_id()]
            ),
        })
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
