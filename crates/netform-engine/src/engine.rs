//! Engine that plans and applies environments against a provider.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use netform_common::config::NetformConfig;
use netform_common::error::{NetformError, Result};
use netform_common::types::{ResourceAddress, ResourceKind};
use netform_compose::environment::EnvironmentOutputs;
use netform_compose::graph::DependencyGraph;
use netform_compose::plan::{self, Action, DesiredResource, Observed, Plan};
use netform_state::{ResourceRecord, StateDocument, StateLock};
use serde::Serialize;

use crate::executor;
use crate::provider::{OfflineProvider, Provider};
use crate::target::Target;

/// Operation holding the state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Computing a plan.
    Plan,
    /// Applying a plan.
    Apply,
    /// Deleting every recorded resource.
    Destroy,
}

impl Operation {
    /// Returns the name recorded in the lock file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful apply or destroy.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// The plan that was executed.
    pub plan: Plan,
    /// Resources changed, in the order they completed.
    pub completed: Vec<ResourceAddress>,
    /// State serial after the run.
    pub serial: u64,
}

/// Current view of recorded resources after asking the provider.
struct Refreshed {
    observed: BTreeMap<ResourceAddress, Observed>,
    vanished: Vec<ResourceAddress>,
}

/// Coordinates plans, provider calls, and state persistence.
pub struct Engine {
    provider: Box<dyn Provider>,
    config: NetformConfig,
}

impl Engine {
    /// Creates an engine on top of `provider`.
    #[must_use]
    pub fn new(provider: Box<dyn Provider>, config: NetformConfig) -> Self {
        Self { provider, config }
    }

    /// Creates an engine that records changes without calling any API.
    #[must_use]
    pub fn offline(config: NetformConfig) -> Self {
        Self::new(Box::new(OfflineProvider), config)
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &NetformConfig {
        &self.config
    }

    /// Computes the plan that reconciles `target` with its template.
    ///
    /// Takes the state lock for the duration unless locking is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked or unreadable, or a refresh fails.
    pub fn plan(&self, target: &Target) -> Result<Plan> {
        self.preview(target, &target.environment.resources())
    }

    /// Computes the plan that deletes every recorded resource of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked or unreadable, or a refresh fails.
    pub fn plan_destroy(&self, target: &Target) -> Result<Plan> {
        self.preview(target, &[])
    }

    fn preview(&self, target: &Target, desired: &[DesiredResource]) -> Result<Plan> {
        let _lock = if self.config.lock {
            Some(target.state.lock(Operation::Plan.as_str())?)
        } else {
            None
        };
        let doc = target.state.load_or_new(target.label())?;
        let refreshed = self.refresh(&doc)?;
        Ok(plan::diff(desired, &refreshed.observed))
    }

    /// Applies the template of `target`.
    ///
    /// Stops at the first provider error. Everything completed before the
    /// error stays recorded in state; nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked, a provider call fails, or
    /// the state cannot be saved.
    pub fn apply(&self, target: &Target) -> Result<ApplyReport> {
        let _span = tracing::info_span!("apply", environment = %target.label()).entered();
        self.run(target, Operation::Apply, &target.environment.resources())
    }

    /// Deletes every resource recorded for `target`, dependents first.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked, a provider call fails, or
    /// the state cannot be saved.
    pub fn destroy(&self, target: &Target) -> Result<ApplyReport> {
        let _span = tracing::info_span!("destroy", environment = %target.label()).entered();
        self.run(target, Operation::Destroy, &[])
    }

    fn run(
        &self,
        target: &Target,
        operation: Operation,
        desired: &[DesiredResource],
    ) -> Result<ApplyReport> {
        let lock = target.state.lock(operation.as_str())?;
        let mut doc = target.state.load_or_new(target.label())?;

        let refreshed = self.refresh(&doc)?;
        let mut dirty = !refreshed.vanished.is_empty();
        for address in &refreshed.vanished {
            let _ = doc.resources.remove(address);
        }

        let plan = plan::diff(desired, &refreshed.observed);
        for change in plan.changes.iter().filter(|c| c.action == Action::NoOp && c.drifted) {
            if let (Some(record), Some(current)) =
                (doc.resources.get_mut(&change.address), &change.before)
            {
                record.attributes = current.clone();
                dirty = true;
            }
        }

        if !plan.has_changes() {
            tracing::info!("no changes");
            if dirty {
                target.state.save(&lock, &mut doc)?;
            }
            return Ok(ApplyReport {
                plan,
                completed: Vec::new(),
                serial: doc.serial,
            });
        }

        tracing::info!(
            provider = self.provider.name(),
            summary = %plan.summary(),
            "executing plan"
        );
        let mut completed = Vec::new();
        let executed = self.execute(&plan, desired, &mut doc, &mut completed);
        let saved = save(target, &lock, &mut doc);
        executed?;
        saved?;

        tracing::info!(changed = completed.len(), serial = doc.serial, "run complete");
        Ok(ApplyReport {
            plan,
            completed,
            serial: doc.serial,
        })
    }

    /// Reads every recorded resource back from the provider.
    fn refresh(&self, doc: &StateDocument) -> Result<Refreshed> {
        if !self.provider.can_refresh() {
            let observed = doc
                .resources
                .iter()
                .map(|(address, record)| {
                    (
                        address.clone(),
                        Observed {
                            attributes: record.attributes.clone(),
                            drifted: false,
                        },
                    )
                })
                .collect();
            return Ok(Refreshed {
                observed,
                vanished: Vec::new(),
            });
        }

        let records: Vec<(&ResourceAddress, &ResourceRecord)> = doc.resources.iter().collect();
        let outcomes = executor::run_stage(&records, self.config.parallelism, |(address, record)| {
            self.provider.read(address, &record.self_link)
        });

        let mut refreshed = Refreshed {
            observed: BTreeMap::new(),
            vanished: Vec::new(),
        };
        for (index, outcome) in outcomes {
            let (address, record) = records[index];
            match outcome? {
                None => {
                    tracing::warn!(%address, "resource no longer exists remotely");
                    refreshed.vanished.push(address.clone());
                }
                Some(current) => {
                    let drifted = current != record.attributes;
                    if drifted {
                        tracing::warn!(%address, "drift detected");
                    }
                    let _ = refreshed.observed.insert(
                        address.clone(),
                        Observed {
                            attributes: current,
                            drifted,
                        },
                    );
                }
            }
        }
        Ok(refreshed)
    }

    /// Runs deletions in reverse dependency order, then creations and
    /// updates stage by stage. Halts at the first failing stage.
    fn execute(
        &self,
        plan: &Plan,
        desired: &[DesiredResource],
        doc: &mut StateDocument,
        completed: &mut Vec<ResourceAddress>,
    ) -> Result<()> {
        let removals: BTreeSet<&ResourceAddress> = plan
            .pending()
            .filter(|c| matches!(c.action, Action::Delete | Action::Replace))
            .map(|c| &c.address)
            .collect();

        if !removals.is_empty() {
            let recorded = DependencyGraph::from_resources(
                doc.resources
                    .iter()
                    .map(|(address, record)| (address, record.depends_on.as_slice())),
            );
            for stage in recorded.stages()?.into_iter().rev() {
                let jobs: Vec<(ResourceAddress, String)> = stage
                    .into_iter()
                    .filter(|address| removals.contains(address))
                    .filter_map(|address| {
                        let link = doc.resources.get(&address)?.self_link.clone();
                        Some((address, link))
                    })
                    .collect();
                let outcomes =
                    executor::run_stage(&jobs, self.config.parallelism, |(address, link)| {
                        tracing::info!(%address, "deleting");
                        self.provider.delete(address, link)
                    });
                settle(outcomes, &jobs, completed, |(address, _), ()| {
                    let _ = doc.resources.remove(address);
                })?;
            }
        }

        let changes: BTreeMap<&ResourceAddress, &plan::PlannedChange> =
            plan.pending().map(|c| (&c.address, c)).collect();
        let wanted = DependencyGraph::from_resources(
            desired
                .iter()
                .map(|r| (&r.address, r.depends_on.as_slice())),
        );
        let resources: BTreeMap<&ResourceAddress, &DesiredResource> =
            desired.iter().map(|r| (&r.address, r)).collect();

        for stage in wanted.stages()? {
            let jobs: Vec<(&plan::PlannedChange, &DesiredResource)> = stage
                .iter()
                .filter_map(|address| {
                    let change = *changes.get(address)?;
                    let resource = *resources.get(address)?;
                    matches!(
                        change.action,
                        Action::Create | Action::Update | Action::Replace
                    )
                    .then_some((change, resource))
                })
                .collect();
            let outcomes = executor::run_stage(&jobs, self.config.parallelism, |(change, resource)| {
                if change.action == Action::Update {
                    tracing::info!(address = %resource.address, changed = ?change.changed, "updating");
                    self.provider.update(resource, &change.changed)
                } else {
                    tracing::info!(address = %resource.address, "creating");
                    self.provider.create(resource)
                }
            });
            settle(outcomes, &jobs, completed, |(_, resource), attributes| {
                let _ = doc.resources.insert(
                    resource.address.clone(),
                    ResourceRecord {
                        self_link: resource.self_link.clone(),
                        attributes,
                        depends_on: resource.depends_on.clone(),
                    },
                );
            })?;
        }
        Ok(())
    }

    /// Returns the outputs recorded in the state of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`NetformError::NotFound`] if the network has not been applied.
    pub fn outputs(&self, target: &Target) -> Result<EnvironmentOutputs> {
        let doc = target.state.load_or_new(target.label())?;
        let (network, record) = doc
            .resources
            .iter()
            .find(|(address, _)| address.kind() == ResourceKind::Network)
            .ok_or_else(|| NetformError::NotFound {
                kind: "applied network",
                id: target.label().to_string(),
            })?;
        Ok(EnvironmentOutputs {
            network_self_link: record.self_link.clone(),
            network_name: network.name().to_string(),
            subnets: doc.self_links(ResourceKind::Subnet),
            firewall_rules: doc.self_links(ResourceKind::Firewall),
            routes: doc.self_links(ResourceKind::Route),
        })
    }
}

/// Records successful outcomes of a stage and returns its first failure.
fn settle<J, T>(
    outcomes: Vec<(usize, Result<T>)>,
    jobs: &[J],
    completed: &mut Vec<ResourceAddress>,
    mut record: impl FnMut(&J, T),
) -> Result<()>
where
    J: Addressed,
{
    let mut failure = None;
    for (index, outcome) in outcomes {
        let job = &jobs[index];
        match outcome {
            Ok(value) => {
                record(job, value);
                completed.push(job.address().clone());
            }
            Err(e) => {
                tracing::error!(address = %job.address(), error = %e, "operation failed");
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }
    failure.map_or(Ok(()), Err)
}

fn save(target: &Target, lock: &StateLock, doc: &mut StateDocument) -> Result<()> {
    target.state.save(lock, doc).inspect_err(|e| {
        tracing::error!(error = %e, "failed to save state");
    })
}

/// Jobs that target one resource.
trait Addressed {
    fn address(&self) -> &ResourceAddress;
}

impl Addressed for (ResourceAddress, String) {
    fn address(&self) -> &ResourceAddress {
        &self.0
    }
}

impl Addressed for (&plan::PlannedChange, &DesiredResource) {
    fn address(&self) -> &ResourceAddress {
        &self.1.address
    }
}
