//! An environment bound to its state store.

use std::path::Path;

use netform_common::config::NetformConfig;
use netform_common::error::Result;
use netform_compose::environment::{self, EnvironmentSpec, ResolvedEnvironment};
use netform_state::{StateHandle, StateLocation};

/// A resolved environment together with the handle of its own state.
#[derive(Debug, Clone)]
pub struct Target {
    /// Resolved resources of the environment.
    pub environment: ResolvedEnvironment,
    /// Where the environment's state is recorded.
    pub state: StateHandle,
}

impl Target {
    /// Loads, resolves, and locates the environment in `template_path`.
    ///
    /// Templates declaring a `backend` keep state under the bucket mount;
    /// others keep it next to the template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read, parsed, or resolved.
    pub fn open(template_path: &Path, config: &NetformConfig) -> Result<Self> {
        let spec = EnvironmentSpec::load(template_path)?;
        let environment = environment::compose(&spec, config.next_hop_policy)?;
        let location = match &environment.backend {
            Some(backend) => StateLocation::Bucket {
                root: config.bucket_root.clone(),
                bucket: backend.bucket.clone(),
                prefix: backend.prefix.clone(),
            },
            None => StateLocation::Local {
                dir: netform_common::constants::project_dir(template_path, &environment.label),
            },
        };
        tracing::debug!(environment = %environment.label, state = %location, "opened target");
        Ok(Self {
            environment,
            state: StateHandle::new(location),
        })
    }

    /// Binds an already resolved environment to an explicit state handle.
    #[must_use]
    pub const fn new(environment: ResolvedEnvironment, state: StateHandle) -> Self {
        Self { environment, state }
    }

    /// Returns the environment label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.environment.label
    }
}
