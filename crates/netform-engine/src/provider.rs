//! Provider abstraction over the compute API.

use netform_common::error::Result;
use netform_common::types::ResourceAddress;
use netform_compose::plan::DesiredResource;
use serde_json::Value;

/// Remote API that owns the actual resources.
///
/// Implementors report failures as [`netform_common::error::NetformError::Remote`]
/// carrying the API's message verbatim.
pub trait Provider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether [`Provider::read`] reflects the remote side.
    ///
    /// When `false`, recorded state is trusted as-is and no drift is reported.
    fn can_refresh(&self) -> bool {
        true
    }

    /// Reads the current attributes of a resource, `None` if it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    fn read(&self, address: &ResourceAddress, self_link: &str) -> Result<Option<Value>>;

    /// Creates a resource and returns its attributes as created.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    fn create(&self, resource: &DesiredResource) -> Result<Value>;

    /// Updates the `changed` attributes of an existing resource in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    fn update(&self, resource: &DesiredResource, changed: &[String]) -> Result<Value>;

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    fn delete(&self, address: &ResourceAddress, self_link: &str) -> Result<()>;
}

/// Provider that records changes in state without contacting any API.
///
/// Useful for rendering and reviewing environments on machines with no
/// cloud credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

impl Provider for OfflineProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn can_refresh(&self) -> bool {
        false
    }

    fn read(&self, _address: &ResourceAddress, _self_link: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    fn create(&self, resource: &DesiredResource) -> Result<Value> {
        tracing::info!(address = %resource.address, "offline: recording create");
        Ok(resource.attributes.clone())
    }

    fn update(&self, resource: &DesiredResource, changed: &[String]) -> Result<Value> {
        tracing::info!(address = %resource.address, ?changed, "offline: recording update");
        Ok(resource.attributes.clone())
    }

    fn delete(&self, address: &ResourceAddress, _self_link: &str) -> Result<()> {
        tracing::info!(%address, "offline: recording delete");
        Ok(())
    }
}
