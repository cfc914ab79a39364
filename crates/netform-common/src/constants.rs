//! System-wide constants and default paths.

use std::path::{Path, PathBuf};

/// Base URL prepended to relative resource paths to form self-links.
pub const COMPUTE_API_BASE: &str = "https://www.googleapis.com/compute/v1/";

/// File extension for netform environment templates.
pub const TEMPLATE_EXTENSION: &str = ".nf";

/// Directory created next to a template for local state.
pub const PROJECT_DIR_NAME: &str = ".netform";

/// Object name of the state document inside a state location.
pub const STATE_OBJECT: &str = "default.nfstate";

/// Object name of the lock file inside a state location.
pub const LOCK_OBJECT: &str = "default.nflock";

/// Version of the on-disk state document format.
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Default mount point of bucket-backed state stores.
pub const DEFAULT_BUCKET_ROOT: &str = "/mnt/netform-buckets";

/// Default number of concurrent operations within one apply stage.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Highest (least preferred) priority accepted for rules and routes.
pub const MAX_PRIORITY: u32 = 65_535;

/// Binary name for the CLI.
pub const BIN_NAME: &str = "nf";

/// Returns the relative path of a network, as synthesized for dependents.
///
/// The result is always `projects/{project_id}/global/networks/{network_name}`.
#[must_use]
pub fn network_path(project_id: &str, network_name: &str) -> String {
    format!("projects/{project_id}/global/networks/{network_name}")
}

/// Prefixes a relative resource path with the Compute API base URL.
#[must_use]
pub fn self_link(relative: &str) -> String {
    format!("{COMPUTE_API_BASE}{relative}")
}

/// Returns the local state directory for an environment template.
///
/// State lives in `.netform/<environment>/` next to the template so that two
/// environments in the same directory never share a state file.
#[must_use]
pub fn project_dir(template_path: &Path, environment: &str) -> PathBuf {
    template_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PROJECT_DIR_NAME)
        .join(environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_path_follows_fixed_template() {
        assert_eq!(
            network_path("acme-dev", "dev-vpc"),
            "projects/acme-dev/global/networks/dev-vpc"
        );
    }

    #[test]
    fn self_link_prefixes_api_base() {
        assert_eq!(
            self_link("projects/p/global/routes/r"),
            "https://www.googleapis.com/compute/v1/projects/p/global/routes/r"
        );
    }

    #[test]
    fn project_dir_is_per_environment() {
        let dev = project_dir(Path::new("envs/dev.nf"), "dev");
        let prod = project_dir(Path::new("envs/prod.nf"), "prod");
        assert_eq!(dev, PathBuf::from("envs/.netform/dev"));
        assert_ne!(dev, prod);
    }
}
