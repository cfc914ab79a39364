//! Runtime configuration model for netform.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a route declaring both `next_hop_gateway` and `next_hop_ip` is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopPolicy {
    /// The gateway is used and the IP is ignored with a warning.
    #[default]
    GatewayWins,
    /// Declaring both is a configuration error.
    Strict,
}

/// Root configuration for a netform invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetformConfig {
    /// Directory where bucket-backed state stores are mounted.
    pub bucket_root: PathBuf,
    /// Maximum concurrent resource operations within one stage.
    pub parallelism: usize,
    /// Treatment of routes with two next-hop selectors.
    pub next_hop_policy: NextHopPolicy,
    /// Whether read-only operations also take the state lock.
    pub lock: bool,
}

impl Default for NetformConfig {
    fn default() -> Self {
        Self {
            bucket_root: PathBuf::from(crate::constants::DEFAULT_BUCKET_ROOT),
            parallelism: crate::constants::DEFAULT_PARALLELISM,
            next_hop_policy: NextHopPolicy::default(),
            lock: true,
        }
    }
}
