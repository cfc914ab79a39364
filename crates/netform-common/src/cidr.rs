//! IPv4 CIDR parsing and overlap detection.
//!
//! Resolution never validates address space; these helpers back the
//! cross-environment overlap report and the test suites.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NetformError, Result};

/// Maximum prefix length for an IPv4 network.
pub const MAX_PREFIX: u8 = 32;

/// An IPv4 network in CIDR notation, normalized to its network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

/// Converts a prefix length into a netmask.
#[must_use]
pub const fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (MAX_PREFIX - prefix)
    }
}

impl Ipv4Cidr {
    /// Creates a CIDR block, clearing host bits of `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` exceeds 32.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > MAX_PREFIX {
            return Err(NetformError::Config {
                message: format!("prefix length {prefix} exceeds {MAX_PREFIX}"),
            });
        }
        Ok(Self {
            addr: Ipv4Addr::from(u32::from(addr) & mask(prefix)),
            prefix,
        })
    }

    /// Returns the network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.addr
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns the last address covered by the block.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) | !mask(self.prefix))
    }

    /// Returns whether `ip` falls inside the block.
    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & mask(self.prefix) == u32::from(self.addr)
    }

    /// Returns whether two blocks share at least one address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        u32::from(self.addr) <= u32::from(other.broadcast())
            && u32::from(other.addr) <= u32::from(self.broadcast())
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetformError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || NetformError::Config {
            message: format!("invalid IPv4 CIDR: \"{s}\""),
        };
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        Self::new(addr, prefix)
    }
}
