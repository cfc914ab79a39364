//! # netform-state
//!
//! Persisted state for netform environments.
//!
//! Every environment owns exactly one state handle, addressed explicitly
//! by a [`StateLocation`](location::StateLocation): a local directory or a
//! bucket/prefix pair. Mutations require holding the handle's
//! [`StateLock`](lock::StateLock).

pub mod document;
pub mod location;
pub mod lock;

pub use document::{ResourceRecord, StateDocument};
pub use location::{StateHandle, StateLocation};
pub use lock::{LockInfo, StateLock};
