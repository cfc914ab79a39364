//! # netform-compose
//!
//! Parser and resolvers for `.nf` environment templates.
//!
//! Handles:
//! - **Parser**: Lexing, syntax tree construction, and structural validation.
//! - **Network**: The network module and the outputs it exposes.
//! - **Subnet / Firewall / Route**: Keyed-collection resolvers.
//! - **Environment**: Composition of one template into resolved resources.
//! - **Graph**: Dependency graph and stage computation.
//! - **Plan**: Diffing desired resources against recorded ones.
//! - **Overlap**: Cross-environment address-space report.

pub mod environment;
pub mod fields;
pub mod firewall;
pub mod graph;
pub mod network;
pub mod overlap;
pub mod parser;
pub mod plan;
pub mod route;
pub mod subnet;
