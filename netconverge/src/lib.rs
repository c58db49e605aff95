//! Declarative network convergence.
//!
//! A network is described once, in JSON: servers, devices, users and the
//! traffic each of them may send or receive. This library turns that
//! description into one POSIX shell script per machine and mode. Every
//! script is a list of small units; each unit checks one fact about the
//! machine and, in `config` mode, fixes it when the check fails.
//!
//! # Architecture
//!
//! Compilation runs as a chain of phases, each taking the previous phase's
//! value by reference:
//!
//! - [`data`]: Read the JSON input (comments allowed, includes resolved)
//! - [`model`]: Validate it into a [`model::NetworkGraph`] of machines
//! - [`topology`]: Allocate VLANs, subnets and addresses
//! - [`firewall`]: Resolve every traffic rule against the topology and
//!   render it for iptables or firewalld
//! - [`profile`]: Named bundles of units applied to each machine
//! - [`compiler`]: Order the units and render the scripts
//!
//! ## Units and scripts
//!
//! - [`unit`]: The convergence primitive, its builders and state machine
//! - [`compiler::script`]: Script layout for each [`compiler::Mode`]
//!
//! ## Around compilation
//!
//! - [`settings`]: TOML settings with embedded defaults
//! - [`verify`]: Reference checks that report every finding at once
//! - [`report`]: Terminal rendering for topology and script diffs
//! - [`secrets`]: Passphrases for generated account passwords
//! - [`output`]: Writing scripts to disk
//! - [`transport`]: Running a script locally or over SSH
//! - [`error`]: Data, topology and compile errors
//!
//! # Workflow
//!
//! ```text
//! NetworkData -> NetworkGraph -> Topology -> FirewallPlan
//!     -> CompiledNetwork -> units per machine -> script text
//! ```

pub mod compiler;
pub mod data;
pub mod error;
pub mod firewall;
pub mod model;
pub mod output;
pub mod profile;
pub mod report;
pub mod secrets;
pub mod settings;
pub mod topology;
pub mod transport;
pub mod unit;
pub mod verify;

#[cfg(test)]
mod testutil;
