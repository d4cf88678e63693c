//! Liftover: pre-migration intelligence for Python 2 -> 3 codebases.
//!
//! Produces planning signals before a migration starts (dead code, dependency
//! ordering, per-file risk tiers) and run-and-compare verification after
//! individual files have been migrated. The migration itself is out of scope:
//! edit and test generation are consumed as injected capabilities.

// Core infrastructure
pub mod error;
pub mod types;

// Static analysis over the project source tree
pub mod analysis;
pub mod capabilities;
pub mod python;

// Execution and comparison
pub mod compare;
pub mod exec;
pub mod run_compare;
pub mod sandbox;

pub use analysis::analyze;
pub use compare::{compare_outputs, prescan_source};
pub use error::{LiftError, LiftResult};
pub use run_compare::{run_and_compare, RunCompareRequest};
