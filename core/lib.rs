//! # Strata
//!
//! The flow begins by creating a `Config` and using it to build an `Engine`. The engine loads
//! every `component.json` under the repository root into a `Graph`, and runs a `Selection` of its
//! rules on a `Scheduler`. Each rule ends with one `RunStatus`, collected in a `RunReport`.
//!
//! Rules are skipped when their conditions say so, when a previous run left their outputs
//! intact, or when their outputs can be restored from the layered artifact cache.
//!

pub mod cache;
pub mod condition;
pub mod config;
pub(crate) mod drive;
pub mod events;
pub mod executor;
pub mod graph;
pub mod model;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod util;

pub use config::*;
pub use drive::*;
pub use graph::{Graph, GraphError, Selection};
pub use model::{RuleId, RunStatus, StatusDetail};
pub use scheduler::{RunOutcome, RunReport, RuleReport};

#[macro_use]
extern crate derive_builder;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
