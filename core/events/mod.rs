//! # Run Events
//!
//! Self-contained notifications about the progress of a run. The engine only ever sends them;
//! front-ends (like the CLI reporter) drain them through an `EventConsumer` to show live progress.
//!
mod channel;
mod consumer;
pub mod event;

pub use channel::*;
pub use consumer::*;
