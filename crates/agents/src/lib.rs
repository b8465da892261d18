//! Pipe execution engine.
//!
//! - [`Routine`] drives periodic runs over a bounded worker pool
//! - [`Cycle`] and [`Exec`] run one pipe and turn every outcome into at most one event
//! - [`AgentRegistry`] resolves a pipe's JSON `kind` into an [`Agent`]
//! - [`filters`] wraps the user's event log with ignore/boost/notify rules
//! - [`github`] polls GitHub mentions with cursor-based deduplication

pub mod agent;
pub mod cycle;
pub mod exec;
pub mod filters;
pub mod github;
pub mod pattern;
pub mod registry;
pub mod routine;
pub mod tracker;

pub use agent::{Agent, AgentError, RunLog};
pub use cycle::Cycle;
pub use exec::{Exec, IDENTITY};
pub use registry::{AgentRegistry, RegistryError};
pub use routine::{Routine, RoutineError, RunReport};
pub use tracker::{ErrorTracker, LogTracker, MemoryTracker};
