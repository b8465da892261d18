//! GitHub mentions agent.
//!
//! Lists recent notifications where the token's owner was mentioned, and
//! for every issue, pull request, or commit behind them scans comments past
//! a per-subject cursor kept in the vault under `owner/repo#number` or
//! `owner/repo#sha`.

pub mod agent;
pub mod api;
pub mod rest;
pub mod scan;
pub mod subject;
pub mod thread;

pub use agent::GithubAgent;
pub use api::{Comment, Coordinates, GithubApi, GithubError, Issue, Notification};
pub use rest::RestGithub;
pub use subject::Subject;

/// Sent with every GitHub API request.
pub(crate) const USER_AGENT: &str = concat!("wring/", env!("CARGO_PKG_VERSION"));
