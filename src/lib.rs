//! starmirror - Mirror starred GitHub repositories to local disk
//!
//! starmirror walks the starred list of one or more accounts page by page and
//! keeps a bare mirror clone of every repository (plus its wiki, when the
//! repository has one) under `<output>/<owner>/<name>.git`.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Starred listing pagination and repository descriptors
//! - [`github`]: HTTP client for the GitHub starred endpoint
//! - [`git`]: Mirror-clone capability and its `git` implementation
//! - [`sync`]: Account harness and per-repository mirror sync
//! - [`retry`]: Retry policy for listing requests

pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod github;
pub mod retry;
pub mod sync;

pub use config::Config;
pub use discovery::{EnumerationState, PageSize, RepositoryDescriptor, StarLister, StarredPages};
pub use error::ListError;
pub use git::{GitMirror, Mirror, MirrorOutcome};
pub use github::GitHubClient;
pub use retry::RetryConfig;
pub use sync::{SyncEngine, SyncOptions, SyncResult, SyncSummary};
