// src/lib.rs

//! pmt package manager core
//!
//! A front-end for Arch-style systems that treats binary repository
//! packages and source-built AUR packages as one namespace.
//!
//! # Architecture
//!
//! - `transport` and `rpc`: one persistent TLS connection to the metadata
//!   service and the JSON RPC client on top of it
//! - `resolver`: dependency closure over source packages, with repository
//!   and installed dependencies classified away
//! - `build`: recipe fetch, review, makepkg with a tailed log, install
//! - `search`: debounced background searches that drop superseded results
//! - `alpm`: the binary package database, driven through pacman

pub mod alpm;
pub mod build;
pub mod config;
mod error;
pub mod package;
pub mod privilege;
pub mod process;
pub mod progress;
pub mod resolver;
pub mod rpc;
pub mod search;
pub mod transport;
pub mod version;

pub use alpm::{PackageDatabase, PacmanCli};
pub use build::{BuildEnv, BuildOrchestrator, RunOutcome};
pub use config::Config;
pub use error::{Error, ResolveError, Result};
pub use package::{PackageRecord, PackageSource};
pub use progress::{CallbackProgress, LogProgress, ProgressSink, SilentProgress};
pub use resolver::{BuildPlan, DependencyResolver, PlanSummary, Resolution};
pub use rpc::{MetadataSource, RpcClient};
pub use search::{SearchChannel, SearchController};
pub use transport::Transport;
pub use version::vercmp;
