// src/commands/install.rs
//! Resolve and install commands

use super::progress::{SpinnerSink, StatusSpinner, TerminalReviewer};
use super::{Session, confirm, report_outcome, require_tools};
use anyhow::{Context, Result};
use pmt::privilege::{build_user, require_root};
use pmt::{BuildPlan, DependencyResolver};
use std::path::Path;
use tracing::info;

/// Resolve `name` into a build plan
fn resolve_plan(session: &Session, name: &str) -> Result<BuildPlan> {
    let spinner = StatusSpinner::new();
    let mut resolver = DependencyResolver::new(session.rpc.as_ref(), session.db.as_ref());
    let resolution = resolver.resolve(name, &spinner);
    spinner.finish();

    let resolution = resolution.with_context(|| format!("Failed to resolve {name}"))?;
    Ok(BuildPlan::from_resolution(resolution))
}

/// Show the build plan for a package without building anything
pub fn cmd_resolve(config: Option<&Path>, name: &str) -> Result<()> {
    let session = Session::open(config)?;
    let plan = resolve_plan(&session, name)?;

    println!("{}", plan.summary(name));
    if !plan.repo_deps.is_empty() {
        println!("Repository dependencies: {}", plan.repo_deps.join(" "));
    }
    if !plan.satisfied_deps.is_empty() {
        println!("Already satisfied: {}", plan.satisfied_deps.join(" "));
    }
    Ok(())
}

/// Build and install an AUR package and its source dependencies
pub fn cmd_install(config: Option<&Path>, name: &str, yes: bool) -> Result<()> {
    require_root("install packages")?;
    let user = build_user()?;
    require_tools(&["pacman", "git", "makepkg"])?;

    let session = Session::open(config)?;
    info!("Installing {}", name);
    let plan = resolve_plan(&session, name)?;

    let summary = plan.summary(name);
    println!("{summary}");
    if summary.is_up_to_date() {
        return Ok(());
    }
    if !yes && !confirm("Proceed with build?")? {
        println!("Cancelled");
        return Ok(());
    }

    let env = session.build_env(user);
    env.source.prepare().context("Failed to prepare build cache")?;
    let orchestrator = env.orchestrator(session.db.as_ref());
    let outcome = orchestrator.run_plan(&plan, name, &TerminalReviewer, &SpinnerSink::new());
    if outcome.is_completed() {
        println!("Installed {name}");
    }
    report_outcome(outcome, orchestrator.log_file())
}
