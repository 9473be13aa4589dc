// src/commands/clean.rs
//! Cache cleaning command

use super::{Session, confirm};
use crate::cli::CleanTarget;
use anyhow::{Context, Result};
use pmt::build::clean::format_bytes;
use pmt::privilege::build_user;
use std::path::Path;

pub fn cmd_clean(config: Option<&Path>, target: CleanTarget, yes: bool) -> Result<()> {
    let session = Session::open(config)?;
    let env = session.build_env(build_user().ok().flatten());
    let cleaner = env.cleaner();

    let (what, plan) = match target {
        CleanTarget::Build => ("old built packages", cleaner.plan_build()),
        CleanTarget::Reviewed => ("reviewed PKGBUILDs", cleaner.plan_reviewed()),
        CleanTarget::Logs => ("build logs", cleaner.plan_logs()),
        CleanTarget::All => ("the entire build cache", cleaner.plan_all()),
    };
    let plan = plan.context("Failed to scan cache")?;

    if plan.is_empty() {
        println!("Nothing to clean");
        return Ok(());
    }

    println!(
        "Removing {}: {} files, {}",
        what,
        plan.file_count(),
        format_bytes(plan.total_bytes())
    );
    if !yes && !confirm("Continue?")? {
        println!("Cancelled");
        return Ok(());
    }

    let report = cleaner.clean(&plan);
    println!(
        "Removed {} files, freed {}",
        report.files_removed,
        format_bytes(report.bytes_freed)
    );
    Ok(())
}
