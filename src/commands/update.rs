// src/commands/update.rs
//! Upgrade command

use super::progress::{SpinnerSink, StatusSpinner, TerminalReviewer};
use super::{Session, confirm, report_outcome, require_tools};
use anyhow::{Context, Result};
use pmt::build::UpgradeScanner;
use pmt::privilege::{build_user, require_root};
use std::path::Path;
use tracing::info;

/// Upgrade every installed AUR package with a newer version
pub fn cmd_upgrade(config: Option<&Path>, no_vcs: bool, yes: bool) -> Result<()> {
    require_root("upgrade packages")?;
    let user = build_user()?;
    require_tools(&["pacman", "git", "makepkg"])?;

    let session = Session::open(config)?;
    let env = session.build_env(user);
    env.source.prepare().context("Failed to prepare build cache")?;

    let mut scanner = UpgradeScanner::new(session.rpc.as_ref(), session.db.as_ref())
        .with_poll_interval(session.config.poll_interval());
    if !no_vcs {
        scanner = scanner.with_vcs(env.vcs_checker(), &session.config.build.vcs_log_file);
    }

    let spinner = StatusSpinner::new();
    let scan = scanner.scan(&spinner, &SpinnerSink::new());
    spinner.finish();
    let scan = scan.context("Failed to check for upgrades")?;

    if scan.foreign_count == 0 {
        println!("No AUR packages installed");
        return Ok(());
    }
    for name in &scan.not_found {
        info!("{} is installed but not in the AUR", name);
    }
    for name in &scan.vcs_skipped {
        println!("Skipped {name}: VCS version check failed");
    }
    if scan.upgrades.is_empty() {
        println!("All {} AUR packages are up to date", scan.foreign_count);
        return Ok(());
    }

    println!("Upgrades available:");
    for upgrade in &scan.upgrades {
        let marker = if upgrade.probed { " (vcs)" } else { "" };
        println!(
            "  {} {} -> {}{}",
            upgrade.name(),
            upgrade.installed.version,
            upgrade.target.version,
            marker
        );
    }

    let spinner = StatusSpinner::new();
    let plan = scanner.plan(&scan, &spinner);
    spinner.finish();
    let plan = plan.context("Failed to resolve upgrades")?;

    let label = format!("{} upgrade(s)", scan.upgrades.len());
    let summary = plan.summary(label.clone());
    println!("{summary}");
    if summary.is_up_to_date() {
        return Ok(());
    }
    if !yes && !confirm("Proceed with upgrade?")? {
        println!("Cancelled");
        return Ok(());
    }

    let orchestrator = env.orchestrator(session.db.as_ref());
    let outcome = orchestrator.run_plan(&plan, &label, &TerminalReviewer, &SpinnerSink::new());
    if outcome.is_completed() {
        println!("Upgraded {label}");
    }
    report_outcome(outcome, orchestrator.log_file())
}
