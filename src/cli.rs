// src/cli.rs
//! CLI definitions for pmt
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pmt")]
#[command(version)]
#[command(about = "Install and upgrade repository and AUR packages", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/pmt/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search installed and repository packages
    Search {
        /// Search terms
        query: String,

        /// Also search the AUR
        #[arg(long)]
        aur: bool,
    },

    /// Show AUR details for a package
    Info {
        /// Package name
        name: String,
    },

    /// Show what installing a package would build
    Resolve {
        /// Package name
        name: String,
    },

    /// Build and install an AUR package with its dependencies
    Install {
        /// Package name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Upgrade installed AUR packages, probing VCS packages for new commits
    Upgrade {
        /// Skip the live version probe for VCS packages
        #[arg(long)]
        no_vcs: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Remove cached sources, build artifacts and logs
    Clean {
        #[command(subcommand)]
        target: CleanTarget,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long, global = true)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanTarget {
    /// Old built packages, keeping the newest per package
    Build,
    /// Stored review baselines (next build shows the full recipe)
    Reviewed,
    /// Build and VCS check logs
    Logs,
    /// Everything above, plus all source checkouts
    All,
}
