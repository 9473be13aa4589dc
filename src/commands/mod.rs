// src/commands/mod.rs
//! Command handlers for the pmt CLI

mod clean;
mod install;
pub mod progress;
mod search;
mod update;

pub use clean::cmd_clean;
pub use install::{cmd_install, cmd_resolve};
pub use search::{cmd_info, cmd_search};
pub use update::cmd_upgrade;

use anyhow::{Context, Result};
use pmt::build::BuildEnv;
use pmt::privilege::BuildUser;
use pmt::process::{ProcessRunner, SystemRunner};
use pmt::{Config, Error, PacmanCli, RpcClient, RunOutcome, Transport};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Everything a command talks to, built from configuration
pub(crate) struct Session {
    pub config: Config,
    pub home: PathBuf,
    pub runner: Arc<dyn ProcessRunner>,
    pub db: Arc<PacmanCli>,
    pub rpc: Arc<RpcClient>,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config =
            Config::load_or_default(config_path).context("Failed to load configuration")?;
        let home = pmt::privilege::invoking_home().context("Failed to locate home directory")?;
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);

        let transport = Transport::https(&config.rpc.host)
            .with_context(|| format!("Failed to set up TLS for {}", config.rpc.host))?;
        let rpc = RpcClient::with_endpoint(transport, &config.rpc.endpoint, config.rpc.max_url_len);
        debug!("Session: host={} home={}", config.rpc.host, home.display());

        Ok(Self {
            db: Arc::new(PacmanCli::new(runner.clone())),
            rpc: Arc::new(rpc),
            config,
            home,
            runner,
        })
    }

    pub fn build_env(&self, user: Option<BuildUser>) -> BuildEnv {
        BuildEnv::new(&self.config, &self.home, self.runner.clone(), user)
    }
}

/// Fail early when an external tool is missing from `PATH`
pub(crate) fn require_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        which::which(tool).map_err(|_| Error::ToolNotFound(tool.to_string()))?;
    }
    Ok(())
}

/// Ask a yes/no question on the terminal; anything but `y` is no
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    progress::flush();
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read from stdin")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print the outcome of a build run; failures become errors
pub(crate) fn report_outcome(outcome: RunOutcome, log_file: &Path) -> Result<()> {
    match outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Cancelled { package } => {
            println!("Cancelled: PKGBUILD for {package} was not accepted");
            Ok(())
        }
        failed @ RunOutcome::Failed { .. } => Err(anyhow::anyhow!(
            "Build failed: {failed} (see {})",
            log_file.display()
        )),
    }
}
