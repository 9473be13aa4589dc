// src/commands/search.rs
//! Search and info commands

use super::Session;
use anyhow::{Context, Result};
use pmt::{MetadataSource, PackageRecord, PackageSource, SearchChannel, SearchController};
use std::path::Path;
use std::sync::Arc;

/// Search repositories, and the AUR when asked
pub fn cmd_search(config: Option<&Path>, query: &str, aur: bool) -> Result<()> {
    let session = Session::open(config)?;
    let mut search = SearchController::new(
        session.db.clone(),
        session.rpc.clone(),
        session.config.debounce(),
    );
    search.set_aur_enabled(aur);
    search.dispatch(query);
    search.wait();

    let mut total = 0;
    for channel in [SearchChannel::Repo, SearchChannel::Aur] {
        if let Some(error) = search.error(channel) {
            eprintln!("{} search failed: {}", channel.as_str(), error);
        }
        for record in search.results(channel) {
            print_record(record);
            total += 1;
        }
    }

    if total == 0 {
        println!("No packages found matching '{}'", query);
    }
    Ok(())
}

fn print_record(record: &PackageRecord) {
    let mut line = format!("{}/{} {}", record.repo, record.name, record.version);
    if record.source == PackageSource::Local {
        line.push_str(" [installed]");
    }
    if record.out_of_date {
        line.push_str(" (out of date)");
    }
    println!("{line}");
    if !record.description.is_empty() {
        println!("    {}", record.description);
    }
}

/// Show AUR metadata for one package
pub fn cmd_info(config: Option<&Path>, name: &str) -> Result<()> {
    let session = Session::open(config)?;
    let client: Arc<dyn MetadataSource> = session.rpc.clone();
    let record = client
        .info(name)
        .with_context(|| format!("Failed to query AUR for {name}"))?
        .ok_or_else(|| anyhow::anyhow!("Package '{}' not found in the AUR", name))?;

    println!("Name           : {}", record.name);
    println!("Version        : {}", record.version);
    if let Some(base) = &record.pkgbase {
        println!("Package Base   : {}", base);
    }
    println!("Description    : {}", record.description);
    println!("URL            : {}", record.url);
    print_list("Licenses", &record.licenses);
    print_list("Depends On", &record.depends);
    print_list("Make Deps", &record.makedepends);
    print_list("Optional Deps", &record.optdepends);
    print_list("Provides", &record.provides);
    print_list("Conflicts With", &record.conflicts);
    println!(
        "Maintainer     : {}",
        record.maintainer.as_deref().unwrap_or("(orphan)")
    );
    println!("Votes          : {}", record.votes);
    if record.out_of_date {
        println!("Out Of Date    : yes");
    }
    Ok(())
}

fn print_list(label: &str, items: &[String]) {
    let value = if items.is_empty() {
        "None".to_string()
    } else {
        items.join("  ")
    };
    println!("{label:<15}: {value}");
}
