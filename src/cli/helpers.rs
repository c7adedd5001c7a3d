//! Shared helper functions for CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::Region;
use crate::pipeline::{pending_regions, Pipeline};
use crate::scrapers::RateLimiter;
use crate::store::Store;

/// Regions named on the command line, or every region when none are.
pub fn parse_regions(args: &[String]) -> anyhow::Result<Vec<Region>> {
    if args.is_empty() {
        return Ok(Region::all().collect());
    }
    let mut regions = Vec::with_capacity(args.len());
    for arg in args {
        match Region::parse(arg) {
            Some(region) if !regions.contains(&region) => regions.push(region),
            Some(_) => {}
            None => bail!("Unknown region '{}'", arg),
        }
    }
    Ok(regions)
}

/// Regions from the command line, narrowed to stale ones when `pending_only`.
pub fn select_regions(store: &Store, args: &[String], pending_only: bool) -> anyhow::Result<Vec<Region>> {
    let regions = parse_regions(args)?;
    if !pending_only {
        return Ok(regions);
    }
    let stale = pending_regions(store, &regions).context("Failed to read the case store")?;
    if stale.is_empty() {
        println!("{} No region has cases waiting for details", style("✓").green());
    }
    Ok(stale)
}

/// Pipeline wired from settings.
pub fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    settings
        .ensure_directories()
        .with_context(|| format!("Failed to create {}", settings.data_dir.display()))?;
    Ok(Pipeline::new(
        settings.store(),
        settings.launcher(),
        RateLimiter::with_config(settings.rate_limit_config()),
        settings.pipeline_settings(),
    ))
}

/// Progress bar for a detail crawl; its length is set per region.
pub fn detail_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

pub fn print_failed_urls<'a, I>(urls: I)
where
    I: IntoIterator<Item = &'a str>,
{
    let urls: Vec<&str> = urls.into_iter().collect();
    if urls.is_empty() {
        return;
    }
    println!("  {} {} page(s) failed:", style("!").yellow(), urls.len());
    for url in urls {
        println!("    {}", style(url).dim());
    }
}

/// Refuse to write exports where store loading would pick them up again.
/// `path` is an export directory or an output file; neither has to exist yet.
pub fn ensure_outside_store(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let store_dir = resolve_target(&settings.store_dir());
    if resolve_target(path).starts_with(&store_dir) {
        bail!(
            "Refusing to write {} into the store directory {}",
            path.display(),
            store_dir.display()
        );
    }
    Ok(())
}

/// Canonical form of `path`, or of its parent when it does not exist yet.
fn resolve_target(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Truncate a string to `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
