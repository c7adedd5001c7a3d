//! Status, statistics and export commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::cli::helpers::{ensure_outside_store, format_date, parse_regions};
use crate::config::Settings;
use crate::models::{timestamp_now, DetailRecord, Region, SummaryRecord};
use crate::pipeline::{load_complete_details, load_summaries, staleness};
use crate::report::{amount_table, by_region_counts, coverage, monthly, region_overview, save_amounts};
use crate::store::{write_table, DETAIL_PREFIX, EXTENSION, SUMMARY_PREFIX};

/// Stored counts per region. Yellow marks missing details, magenta marks
/// details whose newest date trails the newest listing.
pub fn cmd_status(settings: &Settings, region_args: &[String]) -> anyhow::Result<()> {
    let regions = parse_regions(region_args)?;
    let store = settings.store();
    let report = staleness(&store, &regions).context("Failed to read the case store")?;

    println!();
    println!("{}", style("safecase status").bold());
    println!("{}", "─".repeat(70));
    println!("Data Dir: {}", settings.data_dir.display());
    println!();
    println!(
        "  {:<8} {:>8} {:>8}  {:<10} {:<10}",
        "Region", "Listed", "Detailed", "Listed to", "Detail to"
    );

    let mut pending = 0;
    for s in &report {
        let marker = if s.is_pending() {
            pending += 1;
            style("●").yellow()
        } else if s.detail_lags() {
            pending += 1;
            style("●").magenta()
        } else {
            style("●").green()
        };
        println!(
            "{} {:<8} {:>8} {:>8}  {:<10} {:<10}",
            marker,
            s.region.name(),
            s.summary_count,
            s.detail_count,
            format_date(s.latest_summary),
            format_date(s.latest_detail)
        );
    }

    let details = load_complete_details(&store, None).context("Failed to read the case store")?;
    let overview = region_overview(&details);
    println!();
    println!(
        "{} detailed case(s), {} to {}; {} region(s) pending",
        overview.total,
        format_date(overview.earliest),
        format_date(overview.latest),
        pending
    );
    Ok(())
}

/// Per-region date spans, region ranking and monthly totals.
pub fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let store = settings.store();
    let details = load_complete_details(&store, None).context("Failed to read the case store")?;
    let summaries = load_summaries(&store, None).context("Failed to read the case store")?;

    println!("\n{}", style("REGIONS").cyan().bold());
    for r in region_overview(&details).regions {
        let cov = coverage(r.region, &summaries, &details);
        println!(
            "  {:<8} {:<10} {:>6} cases  {} to {}  ({} listed links)",
            r.region.name(),
            r.region.province(),
            r.count,
            format_date(r.earliest),
            format_date(r.latest),
            cov.summary.distinct_links
        );
    }

    println!("\n{}", style("RANKING").cyan().bold());
    for (idx, (region, count)) in by_region_counts(&details).iter().enumerate() {
        println!("  {:>2}. {:<8} {:>6}", idx + 1, region.name(), count);
    }

    println!("\n{}", style("MONTHLY").cyan().bold());
    for bucket in monthly(&details) {
        println!(
            "  {}  {:>5} cases  {:>12.2} 万元",
            bucket.month, bucket.count, bucket.amount
        );
    }
    Ok(())
}

/// Total penalty per case; optionally stored as an amount file.
pub fn cmd_amounts(settings: &Settings, save: bool) -> anyhow::Result<()> {
    let store = settings.store();
    let details = load_complete_details(&store, None).context("Failed to read the case store")?;
    let table = amount_table(&details);

    let total: f64 = details.iter().map(DetailRecord::amount).sum();
    println!(
        "{} case(s), {:.2} 万元 in total",
        details.len(),
        total
    );

    if save {
        let path = save_amounts(&store, &table).context("Failed to write amount table")?;
        println!("{} Wrote {}", style("✓").green(), path.display());
    }
    Ok(())
}

/// Write per-region and aggregate summary and detail tables into `dir`.
pub fn cmd_export(settings: &Settings, dir: &Path) -> anyhow::Result<()> {
    ensure_outside_store(settings, dir)?;
    let store = settings.store();
    let summaries = load_summaries(&store, None).context("Failed to read the case store")?;
    let details = load_complete_details(&store, None).context("Failed to read the case store")?;
    let ts = timestamp_now();

    let write = |name: String, table: crate::store::Table| -> anyhow::Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        let path = dir.join(format!("{}.{}", name, EXTENSION));
        write_table(&path, &table).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {} {} ({} rows)", style("✓").green(), path.display(), table.len());
        Ok(())
    };

    for region in Region::all() {
        let region_summaries: Vec<SummaryRecord> =
            summaries.iter().filter(|s| s.region == region).cloned().collect();
        let region_details: Vec<DetailRecord> =
            details.iter().filter(|d| d.region() == region).cloned().collect();
        write(
            format!("{}{}{}", SUMMARY_PREFIX, region.code(), ts),
            SummaryRecord::to_table(&region_summaries),
        )?;
        write(
            format!("{}{}{}", DETAIL_PREFIX, region.code(), ts),
            DetailRecord::to_table(&region_details),
        )?;
    }
    write(
        format!("{}all{}", SUMMARY_PREFIX, ts),
        SummaryRecord::to_table(&summaries),
    )?;
    write(
        format!("{}all{}", DETAIL_PREFIX, ts),
        DetailRecord::to_table(&details),
    )?;

    println!(
        "{} Exported {} summary and {} detail record(s)",
        style("✓").green(),
        summaries.len(),
        details.len()
    );
    Ok(())
}
