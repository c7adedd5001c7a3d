//! Crawl commands: case lists, case details and the pending set.

use anyhow::{bail, Context};
use console::style;

use crate::config::Settings;
use crate::pipeline::select_pending;

use crate::cli::helpers::{
    build_pipeline, detail_progress_bar, format_date, print_failed_urls, select_regions, truncate,
};

/// Crawl listing pages for each region and store newly listed cases.
pub async fn cmd_list(
    settings: &Settings,
    region_args: &[String],
    pending_only: bool,
    start: u32,
    end: u32,
) -> anyhow::Result<()> {
    if start == 0 || end < start {
        bail!("Invalid page range {}-{}", start, end);
    }
    let pipeline = build_pipeline(settings)?;
    let regions = select_regions(pipeline.store(), region_args, pending_only)?;

    let mut total_new = 0;
    let mut errors = 0;
    for region in regions {
        println!("\n{} {}", style("→").cyan(), style(region.name()).bold());
        match pipeline.update_case_list(region, start..=end).await {
            Ok(update) => {
                for pass in &update.passes {
                    println!(
                        "  pages {}-{}: {} listed, {} new",
                        pass.first_page,
                        pass.last_page,
                        pass.fetched,
                        style(pass.new).green()
                    );
                }
                print_failed_urls(update.failed_urls());
                total_new += update.new_count();
            }
            Err(e) => {
                errors += 1;
                println!("  {} {}", style("✗").red(), e);
            }
        }
    }

    println!(
        "\n{} {} new case(s) listed",
        style("✓").green(),
        total_new
    );
    if errors > 0 {
        bail!("{} region(s) could not be crawled", errors);
    }
    Ok(())
}

/// Fetch details for every pending case of each region.
pub async fn cmd_details(
    settings: &Settings,
    region_args: &[String],
    pending_only: bool,
) -> anyhow::Result<()> {
    let pb = detail_progress_bar();
    let pipeline = build_pipeline(settings)?.with_progress(pb.clone());
    let regions = select_regions(pipeline.store(), region_args, pending_only)?;

    let mut total_saved = 0;
    let mut errors = 0;
    for region in regions {
        pb.set_message(region.name());
        let result = pipeline.update_case_details(region).await;
        pb.suspend(|| match &result {
            Ok(update) if update.pending == 0 => {}
            Ok(update) => {
                println!(
                    "{} {}: {} pending, {} fetched, {} saved",
                    style("→").cyan(),
                    style(region.name()).bold(),
                    update.pending,
                    update.fetched,
                    style(update.saved).green()
                );
                print_failed_urls(update.failed_urls.iter().map(String::as_str));
            }
            Err(e) => println!("{} {}: {}", style("✗").red(), region.name(), e),
        });
        match result {
            Ok(update) => total_saved += update.saved,
            Err(_) => errors += 1,
        }
    }
    pb.finish_and_clear();

    println!("\n{} {} detail record(s) saved", style("✓").green(), total_saved);
    if errors > 0 {
        bail!("{} region(s) could not be crawled", errors);
    }
    Ok(())
}

/// Recompute and print the pending set of each region.
pub fn cmd_pending(settings: &Settings, region_args: &[String], show_links: bool) -> anyhow::Result<()> {
    let store = settings.store();
    let regions = select_regions(&store, region_args, false)?;

    let mut total = 0;
    for region in regions {
        let pending = select_pending(&store, region)
            .with_context(|| format!("Failed to compute pending cases for {}", region))?;
        if pending.is_empty() {
            continue;
        }
        total += pending.len();
        println!("{:<8} {:>6}", region.name(), pending.len());
        if show_links {
            for p in &pending {
                println!(
                    "    {}  {:<24} {}",
                    format_date(p.publish_date()),
                    truncate(&p.subject_name, 24),
                    style(&p.link).dim()
                );
            }
        }
    }
    println!("{} {} case(s) pending detail", style("✓").green(), total);
    Ok(())
}
