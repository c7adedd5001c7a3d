//! Search and drill-down over stored case details.

use std::path::Path;

use anyhow::{bail, Context};
use console::style;

use crate::cli::helpers::{ensure_outside_store, format_date, parse_regions, truncate};
use crate::config::Settings;
use crate::models::{fields, parse_date, DetailRecord};
use crate::pipeline::load_complete_details;
use crate::search::{search, SearchCriteria};
use crate::store::write_table;

/// Search flags as given on the command line.
pub struct SearchArgs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub doc: String,
    pub subject: String,
    pub violation: String,
    pub penalty: String,
    pub authority: String,
    pub regions: Vec<String>,
    pub min_amount: f64,
}

fn parse_bound(flag: &str, value: Option<&str>) -> anyhow::Result<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(raw) => match parse_date(raw) {
            Some(date) => Ok(Some(date)),
            None => bail!("Invalid {} date '{}', expected YYYY-MM-DD", flag, raw),
        },
    }
}

impl SearchArgs {
    fn into_criteria(self) -> anyhow::Result<SearchCriteria> {
        let regions = if self.regions.is_empty() {
            Vec::new()
        } else {
            parse_regions(&self.regions)?
        };
        Ok(SearchCriteria {
            start: parse_bound("--from", self.from.as_deref())?,
            end: parse_bound("--to", self.to.as_deref())?,
            document_no: self.doc,
            subject_name: self.subject,
            violation_type: self.violation,
            penalty_content: self.penalty,
            authority: self.authority,
            regions,
            min_amount: self.min_amount,
        })
    }
}

/// Filter stored details and print (or write) the matches.
pub fn cmd_search(
    settings: &Settings,
    args: SearchArgs,
    output: Option<&Path>,
    limit: usize,
) -> anyhow::Result<()> {
    let criteria = args.into_criteria()?;
    let records = load_complete_details(&settings.store(), None).context("Failed to read the case store")?;
    let hits = search(&records, &criteria);

    if let Some(path) = output {
        ensure_outside_store(settings, path)?;
        write_table(path, &DetailRecord::to_table(&hits))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Wrote {} record(s) to {}",
            style("✓").green(),
            hits.len(),
            path.display()
        );
    }

    if hits.is_empty() {
        println!("{} No matching cases", style("!").yellow());
        return Ok(());
    }

    let shown = if limit == 0 { hits.len() } else { limit.min(hits.len()) };
    println!(
        "{:<10} {:<6} {:<28} {:>10}  {}",
        style("Date").bold(),
        style("Region").bold(),
        style("Subject").bold(),
        style("万元").bold(),
        style("Document").bold()
    );
    for r in &hits[..shown] {
        println!(
            "{:<10} {:<6} {:<28} {:>10.2}  {}",
            format_date(r.publish_date()),
            r.region().name(),
            truncate(r.field_or_empty(fields::SUBJECT_NAME), 28),
            r.amount(),
            r.field_or_empty(fields::DOCUMENT_NO)
        );
    }
    if shown < hits.len() {
        println!("  … {} more (use --limit 0 or --output)", hits.len() - shown);
    }
    println!("{} {} matching case(s)", style("✓").green(), hits.len());
    Ok(())
}

/// Print every field of the case at `link`.
pub fn cmd_show(settings: &Settings, link: &str) -> anyhow::Result<()> {
    let records = load_complete_details(&settings.store(), None).context("Failed to read the case store")?;
    let Some(record) = records.iter().find(|r| r.link() == link) else {
        bail!("No stored details for {}", link);
    };

    println!("\n{}", style(record.field_or_empty(fields::SUBJECT_NAME)).bold());
    println!("{}", "─".repeat(60));
    println!("{:<16} {}", "区域", record.region().name());
    println!("{:<16} {}", "date", record.raw_date());
    println!("{:<16} {}", "link", record.link());
    for (name, value) in record.fields() {
        println!("{:<16} {}", style(name).cyan(), value);
    }
    println!("{:<16} {:.2}", "total (万元)", record.amount());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Region;

    fn args() -> SearchArgs {
        SearchArgs {
            from: None,
            to: None,
            doc: String::new(),
            subject: String::new(),
            violation: String::new(),
            penalty: String::new(),
            authority: String::new(),
            regions: Vec::new(),
            min_amount: 0.0,
        }
    }

    #[test]
    fn test_criteria_from_args() {
        let criteria = SearchArgs {
            from: Some("2024-01-01".into()),
            regions: vec!["jiangsu".into()],
            ..args()
        }
        .into_criteria()
        .unwrap();
        assert_eq!(criteria.start, parse_date("2024/01/01"));
        assert_eq!(criteria.end, None);
        assert_eq!(criteria.regions, vec![Region::Jiangsu]);
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let result = SearchArgs {
            to: Some("last week".into()),
            ..args()
        }
        .into_criteria();
        assert!(result.is_err());
    }
}
