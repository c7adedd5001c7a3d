//! safecase - foreign-exchange enforcement case collector.
//!
//! Crawls the per-region enforcement listings, keeps an append-only CSV store
//! of case summaries and details, and answers searches over it.

pub mod cli;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scrapers;
pub mod search;
pub mod store;
