//! mbo-replay: rebuild a book from a JSON-lines journal and print a summary.
//!
//! Usage: mbo-replay <journal.jsonl> [config.toml] [expected-checksum]

use std::path::Path;

use anyhow::Context;
use mbo_book::config::BookConfig;
use mbo_book::replay::{parse_journal, ReplayEngine};
use mbo_book::view::DataSource;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let journal_path = args
        .next()
        .context("usage: mbo-replay <journal.jsonl> [config.toml] [expected-checksum]")?;
    let config = match args.next() {
        Some(path) => BookConfig::from_file(Path::new(&path))?,
        None => BookConfig::default(),
    };
    let expected = args.next();

    tracing::info!(journal = %journal_path, version = mbo_book::SERVICE_VERSION, "Starting replay");

    let text = std::fs::read_to_string(&journal_path)
        .with_context(|| format!("reading journal {journal_path}"))?;
    let batches = parse_journal(&text)?;

    let mut engine = ReplayEngine::new(config).with_reaper_sweeps();
    if let Some(checksum) = expected {
        engine = engine.with_expected_checksum(checksum);
    }
    let result = engine.replay(&batches)?;

    let book = &result.book;
    let mode = match book.source() {
        DataSource::Level3 => "level3",
        DataSource::Level2 => "level2",
    };
    println!("batches:        {}", result.metrics.batches_replayed);
    println!("duplicates:     {}", result.metrics.duplicates_dropped);
    println!("orders reaped:  {}", result.metrics.orders_reaped);
    println!("pending reaps:  {}", result.pending_reaps);
    println!("mode:           {mode}");
    println!("levels:         {}", book.level_count());
    println!("orders:         {}", book.order_count());
    println!("checksum:       {}", result.metrics.state_checksum);

    Ok(())
}
