use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use wiki_dump_filter::cli::Cli;
use wiki_dump_filter::{filter_pages_streaming, open_dump, AllowList, FilterError};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let allowlist = AllowList::from_path(&cli.ids, cli.list_format())?;
    info!(ids = allowlist.len(), path = %cli.ids.display(), "loaded id list");
    if allowlist.is_empty() {
        warn!("id list is empty, the output will hold no pages");
    }

    let input = open_dump(&cli.input, cli.compression)?;
    let file = File::create(&cli.output).map_err(|source| FilterError::CreateOutput {
        path: cli.output.clone(),
        source,
    })?;
    let mut output = BufWriter::with_capacity(1 << 20, file);

    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        "filtering dump"
    );
    let report = filter_pages_streaming(input, &mut output, &allowlist, &cli.filter_options())
        .with_context(|| format!("failed to filter {}", cli.input.display()))?;

    info!(
        scanned = report.scanned,
        matched = report.matched,
        written = report.pages_written,
        limit_reached = report.limit_reached,
        truncated = report.truncated,
        "done"
    );
    if let (Some(algorithm), Some(checksum)) = (cli.digest, report.digest.as_deref()) {
        info!("{}: {}", algorithm.name(), checksum);
    }

    Ok(())
}
