use std::path::PathBuf;

use clap::Parser;

use crate::allowlist::ListFormat;
use crate::digest::DigestAlgorithm;
use crate::filter::FilterOptions;
use crate::source::Compression;

/// Extract pages by id from a compressed MediaWiki XML dump
#[derive(Debug, Parser)]
#[command(name = "wiki-dump-filter", version, about)]
pub struct Cli {
    /// Compressed dump to read (.bz2, .gz or plain XML)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the filtered XML; created or truncated
    #[arg(short, long)]
    pub output: PathBuf,

    /// Delimited file of page ids; the first field of each row is used
    #[arg(long = "ids", value_name = "PATH")]
    pub ids: PathBuf,

    /// Stop after this many pages have been scanned (0 = no limit)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub limit: u64,

    /// Log progress every N scanned pages (0 = never)
    #[arg(long, default_value_t = 50, value_name = "N")]
    pub progress_every: u64,

    /// Field delimiter of the id list
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// The id list has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Compute a checksum of the filtered output
    #[arg(long, value_enum)]
    pub digest: Option<DigestAlgorithm>,

    /// Input compression; `auto` picks by file extension
    #[arg(long, value_enum, default_value_t = Compression::Auto)]
    pub compression: Compression,
}

impl Cli {
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            limit: (self.limit > 0).then_some(self.limit),
            progress_every: self.progress_every,
            digest: self.digest,
        }
    }

    pub fn list_format(&self) -> ListFormat {
        ListFormat {
            delimiter: self.delimiter,
            has_header: !self.no_header,
        }
    }
}
