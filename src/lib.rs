//! wiki-dump-filter - Fast streaming page filter for MediaWiki XML dumps
//!
//! This library extracts the pages whose numeric id appears in an allow list
//! from a compressed MediaWiki export (such as `enwiki-*-pages-articles.xml.bz2`)
//! and writes them back out as a smaller, well-formed dump. Inputs are many
//! gigabytes, so everything happens in one forward pass with memory bounded by
//! the size of a single page.
//!
//! # Key Features
//!
//! - **True streaming**: Decompresses, tokenizes and writes incrementally
//! - **Cheap rejection**: Pages not on the list are skipped right after their
//!   `<id>` without materializing their revisions
//! - **Verbatim copies**: `<siteinfo>` and `<revision>` markup is reproduced
//!   byte for byte
//! - **Order preservation**: Kept pages appear in input order
//! - **Always well-formed**: Truncated or damaged input still yields a closed
//!   document
//!
//! # Example
//!
//! ```no_run
//! use wiki_dump_filter::{filter_pages_streaming, open_dump, AllowList, Compression, FilterOptions};
//! use std::fs::File;
//! use std::io::BufWriter;
//! use std::path::Path;
//!
//! let input = open_dump(Path::new("enwiki-latest-pages-articles.xml.bz2"), Compression::Auto).unwrap();
//! let mut output = BufWriter::new(File::create("subset.xml").unwrap());
//! let allowlist: AllowList = [12, 25, 39].into_iter().collect();
//! let report = filter_pages_streaming(input, &mut output, &allowlist, &FilterOptions::default()).unwrap();
//! println!("kept {} of {} pages", report.matched, report.scanned);
//! ```

pub mod allowlist;
pub mod cli;
pub mod digest;
pub mod error;
pub mod filter;
pub mod output;
pub mod progress;
pub mod record;
pub mod source;

pub use allowlist::{AllowList, ListFormat};
pub use digest::DigestAlgorithm;
pub use error::{DecodeError, FilterError};
pub use filter::{
    decide, filter_pages_bytes, filter_pages_streaming, Decision, FilterOptions, FilterReport,
};
pub use source::{open_dump, Compression};
