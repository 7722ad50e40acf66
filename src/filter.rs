use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::allowlist::AllowList;
use crate::digest::{DigestAlgorithm, DigestWriter};
use crate::error::{DecodeError, FilterError};
use crate::output::OutputStreamer;
use crate::progress::{ProgressReporter, RunCounters};
use crate::record::PageRecord;
use crate::source::{StartTag, Token, TokenSource};

/// Tokenizer errors tolerated back to back before the scan gives up
const MAX_CONSECUTIVE_ERRORS: usize = 64;

/// Outcome of checking a page id against the allow list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Decode the rest of the page and write it out
    Keep,
    /// Skip the rest of the page unparsed
    Discard,
}

/// Decide whether a page survives the filter
#[inline]
pub fn decide(identifier: u64, allowlist: &AllowList) -> Decision {
    if allowlist.contains(identifier) {
        Decision::Keep
    } else {
        Decision::Discard
    }
}

/// Knobs for a single filter run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Stop after this many pages have had their id read
    pub limit: Option<u64>,
    /// Log a progress line every this many scanned pages, 0 to disable
    pub progress_every: u64,
    /// Hash the output while it is written
    pub digest: Option<DigestAlgorithm>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            limit: None,
            progress_every: 50,
            digest: None,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub scanned: u64,
    pub matched: u64,
    pub last_identifier: Option<u64>,
    pub pages_written: u64,
    /// The scan stopped because `limit` pages were scanned
    pub limit_reached: bool,
    /// The input ended early or was too damaged to continue; the output is
    /// still a closed document
    pub truncated: bool,
    /// Hex checksum of the output, when requested
    pub digest: Option<String>,
}

/// Stream a MediaWiki dump and keep only pages whose id is in `allowlist`
///
/// This function:
/// - Copies the root start tag and the `<siteinfo>` block unchanged
/// - Reads each page's title, namespace and id
/// - Skips the rest of the page unparsed when the id is not allowed
/// - Otherwise copies every `<revision>` verbatim, in input order
/// - Always closes the output document, even on truncated input
/// - Holds at most one page's header and one revision in memory
///
/// Markup errors inside a page are logged and recovered; only I/O failures
/// on the input (other than a premature end) or the output are returned.
pub fn filter_pages_streaming<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    allowlist: &AllowList,
    options: &FilterOptions,
) -> Result<FilterReport, FilterError> {
    // Hoist the digest choice out of the scan so the hot path is monomorphic
    match options.digest {
        Some(algorithm) => {
            let writer = DigestWriter::new(output, algorithm);
            let (mut report, writer) = Pipeline::new(input, writer, allowlist, options).run()?;
            let (checksum, _) = writer.finalize();
            report.digest = Some(checksum);
            Ok(report)
        }
        None => {
            let (report, _) = Pipeline::new(input, output, allowlist, options).run()?;
            Ok(report)
        }
    }
}

/// Convenience wrapper for in-memory dumps
pub fn filter_pages_bytes(
    input: &[u8],
    allowlist: &AllowList,
    options: &FilterOptions,
) -> Result<(Vec<u8>, FilterReport), FilterError> {
    let mut output = Vec::new();
    let report = filter_pages_streaming(input, &mut output, allowlist, options)?;
    Ok((output, report))
}

struct Pipeline<'a, R, W: Write> {
    source: TokenSource<R>,
    out: OutputStreamer<W>,
    allowlist: &'a AllowList,
    limit: Option<u64>,
    counters: RunCounters,
    progress: ProgressReporter,
    errors_in_a_row: usize,
    stopped: bool,
    truncated: bool,
    limit_reached: bool,
}

impl<'a, R: BufRead, W: Write> Pipeline<'a, R, W> {
    fn new(input: R, output: W, allowlist: &'a AllowList, options: &FilterOptions) -> Self {
        Pipeline {
            source: TokenSource::new(input),
            out: OutputStreamer::new(output),
            allowlist,
            limit: options.limit.filter(|&n| n > 0),
            counters: RunCounters::default(),
            progress: ProgressReporter::new(options.progress_every),
            errors_in_a_row: 0,
            stopped: false,
            truncated: false,
            limit_reached: false,
        }
    }

    fn run(mut self) -> Result<(FilterReport, W), FilterError> {
        self.scan_document()?;
        if self.out.page_open() {
            warn!(
                page = self.counters.last_identifier.unwrap_or(0),
                "closing page cut off by end of input"
            );
        }
        self.out.write_root_close().map_err(FilterError::Output)?;

        let report = FilterReport {
            scanned: self.counters.scanned,
            matched: self.counters.matched,
            last_identifier: self.counters.last_identifier,
            pages_written: self.out.pages_written(),
            limit_reached: self.limit_reached,
            truncated: self.truncated,
            digest: None,
        };
        let output = self.out.finish().map_err(FilterError::Output)?;
        Ok((report, output))
    }

    fn scan_document(&mut self) -> Result<(), FilterError> {
        let root = loop {
            match self.next()? {
                None | Some(Token::Eof) => return Ok(()),
                Some(Token::Start(tag)) => break tag,
                Some(Token::Empty(tag)) => {
                    return self.out.write_root_open(&tag).map_err(FilterError::Output);
                }
                Some(Token::End(_)) => continue,
            }
        };
        self.out.write_root_open(&root).map_err(FilterError::Output)?;

        while let Some(token) = self.next()? {
            match token {
                Token::Start(tag) => match tag.local_name() {
                    b"siteinfo" => {
                        let inner = self.capture(&tag, false)?;
                        self.out
                            .write_site_metadata(&tag, &inner)
                            .map_err(FilterError::Output)?;
                    }
                    b"page" => {
                        // A page that lost its end tag hands over the page that follows it
                        let mut next_page = Some(tag.clone());
                        while let Some(page_tag) = next_page.take() {
                            next_page = self.scan_page(&page_tag)?;
                            if self.limit_reached {
                                return Ok(());
                            }
                        }
                    }
                    _ => self.skip(&tag)?,
                },
                Token::Empty(_) => {}
                Token::End(name) if name == root.name() => break,
                // Left behind by a subtree that failed to decode
                Token::End(name) => {
                    debug!(element = %String::from_utf8_lossy(&name), "ignoring stray end tag");
                }
                Token::Eof => break,
            }
        }
        Ok(())
    }

    /// Walk the direct children of one `<page>`. Every child start tag is
    /// consumed whole (captured or skipped). End tags other than the page's
    /// own can only be leftovers of a child that failed to decode, so they
    /// are ignored.
    ///
    /// Returns the start of the next page when one opens before this page's
    /// end tag was seen.
    fn scan_page(&mut self, page_tag: &StartTag) -> Result<Option<StartTag>, FilterError> {
        let mut page = PageRecord::new();
        let mut keeping = false;

        while let Some(token) = self.next()? {
            match token {
                Token::End(name) if name == page_tag.name() => {
                    self.close_page(&mut page, keeping)?;
                    return Ok(None);
                }
                Token::End(name) => {
                    debug!(element = %String::from_utf8_lossy(&name), "ignoring stray end tag");
                }
                Token::Eof => break,
                Token::Empty(tag) => {
                    if keeping && tag.local_name() == b"revision" {
                        self.emit_revision(&mut page, &tag, "")?;
                    }
                }
                Token::Start(tag) => match tag.local_name() {
                    b"page" => {
                        warn!(page = page.identifier(), "page ended without its end tag");
                        self.close_page(&mut page, keeping)?;
                        return Ok(Some(tag.clone()));
                    }
                    b"title" if page.title.is_none() && !page.header_emitted => {
                        let title = self.capture(&tag, true)?;
                        page.set_title(title);
                    }
                    b"ns" if page.namespace.is_none() && !page.header_emitted => {
                        let text = self.capture(&tag, true)?;
                        page.set_namespace(&text);
                    }
                    b"id" if page.identifier.is_none() => {
                        let text = self.capture(&tag, true)?;
                        page.set_identifier(&text);
                        let id = page.identifier();

                        self.counters.record_scan(id);
                        self.progress.maybe_report(&self.counters);
                        if self.limit.is_some_and(|limit| self.counters.scanned >= limit) {
                            self.limit_reached = true;
                        }

                        match decide(id, self.allowlist) {
                            Decision::Keep => {
                                debug!(id, title = page.title(), "keeping page");
                                self.counters.record_match();
                                keeping = true;
                            }
                            Decision::Discard => {
                                self.skip(page_tag)?;
                                return Ok(None);
                            }
                        }
                    }
                    b"revision" if keeping => {
                        let inner = self.capture(&tag, false)?;
                        self.emit_revision(&mut page, &tag, &inner)?;
                    }
                    _ => self.skip(&tag)?,
                },
            }
        }

        // Input ended inside the page; closing the root closes it if it was opened
        Ok(None)
    }

    fn close_page(&mut self, page: &mut PageRecord, keeping: bool) -> Result<(), FilterError> {
        if keeping {
            self.emit_header(page)?;
            self.out.write_page_close().map_err(FilterError::Output)?;
        }
        Ok(())
    }

    fn emit_header(&mut self, page: &mut PageRecord) -> Result<(), FilterError> {
        if !page.header_emitted {
            self.out.write_page_open(page).map_err(FilterError::Output)?;
            page.header_emitted = true;
        }
        Ok(())
    }

    fn emit_revision(
        &mut self,
        page: &mut PageRecord,
        tag: &StartTag,
        inner: &str,
    ) -> Result<(), FilterError> {
        self.emit_header(page)?;
        self.out
            .write_revision_block(tag, inner)
            .map_err(FilterError::Output)
    }

    /// Next structural token, or `None` once the scan has to end
    fn next(&mut self) -> Result<Option<Token>, FilterError> {
        while !self.stopped {
            match self.source.next_token() {
                Ok(Token::Eof) => {
                    self.stopped = true;
                }
                Ok(token) => {
                    self.errors_in_a_row = 0;
                    return Ok(Some(token));
                }
                Err(err) => self.recover(err, "stream")?,
            }
        }
        Ok(None)
    }

    /// Captured content of `tag`, or an empty string if it could not be decoded
    fn capture(&mut self, tag: &StartTag, unescape: bool) -> Result<String, FilterError> {
        let result = if unescape {
            self.source.capture_text(tag)
        } else {
            self.source.capture_subtree(tag)
        };
        match result {
            Ok(text) => Ok(text),
            Err(err) => {
                self.recover(err, &tag.name_lossy())?;
                Ok(String::new())
            }
        }
    }

    fn skip(&mut self, tag: &StartTag) -> Result<(), FilterError> {
        match self.source.skip_subtree(tag) {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err, &tag.name_lossy()),
        }
    }

    /// Sort a decode error into fatal input failure, end of input, or a
    /// markup problem that is logged and stepped over.
    fn recover(&mut self, err: DecodeError, element: &str) -> Result<(), FilterError> {
        let position = self.source.position();
        let page = self.counters.last_identifier.unwrap_or(0);

        if err.is_eof() {
            warn!(element, position, page, "input ended early: {err}");
            self.truncated = true;
            self.stopped = true;
            return Ok(());
        }

        let err = match err.into_io() {
            Ok(io_err) => return Err(FilterError::Input(io_err)),
            Err(err) => err,
        };

        self.errors_in_a_row += 1;
        warn!(element, position, page, "skipping malformed content: {err}");
        if self.errors_in_a_row >= MAX_CONSECUTIVE_ERRORS {
            warn!(
                errors = self.errors_in_a_row,
                "too many consecutive decode errors, finishing output early"
            );
            self.truncated = true;
            self.stopped = true;
        }
        Ok(())
    }
}
