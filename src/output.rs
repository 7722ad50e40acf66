use std::io::{self, Write};

use quick_xml::escape::escape;

use crate::record::PageRecord;
use crate::source::StartTag;

/// Root element used when the input never produced one
pub const DEFAULT_ROOT: &str = "mediawiki";
const SITEINFO: &str = "siteinfo";

/// Append-only writer for the filtered document
///
/// Tracks just enough state to keep the output well-formed no matter where
/// the input stops: the root is opened once, the site metadata block is
/// written exactly once before the first page, and closing the root closes
/// any page left open.
pub struct OutputStreamer<W: Write> {
    out: W,
    root_name: Vec<u8>,
    root_open: bool,
    site_written: bool,
    page_open: bool,
    closed: bool,
    pages_written: u64,
}

impl<W: Write> OutputStreamer<W> {
    pub fn new(out: W) -> Self {
        OutputStreamer {
            out,
            root_name: DEFAULT_ROOT.as_bytes().to_vec(),
            root_open: false,
            site_written: false,
            page_open: false,
            closed: false,
            pages_written: 0,
        }
    }

    /// Open the document with the input's own root tag
    pub fn write_root_open(&mut self, root: &StartTag) -> io::Result<()> {
        if self.root_open {
            return Ok(());
        }
        self.root_name = root.name().to_vec();
        self.out.write_all(b"<")?;
        self.out.write_all(root.raw())?;
        self.out.write_all(b">\n")?;
        self.root_open = true;
        Ok(())
    }

    /// Copy the site metadata block; later calls are ignored
    pub fn write_site_metadata(&mut self, tag: &StartTag, inner: &str) -> io::Result<()> {
        if self.site_written {
            return Ok(());
        }
        self.ensure_root()?;
        self.write_raw_block(b"  ", tag, inner)?;
        self.site_written = true;
        Ok(())
    }

    /// Write the `<page>` opening block with title, namespace and id
    pub fn write_page_open(&mut self, page: &PageRecord) -> io::Result<()> {
        self.ensure_site_metadata()?;
        self.out.write_all(b"  <page>\n")?;
        writeln!(self.out, "    <title>{}</title>", escape(page.title()))?;
        writeln!(self.out, "    <ns>{}</ns>", page.namespace())?;
        writeln!(self.out, "    <id>{}</id>", page.identifier())?;
        self.page_open = true;
        Ok(())
    }

    /// Copy one revision verbatim into the open page
    pub fn write_revision_block(&mut self, tag: &StartTag, inner: &str) -> io::Result<()> {
        debug_assert!(self.page_open, "revision written outside of a page");
        self.write_raw_block(b"    ", tag, inner)
    }

    pub fn write_page_close(&mut self) -> io::Result<()> {
        if !self.page_open {
            return Ok(());
        }
        self.out.write_all(b"  </page>\n")?;
        self.page_open = false;
        self.pages_written += 1;
        Ok(())
    }

    /// Close whatever is open and the root itself, then flush. Only the
    /// first call writes anything.
    pub fn write_root_close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.write_page_close()?;
        self.ensure_site_metadata()?;
        self.out.write_all(b"</")?;
        self.out.write_all(&self.root_name)?;
        self.out.write_all(b">\n")?;
        self.root_open = false;
        self.closed = true;
        self.out.flush()
    }

    pub fn page_open(&self) -> bool {
        self.page_open
    }

    pub fn pages_written(&self) -> u64 {
        self.pages_written
    }

    /// Close the document if that has not happened yet and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        self.write_root_close()?;
        Ok(self.out)
    }

    fn ensure_root(&mut self) -> io::Result<()> {
        if self.root_open {
            return Ok(());
        }
        self.write_root_open(&StartTag::bare(DEFAULT_ROOT))
    }

    /// Emit an empty siteinfo block if the input had none before this point
    fn ensure_site_metadata(&mut self) -> io::Result<()> {
        if self.site_written {
            return Ok(());
        }
        self.write_site_metadata(&StartTag::bare(SITEINFO), "")
    }

    fn write_raw_block(&mut self, indent: &[u8], tag: &StartTag, inner: &str) -> io::Result<()> {
        self.out.write_all(indent)?;
        self.out.write_all(b"<")?;
        self.out.write_all(tag.raw())?;
        self.out.write_all(b">")?;
        self.out.write_all(inner.as_bytes())?;
        self.out.write_all(b"</")?;
        self.out.write_all(tag.name())?;
        self.out.write_all(b">\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(title: &str, ns: &str, id: &str) -> PageRecord {
        let mut record = PageRecord::new();
        record.set_title(title.to_string());
        record.set_namespace(ns);
        record.set_identifier(id);
        record
    }

    #[test]
    fn test_full_document_layout() {
        let mut streamer = OutputStreamer::new(Vec::new());
        streamer
            .write_root_open(&StartTag::bare("mediawiki"))
            .unwrap();
        streamer
            .write_site_metadata(&StartTag::bare("siteinfo"), "<sitename>Wikipedia</sitename>")
            .unwrap();
        streamer.write_page_open(&page("Q&A <intro>", "0", "10")).unwrap();
        streamer
            .write_revision_block(&StartTag::bare("revision"), "<text>a &amp; b</text>")
            .unwrap();
        streamer.write_page_close().unwrap();
        streamer.write_root_close().unwrap();

        let expected = "<mediawiki>\n\
                        \x20 <siteinfo><sitename>Wikipedia</sitename></siteinfo>\n\
                        \x20 <page>\n\
                        \x20   <title>Q&amp;A &lt;intro&gt;</title>\n\
                        \x20   <ns>0</ns>\n\
                        \x20   <id>10</id>\n\
                        \x20   <revision><text>a &amp; b</text></revision>\n\
                        \x20 </page>\n\
                        </mediawiki>\n";
        assert_eq!(String::from_utf8(streamer.finish().unwrap()).unwrap(), expected);
    }

    #[test]
    fn test_close_without_anything_is_well_formed() {
        let streamer = OutputStreamer::new(Vec::new());

        assert_eq!(
            String::from_utf8(streamer.finish().unwrap()).unwrap(),
            "<mediawiki>\n  <siteinfo></siteinfo>\n</mediawiki>\n"
        );
    }

    #[test]
    fn test_root_close_closes_open_page() {
        let mut streamer = OutputStreamer::new(Vec::new());
        streamer.write_page_open(&page("T", "0", "1")).unwrap();
        assert!(streamer.page_open());
        streamer.write_root_close().unwrap();

        assert_eq!(streamer.pages_written(), 1);
        let out = String::from_utf8(streamer.finish().unwrap()).unwrap();
        assert!(out.ends_with("  </page>\n</mediawiki>\n"));
        assert_eq!(out.matches("<siteinfo>").count(), 1);
    }

    #[test]
    fn test_site_metadata_written_once() {
        let mut streamer = OutputStreamer::new(Vec::new());
        let tag = StartTag::bare("siteinfo");
        streamer.write_site_metadata(&tag, "<a/>").unwrap();
        streamer.write_site_metadata(&tag, "<b/>").unwrap();
        streamer.write_root_close().unwrap();

        let out = String::from_utf8(streamer.finish().unwrap()).unwrap();
        assert!(out.contains("<siteinfo><a/></siteinfo>"));
        assert!(!out.contains("<b/>"));
    }

    #[test]
    fn test_root_close_is_written_once() {
        let mut streamer = OutputStreamer::new(Vec::new());
        streamer.write_page_open(&page("T", "0", "1")).unwrap();
        streamer.write_root_close().unwrap();
        streamer.write_root_close().unwrap();

        let out = String::from_utf8(streamer.finish().unwrap()).unwrap();
        assert_eq!(out.matches("</mediawiki>").count(), 1);
        assert_eq!(out.matches("</page>").count(), 1);
    }
}
