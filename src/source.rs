//! Incremental XML tokenizer over a (possibly compressed) dump stream.
//!
//! The token source hands out only element boundaries. Whatever sits inside
//! an element the caller cares about is pulled out in one go with
//! [`TokenSource::capture_subtree`], and everything else is stepped over with
//! [`TokenSource::skip_subtree`]. Skipping only counts nesting depth while
//! scanning for the matching end tag; nothing inside the subtree is copied.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use crate::error::{DecodeError, FilterError};

/// Read buffer placed between the decompressor and the tokenizer
const READ_BUFFER_SIZE: usize = 1 << 20;

/// Compression container of the input dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Compression {
    /// Pick by file extension
    #[default]
    Auto,
    /// Multistream bzip2, the format of the official dumps
    Bzip2,
    /// Gzip, possibly multi-member
    Gzip,
    /// Plain XML
    None,
}

impl Compression {
    /// Resolve `Auto` against a path's extension
    pub fn resolve(self, path: &Path) -> Compression {
        if self != Compression::Auto {
            return self;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "bz2" | "bzip2" => Compression::Bzip2,
            "gz" | "gzip" => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Open a dump file and wrap it in the matching decompressor
pub fn open_dump(path: &Path, compression: Compression) -> Result<Box<dyn BufRead>, FilterError> {
    let file = File::open(path).map_err(|source| FilterError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;

    let reader: Box<dyn BufRead> = match compression.resolve(path) {
        Compression::Bzip2 => Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            MultiBzDecoder::new(file),
        )),
        Compression::Gzip => Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            MultiGzDecoder::new(file),
        )),
        Compression::None | Compression::Auto => {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        }
    };
    Ok(reader)
}

/// An element start tag, kept as its raw bytes so it can be written back
/// unchanged (attributes, namespace declarations and spacing included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    raw: Vec<u8>,
    name_len: usize,
}

impl StartTag {
    fn from_event(start: &BytesStart<'_>) -> Self {
        StartTag {
            raw: start.to_vec(),
            name_len: start.name().as_ref().len(),
        }
    }

    /// Build a start tag without attributes
    pub fn bare(name: &str) -> Self {
        StartTag {
            raw: name.as_bytes().to_vec(),
            name_len: name.len(),
        }
    }

    /// Qualified name, prefix included
    pub fn name(&self) -> &[u8] {
        &self.raw[..self.name_len]
    }

    /// Name with any namespace prefix removed
    pub fn local_name(&self) -> &[u8] {
        local_part(self.name())
    }

    /// Everything between `<` and `>`
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name())
    }
}

/// Strip a `prefix:` from a qualified name
pub fn local_part(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Structural parse events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name ...>`; the caller must consume its subtree with either
    /// `capture_subtree` or `skip_subtree`, or keep reading its children
    Start(StartTag),
    /// `<name .../>`
    Empty(StartTag),
    /// `</name>`, carrying the qualified name
    End(Vec<u8>),
    /// The stream is exhausted
    Eof,
}

/// Lazy event stream over a buffered byte source
pub struct TokenSource<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> TokenSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        // Whitespace inside captured subtrees must survive byte for byte
        reader.config_mut().trim_text(false);
        TokenSource {
            reader,
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Byte offset into the decompressed stream
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Advance to the next element boundary, dropping text, comments,
    /// declarations and processing instructions in between.
    pub fn next_token(&mut self) -> Result<Token, DecodeError> {
        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Token::Start(StartTag::from_event(&e)),
                Event::Empty(e) => Token::Empty(StartTag::from_event(&e)),
                Event::End(e) => Token::End(e.name().as_ref().to_vec()),
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    /// Consume the subtree of `start` (already read) and return its inner
    /// markup exactly as it would be written back out, entities still escaped.
    pub fn capture_subtree(&mut self, start: &StartTag) -> Result<String, DecodeError> {
        let mut writer = Writer::new(Vec::new());
        let mut depth = 0usize;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    depth += 1;
                    writer.write_event(Event::Start(e))?;
                }
                Event::End(e) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    writer.write_event(Event::End(e))?;
                }
                Event::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: start.name_lossy().into_owned(),
                    });
                }
                other => writer.write_event(other)?,
            }
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Text content of `start` with character and entity references
    /// resolved. Only text and CDATA count; comments, processing
    /// instructions and the tags of nested elements are dropped. Used for
    /// scalar fields such as titles and ids.
    pub fn capture_text(&mut self, start: &StartTag) -> Result<String, DecodeError> {
        let mut text = String::new();
        let mut depth = 0usize;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                // A bad entity reference keeps the escaped form rather than losing the field
                Event::Text(e) => match e.unescape() {
                    Ok(unescaped) => text.push_str(&unescaped),
                    Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
                },
                Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
                Event::Eof => {
                    return Err(DecodeError::UnexpectedEof {
                        element: start.name_lossy().into_owned(),
                    });
                }
                _ => {}
            }
        }

        Ok(text)
    }

    /// Discard everything up to and including the end tag matching `start`
    pub fn skip_subtree(&mut self, start: &StartTag) -> Result<(), DecodeError> {
        self.buf.clear();
        let result = self
            .reader
            .read_to_end_into(QName(start.name()), &mut self.buf);
        self.buf.clear();
        result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_start<R: BufRead>(source: &mut TokenSource<R>, name: &[u8]) -> StartTag {
        match source.next_token().unwrap() {
            Token::Start(tag) if tag.local_name() == name => tag,
            other => panic!("expected <{}>, got {other:?}", String::from_utf8_lossy(name)),
        }
    }

    #[test]
    fn test_tokens_skip_text_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<root a=\"1\">\n  <!-- c -->\n  <x/>\n</root>";
        let mut source = TokenSource::new(xml.as_bytes());

        let root = expect_start(&mut source, b"root");
        assert_eq!(root.raw(), b"root a=\"1\"");
        assert!(matches!(source.next_token().unwrap(), Token::Empty(tag) if tag.name() == b"x"));
        assert_eq!(source.next_token().unwrap(), Token::End(b"root".to_vec()));
        assert_eq!(source.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_capture_is_byte_identical() {
        let inner = "\n      <id>7</id>\n      <text xml:space=\"preserve\">a &amp; b &lt;ref/&gt;</text>\n      <minor />\n      <!-- note --><![CDATA[x<y]]>\n    ";
        let xml = format!("<revision>{inner}</revision><next/>");
        let mut source = TokenSource::new(xml.as_bytes());

        let revision = expect_start(&mut source, b"revision");
        assert_eq!(source.capture_subtree(&revision).unwrap(), inner);
        // The stream resumes right after </revision>
        assert!(matches!(source.next_token().unwrap(), Token::Empty(tag) if tag.name() == b"next"));
    }

    #[test]
    fn test_capture_text_unescapes() {
        let xml = "<title>AT&amp;T &#38; friends</title>";
        let mut source = TokenSource::new(xml.as_bytes());

        let title = expect_start(&mut source, b"title");
        assert_eq!(source.capture_text(&title).unwrap(), "AT&T & friends");
    }

    #[test]
    fn test_capture_text_reads_cdata_and_drops_comments() {
        let xml = "<id><![CDATA[5]]></id><ns><!-- main -->0</ns><title>a<?pi x?>b</title>";
        let mut source = TokenSource::new(xml.as_bytes());

        let id = expect_start(&mut source, b"id");
        assert_eq!(source.capture_text(&id).unwrap(), "5");
        let ns = expect_start(&mut source, b"ns");
        assert_eq!(source.capture_text(&ns).unwrap(), "0");
        let title = expect_start(&mut source, b"title");
        assert_eq!(source.capture_text(&title).unwrap(), "ab");
    }

    #[test]
    fn test_capture_truncated_subtree() {
        let xml = "<revision><text>never closed";
        let mut source = TokenSource::new(xml.as_bytes());

        let revision = expect_start(&mut source, b"revision");
        assert!(source.capture_subtree(&revision).is_err());
    }

    #[test]
    fn test_skip_resumes_after_matching_end() {
        let xml = "<page><id>1</id><page-ish/><revision><id>2</id></revision></page><page><id>3</id></page>";
        let mut source = TokenSource::new(xml.as_bytes());

        let first = expect_start(&mut source, b"page");
        source.skip_subtree(&first).unwrap();

        expect_start(&mut source, b"page");
        let id = expect_start(&mut source, b"id");
        assert_eq!(source.capture_text(&id).unwrap(), "3");
        assert_eq!(source.next_token().unwrap(), Token::End(b"page".to_vec()));
    }

    #[test]
    fn test_skip_handles_nested_same_name() {
        let xml = "<a><a><a/></a><b/></a><c/>";
        let mut source = TokenSource::new(xml.as_bytes());

        let outer = expect_start(&mut source, b"a");
        source.skip_subtree(&outer).unwrap();
        assert!(matches!(source.next_token().unwrap(), Token::Empty(tag) if tag.name() == b"c"));
    }

    #[test]
    fn test_prefixed_names() {
        let xml = "<mw:page xmlns:mw=\"urn:x\"></mw:page>";
        let mut source = TokenSource::new(xml.as_bytes());

        let page = expect_start(&mut source, b"page");
        assert_eq!(page.name(), b"mw:page");
        assert_eq!(page.local_name(), b"page");
    }

    #[test]
    fn test_compression_resolution() {
        assert_eq!(
            Compression::Auto.resolve(Path::new("enwiki-pages-articles.xml.bz2")),
            Compression::Bzip2
        );
        assert_eq!(Compression::Auto.resolve(Path::new("dump.xml.GZ")), Compression::Gzip);
        assert_eq!(Compression::Auto.resolve(Path::new("dump.xml")), Compression::None);
        assert_eq!(Compression::Gzip.resolve(Path::new("dump.xml.bz2")), Compression::Gzip);
    }

    #[test]
    fn test_open_missing_dump_is_fatal() {
        let err = open_dump(Path::new("/nonexistent/dump.xml.bz2"), Compression::Auto)
            .err()
            .unwrap();
        assert!(matches!(err, FilterError::OpenInput { .. }));
    }
}
