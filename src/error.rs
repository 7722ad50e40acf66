use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;
use std::sync::Arc;

use thiserror::Error;

/// Errors that stop a filter run.
///
/// Only startup failures and hard I/O failures end up here. Anything wrong
/// with the markup of a single page is a [`DecodeError`] and is recovered
/// inside the pipeline.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to open input dump {}: {source}", .path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("failed to create output file {}: {source}", .path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("failed to open id list {}: {source}", .path.display())]
    OpenIdList { path: PathBuf, source: io::Error },

    #[error("failed to read id list {}: {source}", .path.display())]
    ReadIdList { path: PathBuf, source: io::Error },

    /// Non-EOF failure while reading or decompressing the dump.
    #[error("failed to read input dump: {0}")]
    Input(#[source] io::Error),

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

/// A recoverable problem while tokenizing one element or subtree.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("i/o error while decoding: {0}")]
    Io(#[from] io::Error),

    #[error("stream ended inside <{element}>")]
    UnexpectedEof { element: String },

    #[error("element content is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl DecodeError {
    /// Returns the underlying I/O error if the tokenizer failed because the
    /// byte stream itself failed, as opposed to bad markup.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            DecodeError::Io(err) => Some(err),
            DecodeError::Xml(quick_xml::Error::Io(err)) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Unwrap the I/O failure behind this error, handing back anything that
    /// is a markup problem instead.
    pub fn into_io(self) -> Result<io::Error, DecodeError> {
        match self {
            DecodeError::Io(err) => Ok(err),
            DecodeError::Xml(quick_xml::Error::Io(err)) => Ok(Arc::try_unwrap(err)
                .unwrap_or_else(|shared| io::Error::new(shared.kind(), shared.to_string()))),
            other => Err(other),
        }
    }

    /// True when the input ran out before the current element was closed.
    pub fn is_eof(&self) -> bool {
        match self {
            DecodeError::UnexpectedEof { .. } => true,
            _ => self
                .io_error()
                .is_some_and(|err| err.kind() == io::ErrorKind::UnexpectedEof),
        }
    }
}
