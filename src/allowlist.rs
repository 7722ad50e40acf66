use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::FilterError;

/// Layout of the delimited id list file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFormat {
    /// Field separator; only the first field of each row is read
    pub delimiter: char,
    /// Whether the first row is a header and should be skipped
    pub has_header: bool,
}

impl Default for ListFormat {
    fn default() -> Self {
        ListFormat {
            delimiter: ',',
            has_header: true,
        }
    }
}

/// Immutable set of page ids to keep
///
/// Built once before the scan starts and only read afterwards. Lookups go
/// through `FxHashSet`, which is noticeably cheaper than SipHash for the
/// millions of `u64` probes a full dump produces.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    ids: FxHashSet<u64>,
}

impl AllowList {
    /// Read an id list from a delimited text file
    pub fn from_path(path: &Path, format: ListFormat) -> Result<Self, FilterError> {
        let file = File::open(path).map_err(|source| FilterError::OpenIdList {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), format).map_err(|source| FilterError::ReadIdList {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read an id list from any buffered reader
    ///
    /// Empty rows are ignored. Rows whose first field is not a base-10
    /// unsigned integer are skipped with a warning.
    pub fn from_reader<R: BufRead>(reader: R, format: ListFormat) -> io::Result<Self> {
        let mut ids = FxHashSet::default();
        let mut skipped = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if index == 0 && format.has_header {
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match parse_first_field(trimmed, format.delimiter) {
                Some(id) => {
                    ids.insert(id);
                }
                None => {
                    skipped += 1;
                    warn!(row = index + 1, line = trimmed, "skipping id list row without a numeric id");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, "id list contained rows that could not be parsed");
        }

        Ok(AllowList { ids })
    }

    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u64> for AllowList {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        AllowList {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Extract and parse the first field of a row, tolerating quotes and padding
fn parse_first_field(row: &str, delimiter: char) -> Option<u64> {
    let field = row.split(delimiter).next()?.trim();
    let field = field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
        .trim();
    field.parse().ok()
}
