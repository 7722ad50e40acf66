/// The page currently being scanned
///
/// One instance lives per `<page>` element and is dropped at its end tag.
/// Fields are first-wins: a second `<title>`, `<ns>` or `<id>` child of the
/// same page is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRecord {
    pub title: Option<String>,
    pub namespace: Option<u64>,
    pub identifier: Option<u64>,
    /// Set once the `<page>` opening block has been written for this page
    pub header_emitted: bool,
}

impl PageRecord {
    pub fn new() -> Self {
        PageRecord::default()
    }

    pub fn set_title(&mut self, title: String) {
        if self.title.is_none() {
            self.title = Some(title);
        }
    }

    pub fn set_namespace(&mut self, text: &str) {
        if self.namespace.is_none() {
            self.namespace = Some(parse_numeric(text));
        }
    }

    /// Record the page id; returns false if one was already set
    pub fn set_identifier(&mut self, text: &str) -> bool {
        if self.identifier.is_some() {
            return false;
        }
        self.identifier = Some(parse_numeric(text));
        true
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn namespace(&self) -> u64 {
        self.namespace.unwrap_or(0)
    }

    pub fn identifier(&self) -> u64 {
        self.identifier.unwrap_or(0)
    }
}

/// Parse a decimal field, falling back to 0 on anything non-numeric
#[inline]
pub fn parse_numeric(text: &str) -> u64 {
    text.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_wins() {
        let mut page = PageRecord::new();
        page.set_title("Anarchism".to_string());
        page.set_title("Other".to_string());
        page.set_namespace("0");
        page.set_namespace("4");
        assert!(page.set_identifier(" 12\n"));
        assert!(!page.set_identifier("99"));

        assert_eq!(page.title(), "Anarchism");
        assert_eq!(page.namespace(), 0);
        assert_eq!(page.identifier(), 12);
        assert!(!page.header_emitted);
    }

    #[test]
    fn test_malformed_numbers_become_zero() {
        assert_eq!(parse_numeric("12a"), 0);
        assert_eq!(parse_numeric(""), 0);
        assert_eq!(parse_numeric("-1"), 0);
        assert_eq!(parse_numeric("18446744073709551615"), u64::MAX);
    }

    #[test]
    fn test_missing_fields_default() {
        let page = PageRecord::new();
        assert_eq!(page.title(), "");
        assert_eq!(page.identifier, None);
    }
}
