//! Page selection for splitting, rasterization, and OCR dispatch.

use crate::error::{Error, Result};
use std::ops::RangeInclusive;

/// Which pages of a document an operation applies to.
///
/// Page numbers are 1-indexed throughout the public API.
#[derive(Debug, Clone, Default)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// An inclusive range of pages
    Range(RangeInclusive<u32>),
    /// Specific pages
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number is included in the selection.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Resolve the selection against a document's page count.
    ///
    /// Returns the sorted list of selected page numbers, or an error when
    /// the selection names a page past the end of the document.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>> {
        let pages: Vec<u32> = match self {
            PageSelection::All => (1..=page_count).collect(),
            PageSelection::Range(range) => {
                if *range.start() == 0 {
                    return Err(Error::InvalidPageRange("pages are 1-indexed".into()));
                }
                range.clone().collect()
            }
            PageSelection::Pages(pages) => {
                let mut pages = pages.clone();
                pages.sort_unstable();
                pages.dedup();
                pages
            }
        };

        if pages.is_empty() {
            return Err(Error::InvalidPageRange("empty selection".into()));
        }
        if let Some(&last) = pages.last() {
            if last > page_count {
                return Err(Error::PageOutOfRange(last, page_count));
            }
        }
        if pages.first() == Some(&0) {
            return Err(Error::InvalidPageRange("pages are 1-indexed".into()));
        }

        Ok(pages)
    }

    /// Parse a page selection string (e.g. "all", "1-10", "1,3,5-7").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let invalid = |part: &str| Error::InvalidPageRange(format!("invalid page '{part}'"));

        // Simple range without commas, e.g. "3-12"
        if !s.contains(',') {
            if let Some((start, end)) = s.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid(start))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid(end))?;
                if start == 0 || end < start {
                    return Err(Error::InvalidPageRange(s.to_string()));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid(part))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid(part))?;
                if start == 0 || end < start {
                    return Err(Error::InvalidPageRange(part.to_string()));
                }
                pages.extend(start..=end);
            } else {
                pages.push(part.parse().map_err(|_| invalid(part))?);
            }
        }

        pages.sort_unstable();
        pages.dedup();

        if pages.is_empty() || pages[0] == 0 {
            return Err(Error::InvalidPageRange(s.to_string()));
        }

        Ok(PageSelection::Pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        assert!(PageSelection::All.includes(1));
        assert!(PageSelection::All.includes(9999));

        let range = PageSelection::Range(5..=10);
        assert!(!range.includes(4));
        assert!(range.includes(5));
        assert!(range.includes(10));
        assert!(!range.includes(11));

        let pages = PageSelection::Pages(vec![1, 3, 5]);
        assert!(pages.includes(3));
        assert!(!pages.includes(2));
    }

    #[test]
    fn test_parse_all() {
        assert!(matches!(PageSelection::parse("all").unwrap(), PageSelection::All));
        assert!(matches!(PageSelection::parse("").unwrap(), PageSelection::All));
    }

    #[test]
    fn test_parse_range() {
        let sel = PageSelection::parse("2-6").unwrap();
        assert!(matches!(sel, PageSelection::Range(_)));
        assert!(sel.includes(2) && sel.includes(6) && !sel.includes(7));
    }

    #[test]
    fn test_parse_mixed() {
        let sel = PageSelection::parse("1,3,5-7,10").unwrap();
        match sel {
            PageSelection::Pages(pages) => assert_eq!(pages, vec![1, 3, 5, 6, 7, 10]),
            _ => panic!("expected Pages"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(PageSelection::parse("0-4").is_err());
        assert!(PageSelection::parse("5-2").is_err());
        assert!(PageSelection::parse("a,b").is_err());
    }

    #[test]
    fn test_resolve_bounds() {
        let sel = PageSelection::Range(1..=5);
        assert_eq!(sel.resolve(10).unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(matches!(
            sel.resolve(3),
            Err(Error::PageOutOfRange(5, 3))
        ));

        assert_eq!(PageSelection::All.resolve(3).unwrap(), vec![1, 2, 3]);

        let dup = PageSelection::Pages(vec![3, 1, 3]);
        assert_eq!(dup.resolve(3).unwrap(), vec![1, 3]);
    }
}
