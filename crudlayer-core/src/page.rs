//! Offset/limit pagination and the list metadata headers.
//!
//! A limit of `0` means "no limit", which is also how the stores interpret it.

use crate::request::ResponseSink;

/// Header carrying the number of records matching a list filter.
pub const TOTAL_HEADER: &str = "X-Total";

/// Header carrying the number of pages, present only when a limit was requested.
pub const TOTAL_PAGES_HEADER: &str = "X-Total-Pages";

/// Offset and limit of a list request.
///
/// # Example
///
/// ```ignore
/// use crudlayer::page::Pagination;
///
/// let page = Pagination::new(0, 2);
/// assert_eq!(page.total_pages(3), Some(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Number of records to skip.
    pub offset: u64,
    /// Maximum number of records to return, `0` for all.
    pub limit: u64,
}

impl Pagination {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Returns whether a limit was requested.
    pub fn is_limited(&self) -> bool {
        self.limit > 0
    }

    /// Number of pages needed for `count` records, or `None` without a limit.
    pub fn total_pages(&self, count: u64) -> Option<u64> {
        self.is_limited().then(|| count.div_ceil(self.limit))
    }

    /// Writes [`TOTAL_HEADER`] and, when limited, [`TOTAL_PAGES_HEADER`] for `count` matches.
    pub fn write_headers(&self, count: u64, sink: &mut dyn ResponseSink) {
        sink.set_header(TOTAL_HEADER, count.to_string());

        if let Some(pages) = self.total_pages(count) {
            sink.set_header(TOTAL_PAGES_HEADER, pages.to_string());
        }
    }
}

/// Parses an integer the way lenient query strings are read.
///
/// Leading whitespace and an optional sign are accepted, then as many digits as
/// follow; anything after them is ignored (`"12abc"` reads as `12`). Input with
/// no leading digits reads as `0`, and negative values clamp to `0`.
pub fn parse_count(raw: &str) -> u64 {
    match leading_integer(raw) {
        (false, value) => value,
        (true, _) => 0,
    }
}

/// Parses a page size the same way as [`parse_count`], except that a negative
/// value reads as its magnitude (`"-2"` reads as `2`), the way the database
/// driver treats a negative limit.
pub fn parse_limit(raw: &str) -> u64 {
    leading_integer(raw).1
}

fn leading_integer(raw: &str) -> (bool, u64) {
    let trimmed = raw.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits = unsigned
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(unsigned, |(end, _)| &unsigned[..end]);

    if digits.is_empty() {
        return (false, 0);
    }

    (negative, digits.parse().unwrap_or(u64::MAX))
}
