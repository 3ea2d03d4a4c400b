use std::fmt;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const DEFAULT_PAGE_NUMBER: i64 = 1;

/// A validated request for one window of an insertion-ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_size: i64,
    page_number: i64,
}

impl PageRequest {
    pub fn new(page_size: i64, page_number: i64) -> Result<Self, PageError> {
        if page_size <= 0 {
            return Err(PageError::InvalidPageSize(page_size));
        }
        if page_number < 1 {
            return Err(PageError::InvalidPageNumber(page_number));
        }
        // The offset must be representable for the store query.
        page_size
            .checked_mul(page_number - 1)
            .ok_or(PageError::OffsetOverflow)?;
        Ok(Self {
            page_size,
            page_number,
        })
    }

    /// Build a request from raw query-string values.
    ///
    /// Absent, blank or non-integer values fall back to the defaults, and a
    /// page number of zero means the first page. An explicit page size of
    /// zero (or below) is rejected rather than defaulted, since it has no
    /// page count.
    pub fn from_query(page_size: Option<&str>, page_number: Option<&str>) -> Result<Self, PageError> {
        Self::from_numbers(
            coerce(page_size).unwrap_or(DEFAULT_PAGE_SIZE),
            coerce(page_number).unwrap_or(DEFAULT_PAGE_NUMBER),
        )
    }

    /// Like [`PageRequest::new`], but page number zero means the first page.
    /// Every entry point builds its request through here.
    pub fn from_numbers(page_size: i64, page_number: i64) -> Result<Self, PageError> {
        let page_number = if page_number == 0 {
            DEFAULT_PAGE_NUMBER
        } else {
            page_number
        };
        Self::new(page_size, page_number)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn page_number(&self) -> i64 {
        self.page_number
    }

    /// Number of records to skip before this page.
    pub fn offset(&self) -> i64 {
        // Checked in `new`.
        self.page_size * (self.page_number - 1)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_number: DEFAULT_PAGE_NUMBER,
        }
    }
}

fn coerce(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Number of pages needed to show `total` records. Zero records means zero pages.
pub fn page_count(total: i64, page_size: i64) -> i64 {
    debug_assert!(page_size > 0);
    if total <= 0 {
        return 0;
    }
    total / page_size + i64::from(total % page_size != 0)
}

/// One page of results. `page` echoes the requested page number, unclamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.page_number(),
            pages: page_count(total, request.page_size()),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            pages: self.pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    InvalidPageSize(i64),
    InvalidPageNumber(i64),
    OffsetOverflow,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::InvalidPageSize(size) => {
                write!(f, "page size must be a positive number, got {}", size)
            }
            PageError::InvalidPageNumber(number) => {
                write!(f, "page number must be a positive number, got {}", number)
            }
            PageError::OffsetOverflow => write!(f, "page is out of range"),
        }
    }
}

impl std::error::Error for PageError {}
