//! Transport-agnostic pagination.
//!
//! # Responsibility
//! - Normalize page requests (0-based index, bounded size).
//! - Turn one fetched slice plus its total count into a page descriptor.
//!
//! # Invariants
//! - `page_size` is always in `1..=MAX_PAGE_SIZE`.
//! - `total_pages == 0` exactly when `total_elements == 0`.
//! - The adapter knows nothing about the mapped entity type.

use serde::Serialize;

/// Page size applied when the caller omits one or passes zero.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound applied to requested page sizes.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Builds a request, defaulting and clamping `page_size`.
    pub fn new(page_number: u32, page_size: Option<u32>) -> Self {
        Self {
            page_number,
            page_size: normalize_page_size(page_size),
        }
    }

    /// Number of rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, None)
    }
}

/// Page descriptor returned by list use-cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Maps one fetched slice into a page descriptor.
    ///
    /// `rows` beyond `request.page_size` are dropped, so callers may hand in
    /// an over-fetched slice without breaking the size bound.
    pub fn from_slice<E, F>(rows: Vec<E>, total_elements: u64, request: PageRequest, map: F) -> Self
    where
        F: FnMut(E) -> T,
    {
        let page_size = request.page_size.max(1);
        let total_pages = total_elements.div_ceil(u64::from(page_size));
        let content = rows
            .into_iter()
            .take(page_size as usize)
            .map(map)
            .collect();

        Self {
            content,
            total_elements,
            total_pages,
            page_number: request.page_number,
            page_size,
            has_next: u64::from(request.page_number) + 1 < total_pages,
            has_previous: request.page_number > 0,
        }
    }

    /// Number of elements on this page.
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Normalizes page size: absent or zero -> default, oversized -> max.
pub fn normalize_page_size(page_size: Option<u32>) -> u32 {
    match page_size {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(value) if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        Some(value) => value,
    }
}
