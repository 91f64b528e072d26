//! Offset pagination over ordered collections.
//!
//! Two entry points build a [`Page`]:
//! - [`Page::from_source`] slices an unsliced source itself;
//! - [`Page::from_window`] trusts a window and total count computed by the caller
//!   (typically a `LIMIT/OFFSET` query plus a `COUNT(*)`).
//!
//! Both validate the paging arguments first, so `total_pages` is never computed
//! from a zero page size.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::PageError;

pub const DEFAULT_PAGE_NUMBER: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Validated paging arguments: both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Result<Self, PageError> {
        let size = u64::try_from(page_size)
            .ok()
            .filter(|size| *size >= 1)
            .ok_or(PageError::InvalidPageSize(page_size))?;
        let number = u64::try_from(page_number)
            .ok()
            .filter(|number| *number >= 1)
            .ok_or(PageError::InvalidPageNumber(page_number))?;

        Ok(Self {
            page_number: number,
            page_size: size,
        })
    }

    pub const fn page_number(&self) -> u64 {
        self.page_number
    }

    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Items before this page. Saturates for absurd page numbers; the page is then empty.
    pub const fn skip(&self) -> u64 {
        (self.page_number - 1).saturating_mul(self.page_size)
    }
}

/// Query-string binding for paging arguments (`?PageNumber=2&PageSize=20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    #[serde(
        rename = "PageNumber",
        alias = "pageNumber",
        alias = "page_number",
        default = "default_page_number"
    )]
    pub page_number: i64,
    #[serde(
        rename = "PageSize",
        alias = "pageSize",
        alias = "page_size",
        default = "default_page_size"
    )]
    pub page_size: i64,
}

fn default_page_number() -> i64 {
    DEFAULT_PAGE_NUMBER
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = PageError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        PageRequest::new(query.page_number, query.page_size)
    }
}

fn total_pages(total_count: u64, page_size: u64) -> u64 {
    total_count.div_ceil(page_size)
}

/// A bounded window of an ordered collection plus navigation metadata.
///
/// Read-only: the items can be borrowed or taken, never appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    items: Vec<T>,
    current_page: u64,
    page_size: u64,
    total_count: u64,
    total_pages: u64,
}

impl<T> Page<T> {
    /// Build a page from items the caller already sliced to the requested window.
    ///
    /// `total_count` is trusted as given.
    pub fn from_window(
        items: Vec<T>,
        total_count: u64,
        request: PageRequest,
    ) -> Result<Self, PageError> {
        let len = items.len() as u64;
        if len > request.page_size() {
            return Err(PageError::WindowTooLarge {
                len,
                page_size: request.page_size(),
            });
        }
        Ok(Self::assemble(items, total_count, request))
    }

    /// Count the whole source, skip to the requested page and take one page of items.
    /// A page past the end is empty, not an error.
    pub fn from_source<I>(source: I, request: PageRequest) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = source.into_iter();
        let total_count = iter.len() as u64;
        let skip = usize::try_from(request.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(request.page_size()).unwrap_or(usize::MAX);
        let items = iter.skip(skip).take(take).collect();
        Self::assemble(items, total_count, request)
    }

    fn assemble(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            current_page: request.page_number(),
            page_size: request.page_size(),
            total_count,
            total_pages: total_pages(total_count, request.page_size()),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Map items while preserving the metadata (Domain->DTO mapping convenience)
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
        }
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Plain data projection of a [`Page`], for callers that want public fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountModel<T> {
    #[serde(rename = "CurrentPage")]
    pub current_page: u64,
    #[serde(rename = "TotalPages")]
    pub total_pages: u64,
    #[serde(rename = "PageSize")]
    pub page_size: u64,
    #[serde(rename = "TotalCount")]
    pub total_count: u64,
    #[serde(rename = "Items")]
    pub items: Vec<T>,
}

impl<T> CountModel<T> {
    /// Zero counts and no items. `current_page` is 0 too, so both navigation flags are false.
    pub fn empty() -> Self {
        Self {
            current_page: 0,
            total_pages: 0,
            page_size: 0,
            total_count: 0,
            items: Vec::new(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

impl<T> Default for CountModel<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Page<T>> for CountModel<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            current_page: page.current_page,
            total_pages: page.total_pages,
            page_size: page.page_size,
            total_count: page.total_count,
            items: page.items,
        }
    }
}

// -------- wire format --------

struct PageFields<'a, T> {
    current_page: u64,
    total_pages: u64,
    page_size: u64,
    total_count: u64,
    items: &'a [T],
}

impl<T: Serialize> PageFields<'_, T> {
    fn serialize<S: Serializer>(&self, name: &'static str, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct(name, 7)?;
        state.serialize_field("CurrentPage", &self.current_page)?;
        state.serialize_field("TotalPages", &self.total_pages)?;
        state.serialize_field("PageSize", &self.page_size)?;
        state.serialize_field("TotalCount", &self.total_count)?;
        state.serialize_field("HasPrevious", &(self.current_page > 1))?;
        state.serialize_field("HasNext", &(self.current_page < self.total_pages))?;
        state.serialize_field("Items", self.items)?;
        state.end()
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageFields {
            current_page: self.current_page,
            total_pages: self.total_pages,
            page_size: self.page_size,
            total_count: self.total_count,
            items: &self.items,
        }
        .serialize("Page", serializer)
    }
}

impl<T: Serialize> Serialize for CountModel<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageFields {
            current_page: self.current_page,
            total_pages: self.total_pages,
            page_size: self.page_size,
            total_count: self.total_count,
            items: &self.items,
        }
        .serialize("CountModel", serializer)
    }
}

#[derive(Deserialize)]
struct WirePage<T> {
    #[serde(rename = "CurrentPage")]
    current_page: u64,
    #[serde(rename = "PageSize")]
    page_size: u64,
    #[serde(rename = "TotalCount")]
    total_count: u64,
    #[serde(rename = "Items")]
    items: Vec<T>,
}

// `TotalPages`, `HasPrevious` and `HasNext` are derived, so they are recomputed
// rather than read back.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WirePage::<T>::deserialize(deserializer)?;
        let page_number = i64::try_from(wire.current_page).unwrap_or(i64::MAX);
        let page_size = i64::try_from(wire.page_size).unwrap_or(i64::MAX);
        let request = PageRequest::new(page_number, page_size).map_err(de::Error::custom)?;
        Page::from_window(wire.items, wire.total_count, request).map_err(de::Error::custom)
    }
}
