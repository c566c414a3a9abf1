// SPDX-License-Identifier: GPL-3.0-or-later

//! Page parameters and page-by-page traversal of listing endpoints.

use std::future::Future;

use futures_util::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::request::QueryParams;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 100;

/// Page size used when walking every page, to keep round trips down.
pub const TRAVERSAL_PER_PAGE: u32 = MAX_PER_PAGE;

/// Caller-facing page selection. Out-of-range values are normalized by [`paginate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn page(page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: None,
        }
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

/// Normalized `page` / `per_page` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn to_query(self) -> QueryParams {
        QueryParams::new()
            .insert("page", self.page)
            .insert("per_page", self.per_page)
    }
}

impl From<PageParams> for Pagination {
    fn from(params: PageParams) -> Self {
        Pagination {
            page: Some(i64::from(params.page)),
            per_page: Some(i64::from(params.per_page)),
        }
    }
}

/// Clamp pagination options: page is at least 1, and a per-page value
/// outside `1..=100` falls back to 50.
pub fn paginate(options: Option<Pagination>) -> PageParams {
    let options = options.unwrap_or_default();
    let page = options.page.unwrap_or(i64::from(DEFAULT_PAGE));
    let per_page = options.per_page.unwrap_or(i64::from(DEFAULT_PER_PAGE));

    PageParams {
        page: u32::try_from(page.max(i64::from(DEFAULT_PAGE))).unwrap_or(u32::MAX),
        per_page: match u32::try_from(per_page) {
            Ok(per_page) if per_page > 0 && per_page <= MAX_PER_PAGE => per_page,
            _ => DEFAULT_PER_PAGE,
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUrls {
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

/// The `pagination` block Discogs attaches to listing responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub pages: u32,
    pub items: u64,
    pub per_page: u32,
    #[serde(default)]
    pub urls: PageUrls,
}

/// A listing response split into its pagination block and everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub pagination: PaginationInfo,
    #[serde(flatten)]
    pub data: T,
}

/// Payloads that carry a single result collection.
pub trait PageItems {
    type Item;

    fn into_items(self) -> Vec<Self::Item>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageCursor {
    current_page: u32,
    last_page: u32,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            current_page: DEFAULT_PAGE,
            last_page: DEFAULT_PAGE,
        }
    }
}

impl PageCursor {
    fn is_exhausted(&self) -> bool {
        self.current_page > self.last_page
    }

    fn params(&self) -> PageParams {
        PageParams {
            page: self.current_page,
            per_page: TRAVERSAL_PER_PAGE,
        }
    }

    fn advance(self, last_page: u32) -> Self {
        Self {
            current_page: self.current_page.saturating_add(1),
            last_page,
        }
    }
}

/// Lazily walk every page of a listing endpoint.
///
/// `fetch_page` is called with page 1, 2, ... and a page size of 100, one
/// call per item pulled from the stream. The page count is re-read from each
/// response and the stream ends once the current page passes it. An error
/// ends the stream after being yielded. Dropping the stream stops fetching.
pub fn all_pages<T, F, Fut>(fetch_page: F) -> impl Stream<Item = Result<T>>
where
    F: FnMut(PageParams) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold((fetch_page, PageCursor::default()), |(fetch_page, cursor)| {
        next_page(fetch_page, cursor)
    })
}

async fn next_page<T, F, Fut>(
    mut fetch_page: F,
    cursor: PageCursor,
) -> Result<Option<(T, (F, PageCursor))>>
where
    F: FnMut(PageParams) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    if cursor.is_exhausted() {
        return Ok(None);
    }

    let params = cursor.params();
    trace!(target: "discogs", page = params.page, "fetching page");
    let page = fetch_page(params).await?;
    let cursor = cursor.advance(page.pagination.pages);

    Ok(Some((page.data, (fetch_page, cursor))))
}

/// Drain a page stream into one collection, preserving order.
pub async fn concat_pages<S, T>(pages: S) -> Result<Vec<T::Item>>
where
    S: Stream<Item = Result<T>>,
    T: PageItems,
{
    concat_pages_with_progress(pages, |_| {}).await
}

/// Like [`concat_pages`], calling `on_progress` with each page's items first.
pub async fn concat_pages_with_progress<S, T, P>(pages: S, mut on_progress: P) -> Result<Vec<T::Item>>
where
    S: Stream<Item = Result<T>>,
    T: PageItems,
    P: FnMut(&[T::Item]),
{
    futures_util::pin_mut!(pages);

    let mut all = Vec::new();
    while let Some(page) = pages.try_next().await? {
        let items = page.into_items();
        on_progress(&items);
        all.extend(items);
    }
    Ok(all)
}
