//! Offset pagination over list endpoints.
//!
//! A fetcher takes `(skip, take)` and returns one [`PageResult`]. [`paginate`]
//! turns it into a [`Stream`] of [`Page`]s that stops once the source is
//! exhausted, an empty page is returned, or a fetch fails.

use crate::error::SdkResult;
use futures_util::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Default page size.
pub const DEFAULT_TAKE: usize = 20;

/// Starting offset and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationOptions {
    /// Number of items to skip before the first page.
    pub skip: usize,
    /// Page size.
    pub take: usize,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            take: DEFAULT_TAKE,
        }
    }
}

/// What a fetcher returns for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// Items in this window.
    pub items: Vec<T>,
    /// Total number of items in the source.
    pub count: usize,
}

/// One page yielded by [`paginate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of items in the source.
    pub count: usize,
    /// Whether another page follows.
    pub has_more: bool,
    /// Offset of this page.
    pub skip: usize,
    /// Requested page size.
    pub take: usize,
}

enum Cursor {
    At(usize),
    Done,
}

/// Streams pages from `fetch`, starting at `options.skip`.
///
/// A page has more after it when it is non-empty and
/// `skip + items.len() < count`. The first error is yielded and ends the
/// stream.
///
/// # Example
///
/// ```
/// use futures_util::StreamExt;
/// use storefront_core::pagination::{paginate, PageResult, PaginationOptions};
///
/// # tokio_test::block_on(async {
/// let source: Vec<u32> = (0..5).collect();
/// let pages = paginate(PaginationOptions { skip: 0, take: 2 }, |skip, take| {
///     let items: Vec<u32> = source.iter().copied().skip(skip).take(take).collect();
///     async move { Ok(PageResult { items, count: 5 }) }
/// });
/// let sizes: Vec<usize> = pages.map(|p| p.unwrap().items.len()).collect().await;
/// assert_eq!(sizes, vec![2, 2, 1]);
/// # });
/// ```
pub fn paginate<T, F, Fut>(
    options: PaginationOptions,
    fetch: F,
) -> impl Stream<Item = SdkResult<Page<T>>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = SdkResult<PageResult<T>>>,
{
    let take = options.take;
    stream::unfold(
        (Cursor::At(options.skip), fetch),
        move |(cursor, mut fetch)| async move {
            let Cursor::At(skip) = cursor else {
                return None;
            };
            match fetch(skip, take).await {
                Ok(result) => {
                    let len = result.items.len();
                    let has_more = len > 0 && skip + len < result.count;
                    let next = if has_more {
                        Cursor::At(skip + len)
                    } else {
                        Cursor::Done
                    };
                    let page = Page {
                        items: result.items,
                        count: result.count,
                        has_more,
                        skip,
                        take,
                    };
                    Some((Ok(page), (next, fetch)))
                }
                Err(e) => Some((Err(e), (Cursor::Done, fetch))),
            }
        },
    )
}

/// Collects every item from `fetch`.
///
/// # Errors
///
/// Returns the first fetch error.
pub async fn fetch_all<T, F, Fut>(options: PaginationOptions, fetch: F) -> SdkResult<Vec<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = SdkResult<PageResult<T>>>,
{
    paginate(options, fetch)
        .try_fold(Vec::new(), |mut all, page| async move {
            all.extend(page.items);
            Ok(all)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    fn window(items: &[usize], skip: usize, take: usize) -> PageResult<usize> {
        PageResult {
            items: items.iter().copied().skip(skip).take(take).collect(),
            count: items.len(),
        }
    }

    #[tokio::test]
    async fn test_pages_over_55_items() {
        let items = source(55);
        let pages: Vec<Page<usize>> = paginate(PaginationOptions::default(), |skip, take| {
            let page = window(&items, skip, take);
            async move { Ok(page) }
        })
        .map(Result::unwrap)
        .collect()
        .await;

        let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
        let more: Vec<bool> = pages.iter().map(|p| p.has_more).collect();
        let skips: Vec<usize> = pages.iter().map(|p| p.skip).collect();

        assert_eq!(sizes, vec![20, 20, 15]);
        assert_eq!(more, vec![true, true, false]);
        assert_eq!(skips, vec![0, 20, 40]);
        assert!(pages.iter().all(|p| p.count == 55 && p.take == 20));
    }

    #[tokio::test]
    async fn test_empty_source_yields_one_page() {
        let pages: Vec<Page<usize>> = paginate(PaginationOptions::default(), |_, _| async {
            Ok(PageResult {
                items: Vec::new(),
                count: 0,
            })
        })
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(pages.len(), 1);
        assert!(!pages[0].has_more);
    }

    #[tokio::test]
    async fn test_empty_page_stops_even_if_count_is_larger() {
        let calls = AtomicUsize::new(0);
        let pages: Vec<_> = paginate(PaginationOptions::default(), |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(PageResult::<usize> {
                    items: Vec::new(),
                    count: 100,
                })
            }
        })
        .collect()
        .await;

        assert_eq!(pages.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let items = source(50);
        let pages: Vec<_> = paginate(PaginationOptions { skip: 0, take: 10 }, |skip, take| {
            let result = if skip >= 20 {
                Err(SdkError::network("boom", None))
            } else {
                Ok(window(&items, skip, take))
            };
            async move { result }
        })
        .collect()
        .await;

        assert_eq!(pages.len(), 3);
        assert!(pages[2].is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_with_offset() {
        let items = source(30);
        let all = fetch_all(PaginationOptions { skip: 5, take: 10 }, |skip, take| {
            let page = window(&items, skip, take);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(all, (5..30).collect::<Vec<_>>());
    }
}
