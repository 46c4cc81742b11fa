//! Lazy walk over paginated search results.
//!
//! Search endpoints answer with `{"hits": {"hits": [...], "total": n},
//! "links": {"next": url}}`. [`Pages`] starts from an already fetched first
//! page and follows `links.next` one GET at a time.

use futures_core::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, warn};

use crate::Api;
use crate::Result;

/// One page of search results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page<T> {
    pub hits: Hits<T>,
    #[serde(default)]
    pub links: PageLinks,
}

impl<T> Page<T> {
    pub fn items(&self) -> &[T] {
        &self.hits.hits
    }

    pub fn into_items(self) -> Vec<T> {
        self.hits.hits
    }

    pub fn next_link(&self) -> Option<&str> {
        self.links.next.as_deref()
    }
}

/// The `hits` object of a page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Hits<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<T>,
    #[serde(default, deserialize_with = "deserialize_total")]
    pub total: u64,
}

/// Navigation links of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// `total` is a plain integer on InvenioRDM and `{"value": n}` on
/// Elasticsearch 7 backed instances.
fn deserialize_total<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object { value: u64 },
    }

    Ok(match Total::deserialize(deserializer)? {
        Total::Count(n) => n,
        Total::Object { value } => value,
    })
}

/// A forward-only, single-pass sequence of pages.
///
/// The first page is yielded without a request. Each later call to
/// [`Pages::next_page`] issues exactly one GET to the previous page's
/// `links.next`. The walk ends when a page has no next link, or once
/// `limit` further pages have been fetched. Errors are returned as-is and
/// end the walk; to start over, repeat the listing call.
pub struct Pages<T> {
    api: Api,
    first: Option<Page<T>>,
    next_url: Option<String>,
    limit: Option<usize>,
    fetched: usize,
    seen: u64,
    total: u64,
}

impl<T: DeserializeOwned> Pages<T> {
    /// Start a walk from an already fetched page.
    pub fn new(api: Api, first: Page<T>, limit: Option<usize>) -> Self {
        Self {
            api,
            next_url: first.links.next.clone(),
            total: first.hits.total,
            first: Some(first),
            limit,
            fetched: 0,
            seen: 0,
        }
    }

    /// `hits.total` as reported by the first page.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of pages fetched beyond the first.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Returns the next page, or `None` once the walk is over.
    #[instrument(skip(self), fields(fetched = self.fetched))]
    pub async fn next_page(&mut self) -> Result<Option<Page<T>>> {
        let page = match self.first.take() {
            Some(first) => first,
            None => {
                if self.limit.is_some_and(|limit| self.fetched >= limit) {
                    self.next_url = None;
                    return Ok(None);
                }
                let Some(url) = self.next_url.take() else {
                    return Ok(None);
                };
                debug!(%url, "fetching next page");
                let page: Page<T> = self.api.get(&url, &[]).await?;
                self.fetched += 1;
                self.next_url = page.links.next.clone();
                page
            }
        };

        self.seen += page.hits.hits.len() as u64;
        if self.seen > self.total {
            warn!(seen = self.seen, total = self.total, "more items than the first page reported");
        }
        Ok(Some(page))
    }

    /// Drain the remaining pages into one ordered list of items.
    pub async fn collect_items(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page.into_items());
        }
        Ok(items)
    }

    /// Turn the walk into a stream of pages.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Page<T>>>
    where
        T: Send + 'static,
    {
        async_stream::try_stream! {
            while let Some(page) = self.next_page().await? {
                yield page;
            }
        }
    }
}

impl<T> std::fmt::Debug for Pages<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("next_url", &self.next_url)
            .field("limit", &self.limit)
            .field("fetched", &self.fetched)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
