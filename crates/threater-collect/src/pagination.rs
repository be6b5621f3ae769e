//! Cursor pagination
//!
//! A [`Paginator`] walks one endpoint page by page, following
//! `meta.next_cursor` until it is absent. Cursor state lives only for the
//! duration of a run.

use crate::api::types::{Page, QueryParams, Record, CURSOR_PARAM};
use crate::error::{CollectError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

/// Anything that can answer a page request
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, endpoint_path: &str, params: &QueryParams) -> Result<Page>;
}

/// Sequential cursor walk over one endpoint. Not restartable.
pub struct Paginator<'a, S: PageSource + ?Sized> {
    source: &'a S,
    endpoint_path: String,
    params: QueryParams,
    max_pages: Option<u32>,
    pages_fetched: u32,
    exhausted: bool,
}

impl<'a, S: PageSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, endpoint_path: impl Into<String>, params: QueryParams) -> Self {
        Self {
            source,
            endpoint_path: endpoint_path.into(),
            params,
            max_pages: None,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Fail with [`CollectError::PageLimit`] instead of fetching past `max` pages.
    pub fn with_max_pages(mut self, max: Option<u32>) -> Self {
        self.max_pages = max;
        self
    }

    /// Fetch the next page, or `Ok(None)` once the cursor chain has ended.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.exhausted {
            return Ok(None);
        }
        if let Some(max) = self.max_pages {
            if self.pages_fetched >= max {
                self.exhausted = true;
                return Err(CollectError::PageLimit {
                    endpoint: self.endpoint_path.clone(),
                    max_pages: max,
                });
            }
        }

        let page = match self.source.fetch(&self.endpoint_path, &self.params).await {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            },
        };
        self.pages_fetched += 1;

        match page.next_cursor {
            Some(ref cursor) => {
                self.params.insert(CURSOR_PARAM.to_string(), cursor.clone());
            },
            None => self.exhausted = true,
        }
        Ok(Some(page))
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}

/// Every remaining record of `paginator`, lazily, in page order.
///
/// The paginator stays usable afterwards, so its page count reflects what
/// the stream fetched.
pub fn traverse<'p, 'a, S>(paginator: &'p mut Paginator<'a, S>) -> BoxStream<'p, Result<Record>>
where
    S: PageSource + ?Sized,
{
    stream::try_unfold(paginator, |paginator| async move {
        let page = paginator.next_page().await?;
        Ok::<_, CollectError>(page.map(|page| (page, paginator)))
    })
    .map_ok(|page| stream::iter(page.records.into_iter().map(Ok::<_, CollectError>)))
    .try_flatten()
    .boxed()
}
