//! Pager over a single ordered query.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::key::{QueryKey, full_page_cursor};
use super::{
    DocumentMapper, Fetched, Invalidation, LoadParams, LoadResult, Page, PagingSource,
    fetch_window, map_documents,
};
use crate::listener::SettlePolicy;
use crate::store::{Query, ToObject};

/// Paging source over one query.
///
/// The query must have a deterministic total order; cursors resume strictly
/// after the last document of the previous page.
pub struct QueryPager<Q: Query, T> {
    query: Q,
    mapper: DocumentMapper<Q::Document, T>,
    settle: SettlePolicy,
    last_next_key: Option<QueryKey<Q::Document>>,
    invalidation: Invalidation,
}

impl<Q: Query, T> QueryPager<Q, T> {
    pub fn new<F>(query: Q, mapper: F) -> Self
    where
        F: Fn(&Q::Document) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            query,
            mapper: Arc::new(mapper),
            settle: SettlePolicy::default(),
            last_next_key: None,
            invalidation: Invalidation::new(),
        }
    }

    pub fn with_settle_policy(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    fn scoped_query(&self, params: &LoadParams<QueryKey<Q::Document>>) -> Q {
        let query = self.query.limit(params.load_size());
        match params {
            LoadParams::Refresh { .. } => query,
            LoadParams::Prepend { key, .. } | LoadParams::Append { key, .. } => match key.cursor() {
                Some(doc) => query.start_after(doc),
                None => query,
            },
        }
    }
}

impl<Q, T> QueryPager<Q, T>
where
    Q: Query,
    Q::Document: ToObject,
    T: DeserializeOwned + 'static,
{
    /// Pager decoding each document into `T`.
    pub fn for_type(query: Q) -> Self {
        Self::new(query, |doc: &Q::Document| doc.to_object::<T>())
    }
}

#[async_trait]
impl<Q, T> PagingSource for QueryPager<Q, T>
where
    Q: Query,
    T: Send + 'static,
{
    type Key = QueryKey<Q::Document>;
    type Value = T;

    async fn load(&mut self, params: LoadParams<Self::Key>) -> LoadResult<Self::Key, T> {
        let query = self.scoped_query(&params);
        if params.is_refresh() {
            self.last_next_key = Some(QueryKey::Initial);
        }

        let docs = match fetch_window(&query, self.settle, &self.invalidation).await {
            Fetched::Snapshot(docs) => docs,
            Fetched::Failed(e) => return LoadResult::Error(e),
            Fetched::Invalid => return LoadResult::Invalid,
        };

        let data = map_documents(&docs, &self.mapper);
        let prev_key = self.last_next_key.clone().filter(|key| !key.is_initial());
        let next_key = full_page_cursor(&docs, params.load_size()).map(QueryKey::StartAfter);
        self.last_next_key = next_key.clone();

        debug!(
            "load params {:?} prev_key {:?} next_key {:?}",
            params, prev_key, next_key
        );
        LoadResult::Page(Page {
            data,
            prev_key,
            next_key,
        })
    }

    fn invalidation(&self) -> &Invalidation {
        &self.invalidation
    }
}

impl<Q: Query, T> Drop for QueryPager<Q, T> {
    fn drop(&mut self) {
        self.invalidation.close();
    }
}

impl<Q: Query + fmt::Debug, T> fmt::Debug for QueryPager<Q, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPager")
            .field("query", &self.query)
            .field("settle", &self.settle)
            .field("last_next_key", &self.last_next_key)
            .field("invalidation", &self.invalidation)
            .finish()
    }
}
