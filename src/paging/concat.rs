//! Pager over a list of concatenated queries.
//!
//! Queries are exhausted in order and presented as one continuous sequence
//! of pages. Documents matching several queries show up once per query:
//! pages are not de-duplicated.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::history::KeyHistory;
use super::key::{ConcatKey, QueryKey, full_page_cursor};
use super::{
    DocumentMapper, Fetched, Invalidation, LoadParams, LoadResult, Page, PagingSource,
    fetch_window, map_documents,
};
use crate::error::{ConfigError, LoadError, Result};
use crate::listener::SettlePolicy;
use crate::store::{Query, ToObject};

/// Paging source over several queries, one after the other.
pub struct ConcatQueriesPager<Q: Query, T> {
    queries: Vec<Q>,
    mapper: DocumentMapper<Q::Document, T>,
    settle: SettlePolicy,
    history: KeyHistory<Q::Document>,
    invalidation: Invalidation,
}

impl<Q: Query, T> ConcatQueriesPager<Q, T> {
    /// Pager over `queries`, which must not be empty.
    pub fn new<F>(queries: Vec<Q>, mapper: F) -> Result<Self>
    where
        F: Fn(&Q::Document) -> Option<T> + Send + Sync + 'static,
    {
        if queries.is_empty() {
            return Err(ConfigError::MissingField("queries".to_string()).into());
        }
        Ok(Self {
            queries,
            mapper: Arc::new(mapper),
            settle: SettlePolicy::default(),
            history: KeyHistory::new(),
            invalidation: Invalidation::new(),
        })
    }

    pub fn with_settle_policy(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    /// Key history kept for backward paging.
    pub fn history(&self) -> &KeyHistory<Q::Document> {
        &self.history
    }

    fn next_key(
        &self,
        query_index: usize,
        cursor: Option<Q::Document>,
    ) -> Option<ConcatKey<Q::Document>> {
        match cursor {
            Some(doc) => Some(ConcatKey::new(query_index, QueryKey::StartAfter(doc))),
            None if query_index + 1 < self.queries.len() => {
                Some(ConcatKey::initial(query_index + 1))
            }
            None => None,
        }
    }
}

impl<Q, T> ConcatQueriesPager<Q, T>
where
    Q: Query,
    Q::Document: ToObject,
    T: DeserializeOwned + 'static,
{
    /// Pager decoding each document into `T`.
    pub fn for_type(queries: Vec<Q>) -> Result<Self> {
        Self::new(queries, |doc: &Q::Document| doc.to_object::<T>())
    }
}

#[async_trait]
impl<Q, T> PagingSource for ConcatQueriesPager<Q, T>
where
    Q: Query,
    T: Send + 'static,
{
    type Key = ConcatKey<Q::Document>;
    type Value = T;

    async fn load(&mut self, params: LoadParams<Self::Key>) -> LoadResult<Self::Key, T> {
        let load_size = params.load_size();
        let (query_index, query_key) = match &params {
            LoadParams::Refresh { .. } => {
                self.history.reseed();
                (0, QueryKey::Initial)
            }
            LoadParams::Prepend { key, .. } | LoadParams::Append { key, .. } => {
                (key.query_index, key.query_key.clone())
            }
        };

        let Some(base) = self.queries.get(query_index) else {
            return LoadResult::Error(
                LoadError::InvalidKey(format!(
                    "query index {} out of {} queries",
                    query_index,
                    self.queries.len()
                ))
                .into(),
            );
        };
        let mut query = base.limit(load_size);
        if let Some(doc) = query_key.cursor() {
            query = query.start_after(doc);
        }

        let docs = match fetch_window(&query, self.settle, &self.invalidation).await {
            Fetched::Snapshot(docs) => docs,
            Fetched::Failed(e) => return LoadResult::Error(e),
            Fetched::Invalid => return LoadResult::Invalid,
        };

        let data = map_documents(&docs, &self.mapper);
        let prev_key = match &params {
            LoadParams::Refresh { .. } => None,
            LoadParams::Prepend { key, .. } | LoadParams::Append { key, .. } => {
                self.history.previous_key(key)
            }
        };
        let next_key = self.next_key(query_index, full_page_cursor(&docs, load_size));
        if let Some(key) = &next_key {
            self.history.record(key);
        }

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

impl<Q: Query, T> Drop for ConcatQueriesPager<Q, T> {
    fn drop(&mut self) {
        self.invalidation.close();
    }
}

impl<Q: Query + fmt::Debug, T> fmt::Debug for ConcatQueriesPager<Q, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatQueriesPager")
            .field("queries", &self.queries)
            .field("settle", &self.settle)
            .field("history", &self.history)
            .field("invalidation", &self.invalidation)
            .finish()
    }
}
