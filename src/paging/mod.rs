//! Key-based pagination over live document queries.
//!
//! A paging framework pulls pages by key through [`PagingSource::load`]; the
//! document store pushes snapshots whenever data changes. The pagers in this
//! module bridge the two:
//!
//! - [`QueryPager`] pages through a single ordered query.
//! - [`ConcatQueriesPager`] pages through several queries, exhausting each
//!   before moving to the next.
//!
//! Pages are never patched in place. Every load keeps a listener on its
//! query window and, once that listener settles, invalidates the whole
//! source so the framework reloads from a refresh.

pub mod concat;
pub mod history;
pub mod invalidation;
pub mod key;
pub mod pager;
pub mod query;


use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::error;

use crate::error::{DocpagerError, LoadError};
use crate::listener::{SettlePolicy, snapshots, watch_snapshots};
use crate::store::Query;

pub use concat::ConcatQueriesPager;
pub use history::KeyHistory;
pub use invalidation::Invalidation;
pub use key::{ConcatKey, QueryKey};
pub use pager::{LoadState, Pager};
pub use query::QueryPager;

/// Caller-supplied conversion of a document into a page item.
///
/// Documents mapped to `None` are left out of the page.
pub type DocumentMapper<D, T> = Arc<dyn Fn(&D) -> Option<T> + Send + Sync + 'static>;

/// Parameters of one page load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadParams<K> {
    /// Load from the top. `key` is whatever the source's refresh key was.
    Refresh { key: Option<K>, load_size: usize },

    /// Load the page before `key`.
    Prepend { key: K, load_size: usize },

    /// Load the page after `key`.
    Append { key: K, load_size: usize },
}

impl<K> LoadParams<K> {
    pub fn refresh(load_size: usize) -> Self {
        LoadParams::Refresh {
            key: None,
            load_size,
        }
    }

    pub fn key(&self) -> Option<&K> {
        match self {
            LoadParams::Refresh { key, .. } => key.as_ref(),
            LoadParams::Prepend { key, .. } | LoadParams::Append { key, .. } => Some(key),
        }
    }

    pub fn load_size(&self) -> usize {
        match self {
            LoadParams::Refresh { load_size, .. }
            | LoadParams::Prepend { load_size, .. }
            | LoadParams::Append { load_size, .. } => *load_size,
        }
    }

    pub fn is_refresh(&self) -> bool {
        matches!(self, LoadParams::Refresh { .. })
    }
}

/// One loaded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<K, T> {
    pub data: Vec<T>,
    pub prev_key: Option<K>,
    pub next_key: Option<K>,
}

/// Outcome of a page load.
#[derive(Debug)]
pub enum LoadResult<K, T> {
    /// A page was loaded.
    Page(Page<K, T>),

    /// The load failed; the source stays usable and the key may be retried.
    Error(DocpagerError),

    /// The source was invalidated while loading; reload from a refresh.
    Invalid,
}

impl<K, T> LoadResult<K, T> {
    pub fn page(self) -> Option<Page<K, T>> {
        match self {
            LoadResult::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, LoadResult::Invalid)
    }
}

/// Source of pages pulled by a paging framework.
///
/// Loads take `&mut self`: a source serves one load at a time and keeps its
/// key state without locking.
#[async_trait]
pub trait PagingSource: Send {
    type Key: Clone + fmt::Debug + Send + Sync + 'static;
    type Value: Send + 'static;

    async fn load(&mut self, params: LoadParams<Self::Key>) -> LoadResult<Self::Key, Self::Value>;

    /// Key to reload from after invalidation.
    fn refresh_key(&self) -> Option<Self::Key> {
        None
    }

    fn invalidation(&self) -> &Invalidation;

    fn invalidate(&self) {
        self.invalidation().invalidate();
    }

    fn is_invalid(&self) -> bool {
        self.invalidation().is_invalid()
    }
}

/// Raw outcome of fetching one query window.
pub(crate) enum Fetched<D> {
    Snapshot(Vec<D>),
    Failed(DocpagerError),
    Invalid,
}

/// Fetch the first snapshot of `query` and keep watching it for changes.
///
/// The watcher lives in the source's scope and invalidates the source once
/// its listener settles. Dropping this future before the first snapshot
/// arrives cancels the watcher and detaches its listener.
pub(crate) async fn fetch_window<Q: Query>(
    query: &Q,
    policy: SettlePolicy,
    invalidation: &Invalidation,
) -> Fetched<Q::Document> {
    if invalidation.is_invalid() {
        return Fetched::Invalid;
    }

    let load_scope = invalidation.child_scope();
    let guard = load_scope.clone().drop_guard();
    let notifier = invalidation.clone();
    let first = watch_snapshots(snapshots(query), policy, load_scope, move || {
        notifier.invalidate()
    });

    let received = first.await;
    let _ = guard.disarm();

    match received {
        Ok(Ok(docs)) => Fetched::Snapshot(docs),
        Ok(Err(e)) => {
            error!("Page load failed: {}", e);
            Fetched::Failed(e)
        }
        Err(_) if invalidation.is_invalid() => Fetched::Invalid,
        Err(_) => Fetched::Failed(LoadError::ListenerClosed.into()),
    }
}

/// Map fetched documents into page items, dropping unmappable ones.
pub(crate) fn map_documents<D, T>(docs: &[D], mapper: &DocumentMapper<D, T>) -> Vec<T> {
    docs.iter().filter_map(|doc| mapper(doc)).collect()
}
