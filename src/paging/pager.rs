//! Minimal pull-side driver for a [`PagingSource`].
//!
//! Holds the loaded pages, appends and prepends on demand, and replaces the source with a
//! fresh one from its factory whenever the current one was invalidated.

use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

use super::{Invalidation, LoadParams, LoadResult, Page, PagingSource};
use crate::error::Result;

type SourceFactory<S> = Box<dyn FnMut() -> Result<S> + Send>;

/// Outcome of a driver load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// A page with this many items was loaded.
    Loaded(usize),

    /// There is nothing more to load in that direction.
    EndOfPagination,

    /// The source went stale; call [`Pager::refresh`].
    Invalidated,
}

pub struct Pager<S: PagingSource> {
    factory: SourceFactory<S>,
    source: S,
    load_size: usize,
    pages: VecDeque<Page<S::Key, S::Value>>,
    generation: usize,
}

impl<S: PagingSource> Pager<S> {
    pub fn new<F>(mut factory: F, load_size: usize) -> Result<Self>
    where
        F: FnMut() -> Result<S> + Send + 'static,
    {
        let source = factory()?;
        Ok(Self {
            factory: Box::new(factory),
            source,
            load_size,
            pages: VecDeque::new(),
            generation: 0,
        })
    }

    /// Drop all pages and load the first one, replacing a stale source.
    pub async fn refresh(&mut self) -> Result<LoadState> {
        if self.source.is_invalid() {
            self.source = (self.factory)()?;
            self.generation += 1;
            info!(generation = self.generation, "Replaced invalidated paging source");
        }
        self.pages.clear();

        let params = LoadParams::Refresh {
            key: self.source.refresh_key(),
            load_size: self.load_size,
        };
        let result = self.source.load(params).await;
        self.accept(result, false)
    }

    /// Load the page after the last loaded one.
    pub async fn append(&mut self) -> Result<LoadState> {
        if self.source.is_invalid() {
            return Ok(LoadState::Invalidated);
        }
        let Some(key) = self.pages.back().and_then(|page| page.next_key.clone()) else {
            return Ok(LoadState::EndOfPagination);
        };

        let result = self
            .source
            .load(LoadParams::Append {
                key,
                load_size: self.load_size,
            })
            .await;
        self.accept(result, true)
    }

    /// Load the page before the first loaded one.
    pub async fn prepend(&mut self) -> Result<LoadState> {
        if self.source.is_invalid() {
            return Ok(LoadState::Invalidated);
        }
        let Some(key) = self.pages.front().and_then(|page| page.prev_key.clone()) else {
            return Ok(LoadState::EndOfPagination);
        };

        let result = self
            .source
            .load(LoadParams::Prepend {
                key,
                load_size: self.load_size,
            })
            .await;
        self.accept(result, false)
    }

    /// Load everything up to the end of the data.
    pub async fn load_all(&mut self) -> Result<LoadState> {
        let mut state = self.refresh().await?;
        while let LoadState::Loaded(_) = state {
            state = self.append().await?;
        }
        Ok(state)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page<S::Key, S::Value>> {
        self.pages.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = &S::Value> {
        self.pages.iter().flat_map(|page| page.data.iter())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Invalidation handle of the current source.
    pub fn invalidation(&self) -> Invalidation {
        self.source.invalidation().clone()
    }

    pub fn is_stale(&self) -> bool {
        self.source.is_invalid()
    }

    /// Number of times the source was replaced after invalidation.
    pub fn generation(&self) -> usize {
        self.generation
    }

    fn accept(&mut self, result: LoadResult<S::Key, S::Value>, append: bool) -> Result<LoadState> {
        match result {
            LoadResult::Page(page) => {
                let items = page.data.len();
                debug!(items, pages = self.pages.len() + 1, "Page accepted");
                if append {
                    self.pages.push_back(page);
                } else {
                    self.pages.push_front(page);
                }
                Ok(LoadState::Loaded(items))
            }
            LoadResult::Error(e) => Err(e),
            LoadResult::Invalid => Ok(LoadState::Invalidated),
        }
    }
}

impl<S: PagingSource> fmt::Debug for Pager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("load_size", &self.load_size)
            .field("pages", &self.pages.len())
            .field("generation", &self.generation)
            .field("stale", &self.is_stale())
            .finish()
    }
}
