//! Per-query key history of the concatenated pager.
//!
//! Only the two most recent keys issued for each query are kept. That is
//! enough to step one page back, either within a query or across the
//! boundary into the previous one.

use std::collections::{HashMap, VecDeque};

use super::key::{ConcatKey, QueryKey};

/// Number of keys remembered per query index.
pub const HISTORY_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct KeyHistory<D> {
    entries: HashMap<usize, VecDeque<QueryKey<D>>>,
}

impl<D> Default for KeyHistory<D> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<D: Clone + PartialEq> KeyHistory<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and start over from the first query.
    pub fn reseed(&mut self) {
        self.entries.clear();
        self.entries.insert(0, VecDeque::from([QueryKey::Initial]));
    }

    /// Remember a freshly issued next key.
    pub fn record(&mut self, key: &ConcatKey<D>) {
        let keys = self.entries.entry(key.query_index).or_default();
        keys.push_back(key.query_key.clone());
        while keys.len() > HISTORY_DEPTH {
            keys.pop_front();
        }
    }

    /// Keys remembered for `query_index`, oldest first.
    pub fn keys(&self, query_index: usize) -> Option<&VecDeque<QueryKey<D>>> {
        self.entries.get(&query_index)
    }

    /// Key of the page before the one loaded with `current`.
    pub fn previous_key(&self, current: &ConcatKey<D>) -> Option<ConcatKey<D>> {
        let index = current.query_index;
        let keys = self.entries.get(&index)?;
        let latest = keys.back()?;

        if *latest == current.query_key && keys.len() >= 2 {
            // step back within the same query
            return Some(ConcatKey::new(index, keys[keys.len() - 2].clone()));
        }
        if *latest == current.query_key && index > 0 {
            // step back across the query boundary
            return self
                .entries
                .get(&(index - 1))
                .and_then(|previous| previous.back())
                .map(|key| ConcatKey::new(index - 1, key.clone()));
        }
        Some(ConcatKey::new(index, latest.clone()))
    }
}
