//! Key-based pagination over live document queries
//!
//! This library pages through ordered queries of a push-notified document
//! store. A paging framework pulls pages by key while the store pushes
//! snapshots whenever data changes; pagers bridge the two and invalidate
//! their loaded pages as soon as a watched query window changes.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and demo runners
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `listener`: Snapshot listener bridge and settle policy
//! - `paging`: Paging sources, keys and the pull-side driver
//! - `store`: Document store contract and an in-memory store
//!
//! # Example
//!
//! ```no_run
//! use docpager::paging::{LoadParams, PagingSource, QueryPager};
//! use docpager::store::{MemoryDocument, MemoryStore, OrderDirection};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     for rank in 1..=5 {
//!         store.set("items", format!("item-{rank}"), json!({ "rank": rank }));
//!     }
//!
//!     let query = store.collection("items").order_by("rank", OrderDirection::Ascending);
//!     let mut pager = QueryPager::new(query, |doc: &MemoryDocument| Some(doc.id().to_string()));
//!
//!     if let Some(page) = pager.load(LoadParams::refresh(2)).await.page() {
//!         println!("{:?}", page.data);
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod listener;
pub mod paging;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{DocpagerError, Result};
pub use listener::SettlePolicy;
pub use paging::{
    ConcatKey, ConcatQueriesPager, LoadParams, LoadResult, Page, Pager, PagingSource, QueryKey,
    QueryPager,
};
pub use store::{MemoryStore, Query};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
