//! Error handling module for paging operations.
//!
//! Errors raised by the document store are caught at the snapshot listener
//! boundary and converted into page load errors; they never escape a load
//! call as panics.
//!
//! # Example
//!
//! ```rust
//! use docpager::error::{DocpagerError, Result, StoreError};
//!
//! fn run_query() -> Result<()> {
//!     Err(StoreError::Unavailable("offline".to_string()).into())
//! }
//!
//! let err = run_query().unwrap_err();
//! assert!(matches!(err, DocpagerError::Store(_)));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, DocpagerError, LoadError, Result, StoreError};
