use std::{fmt, io};

/// Crate-wide `Result` type using [`DocpagerError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DocpagerError>;

/// Top-level error type for docpager operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum DocpagerError {
    /// Errors surfaced by the document store.
    Store(StoreError),

    /// Page load errors.
    Load(LoadError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Document store errors, delivered through snapshot listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Query execution failed on the server.
    QueryFailed(String),

    /// The store could not be reached.
    Unavailable(String),

    /// The caller is not allowed to read the queried documents.
    PermissionDenied(String),
}

/// Page load errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The key does not address any query of the pager.
    InvalidKey(String),

    /// The snapshot listener ended before delivering a first snapshot.
    ListenerClosed,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DocpagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocpagerError::Store(e) => write!(f, "Store error: {e}"),
            DocpagerError::Load(e) => write!(f, "Load error: {e}"),
            DocpagerError::Config(e) => write!(f, "Configuration error: {e}"),
            DocpagerError::Io(e) => write!(f, "I/O error: {e}"),
            DocpagerError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::PermissionDenied(msg) => write!(f, "Permission denied: {msg}"),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::InvalidKey(msg) => write!(f, "Invalid key: {msg}"),
            LoadError::ListenerClosed => {
                write!(f, "Snapshot listener closed before the first snapshot")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for DocpagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocpagerError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for StoreError {}
impl std::error::Error for LoadError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to DocpagerError ========================= */

impl From<io::Error> for DocpagerError {
    fn from(err: io::Error) -> Self {
        DocpagerError::Io(err)
    }
}

impl From<StoreError> for DocpagerError {
    fn from(err: StoreError) -> Self {
        DocpagerError::Store(err)
    }
}

impl From<LoadError> for DocpagerError {
    fn from(err: LoadError) -> Self {
        DocpagerError::Load(err)
    }
}

impl From<ConfigError> for DocpagerError {
    fn from(err: ConfigError) -> Self {
        DocpagerError::Config(err)
    }
}

impl From<toml::de::Error> for DocpagerError {
    fn from(err: toml::de::Error) -> Self {
        DocpagerError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<toml::ser::Error> for DocpagerError {
    fn from(err: toml::ser::Error) -> Self {
        DocpagerError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<String> for DocpagerError {
    fn from(msg: String) -> Self {
        DocpagerError::Generic(msg)
    }
}

impl From<&str> for DocpagerError {
    fn from(msg: &str) -> Self {
        DocpagerError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err: DocpagerError = StoreError::QueryFailed("index missing".to_string()).into();
        assert_eq!(err.to_string(), "Store error: Query failed: index missing");
    }

    #[test]
    fn test_load_error_display() {
        let err: DocpagerError = LoadError::InvalidKey("query 3".to_string()).into();
        assert_eq!(err.to_string(), "Load error: Invalid key: query 3");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "paging.page_size".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value '0' for field 'paging.page_size'"
        );
    }
}
