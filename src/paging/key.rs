/// Position within a single query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKey<D> {
    /// Start of the query, no cursor yet.
    Initial,

    /// Continue the query strictly after this document.
    StartAfter(D),
}

impl<D> QueryKey<D> {
    pub fn is_initial(&self) -> bool {
        matches!(self, QueryKey::Initial)
    }

    /// Cursor document, if any.
    pub fn cursor(&self) -> Option<&D> {
        match self {
            QueryKey::Initial => None,
            QueryKey::StartAfter(doc) => Some(doc),
        }
    }
}

/// Position within a list of concatenated queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatKey<D> {
    /// Index of the query this key belongs to.
    pub query_index: usize,

    /// Position within that query.
    pub query_key: QueryKey<D>,
}

impl<D> ConcatKey<D> {
    pub fn new(query_index: usize, query_key: QueryKey<D>) -> Self {
        Self {
            query_index,
            query_key,
        }
    }

    /// Start of the query at `query_index`.
    pub fn initial(query_index: usize) -> Self {
        Self::new(query_index, QueryKey::Initial)
    }
}

/// Cursor for the next page: the last fetched document when the page is full.
///
/// A short page means the query is exhausted. Documents that fail to map
/// still count, so cursors follow what was fetched, not what was shown.
pub(crate) fn full_page_cursor<D: Clone>(docs: &[D], load_size: usize) -> Option<D> {
    if load_size > 0 && docs.len() >= load_size {
        docs.last().cloned()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key_cursor() {
        assert!(QueryKey::<u32>::Initial.is_initial());
        assert_eq!(QueryKey::<u32>::Initial.cursor(), None);
        assert_eq!(QueryKey::StartAfter(7).cursor(), Some(&7));
    }

    #[test]
    fn test_full_page_cursor() {
        assert_eq!(full_page_cursor(&[1, 2, 3], 3), Some(3));
        assert_eq!(full_page_cursor(&[1, 2], 3), None);
        assert_eq!(full_page_cursor::<u32>(&[], 3), None);
        assert_eq!(full_page_cursor::<u32>(&[], 0), None);
    }
}
