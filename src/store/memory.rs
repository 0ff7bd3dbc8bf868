//! In-memory document store.
//!
//! A small live document store used by the demo binary and the test suite.
//! Collections are kept ordered by document id; queries support equality
//! filters, a single ordering field, cursors and limits. Every write
//! re-evaluates the attached listeners and notifies those whose result set
//! changed.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{ListenerRegistration, Query, SnapshotCallback, ToObject};
use crate::error::StoreError;

/// A document held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDocument {
    id: String,
    fields: Value,
}

impl MemoryDocument {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Value {
        &self.fields
    }

    /// Value of a top-level field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl ToObject for MemoryDocument {
    fn to_object<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.fields.clone()).ok()
    }
}

/// Ordering direction for sorted queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// Pure description of a query, evaluated against a collection.
#[derive(Debug, Clone, Default)]
struct QuerySpec {
    collection: String,
    filters: Vec<(String, Value)>,
    order_by: Option<(String, OrderDirection)>,
    start_after: Option<MemoryDocument>,
    limit: Option<usize>,
}

impl QuerySpec {
    fn direction(&self) -> OrderDirection {
        self.order_by
            .as_ref()
            .map(|(_, direction)| *direction)
            .unwrap_or_default()
    }

    /// Total order: the ordering field first, document id as tie-breaker.
    fn compare(&self, a: &MemoryDocument, b: &MemoryDocument) -> Ordering {
        let by_field = match &self.order_by {
            Some((field, _)) => compare_values(a.get(field), b.get(field)),
            None => Ordering::Equal,
        };
        let ordering = by_field.then_with(|| a.id.cmp(&b.id));
        match self.direction() {
            OrderDirection::Ascending => ordering,
            OrderDirection::Descending => ordering.reverse(),
        }
    }

    fn matches(&self, doc: &MemoryDocument) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    fn evaluate(
        &self,
        collection: Option<&BTreeMap<String, MemoryDocument>>,
    ) -> Vec<MemoryDocument> {
        let Some(collection) = collection else {
            return Vec::new();
        };

        let mut docs: Vec<MemoryDocument> = collection
            .values()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();
        docs.sort_by(|a, b| self.compare(a, b));

        if let Some(cursor) = &self.start_after {
            docs.retain(|doc| self.compare(doc, cursor) == Ordering::Greater);
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Rank used to order values of different JSON types.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

type SharedCallback = Arc<SnapshotCallback<MemoryDocument>>;
type Delivery = (SharedCallback, std::result::Result<Vec<MemoryDocument>, StoreError>);

struct ListenerEntry {
    spec: QuerySpec,
    callback: SharedCallback,
    last: Vec<MemoryDocument>,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, BTreeMap<String, MemoryDocument>>,
    listeners: HashMap<Uuid, ListenerEntry>,
    failure: Option<StoreError>,
    double_delivery: bool,
}

/// Live in-memory document store.
///
/// Cloning the store yields another handle to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the initial snapshot of every new listener twice, the way a
    /// store with a local cache answers first from cache, then from the server.
    pub fn with_double_delivery(self, enabled: bool) -> Self {
        self.lock().double_delivery = enabled;
        self
    }

    /// Query over all documents of `collection`, ordered by id.
    pub fn collection(&self, name: impl Into<String>) -> MemoryQuery {
        MemoryQuery {
            store: self.clone(),
            spec: QuerySpec {
                collection: name.into(),
                ..QuerySpec::default()
            },
        }
    }

    /// Insert or replace a document.
    pub fn set(&self, collection: &str, id: impl Into<String>, fields: Value) {
        let doc = MemoryDocument::new(id, fields);
        let deliveries = {
            let mut state = self.lock();
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(doc.id.clone(), doc);
            Self::collect_changes(&mut state, collection)
        };
        Self::deliver(deliveries);
    }

    /// Delete a document, returning whether it existed.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let (existed, deliveries) = {
            let mut state = self.lock();
            let existed = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some();
            (existed, Self::collect_changes(&mut state, collection))
        };
        Self::deliver(deliveries);
        existed
    }

    /// Make new listeners fail with `failure` until cleared with `None`.
    pub fn set_failure(&self, failure: Option<StoreError>) {
        self.lock().failure = failure;
    }

    /// Number of listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicking listener callback must not wedge the store.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collect_changes(state: &mut StoreState, collection: &str) -> Vec<Delivery> {
        let StoreState {
            collections,
            listeners,
            ..
        } = state;
        let docs = collections.get(collection);

        listeners
            .values_mut()
            .filter(|entry| entry.spec.collection == collection)
            .filter_map(|entry| {
                let result = entry.spec.evaluate(docs);
                if result == entry.last {
                    return None;
                }
                entry.last = result.clone();
                Some((Arc::clone(&entry.callback), Ok(result)))
            })
            .collect()
    }

    fn deliver(deliveries: Vec<Delivery>) {
        for (callback, result) in deliveries {
            trace!(ok = result.is_ok(), "Delivering snapshot");
            callback(result);
        }
    }

    fn listen(
        &self,
        spec: QuerySpec,
        callback: SnapshotCallback<MemoryDocument>,
    ) -> ListenerRegistration {
        let callback: SharedCallback = Arc::new(callback);
        let id = Uuid::new_v4();

        let deliveries: Vec<Delivery> = {
            let mut state = self.lock();
            if let Some(failure) = state.failure.clone() {
                vec![(callback, Err(failure))]
            } else {
                let result = spec.evaluate(state.collections.get(&spec.collection));
                let times = if state.double_delivery { 2 } else { 1 };
                debug!(
                    listener = %id,
                    collection = %spec.collection,
                    "Attaching snapshot listener"
                );
                state.listeners.insert(
                    id,
                    ListenerEntry {
                        spec,
                        callback: Arc::clone(&callback),
                        last: result.clone(),
                    },
                );
                (0..times)
                    .map(|_| (Arc::clone(&callback), Ok(result.clone())))
                    .collect()
            }
        };
        Self::deliver(deliveries);

        let store = self.clone();
        ListenerRegistration::new(move || {
            if store.lock().listeners.remove(&id).is_some() {
                debug!(listener = %id, "Removed snapshot listener");
            }
        })
    }
}

/// Query against a [`MemoryStore`] collection.
#[derive(Clone)]
pub struct MemoryQuery {
    store: MemoryStore,
    spec: QuerySpec,
}

impl MemoryQuery {
    /// Keep only documents whose `field` equals `value`.
    pub fn where_eq(&self, field: impl Into<String>, value: Value) -> Self {
        let mut query = self.clone();
        query.spec.filters.push((field.into(), value));
        query
    }

    /// Order by `field`; ties are broken by document id.
    pub fn order_by(&self, field: impl Into<String>, direction: OrderDirection) -> Self {
        let mut query = self.clone();
        query.spec.order_by = Some((field.into(), direction));
        query
    }

    /// One-shot read of the current result set.
    pub fn get(&self) -> std::result::Result<Vec<MemoryDocument>, StoreError> {
        let state = self.store.lock();
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        Ok(self.spec.evaluate(state.collections.get(&self.spec.collection)))
    }
}

impl std::fmt::Debug for MemoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQuery").field("spec", &self.spec).finish()
    }
}

impl Query for MemoryQuery {
    type Document = MemoryDocument;

    fn limit(&self, n: usize) -> Self {
        let mut query = self.clone();
        query.spec.limit = Some(n);
        query
    }

    fn start_after(&self, cursor: &MemoryDocument) -> Self {
        let mut query = self.clone();
        query.spec.start_after = Some(cursor.clone());
        query
    }

    fn add_snapshot_listener(
        &self,
        callback: SnapshotCallback<MemoryDocument>,
    ) -> ListenerRegistration {
        self.store.listen(self.spec.clone(), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn ids(docs: &[MemoryDocument]) -> Vec<&str> {
        docs.iter().map(|doc| doc.id()).collect()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.set("cities", "paris", json!({"name": "Paris", "population": 2100}));
        store.set("cities", "lyon", json!({"name": "Lyon", "population": 520}));
        store.set("cities", "nice", json!({"name": "Nice", "population": 340}));
        store.set("cities", "lille", json!({"name": "Lille", "population": 230, "capital": false}));
        store
    }

    #[test]
    fn test_default_order_is_by_id() {
        let store = seeded();
        let docs = store.collection("cities").get().unwrap();
        assert_eq!(ids(&docs), vec!["lille", "lyon", "nice", "paris"]);
    }

    #[test]
    fn test_order_by_field_descending() {
        let store = seeded();
        let docs = store
            .collection("cities")
            .order_by("population", OrderDirection::Descending)
            .get()
            .unwrap();
        assert_eq!(ids(&docs), vec!["paris", "lyon", "nice", "lille"]);
    }

    #[test]
    fn test_start_after_and_limit() {
        let store = seeded();
        let query = store
            .collection("cities")
            .order_by("population", OrderDirection::Ascending);
        let first = query.limit(2).get().unwrap();
        assert_eq!(ids(&first), vec!["lille", "nice"]);

        let rest = query.start_after(&first[1]).limit(2).get().unwrap();
        assert_eq!(ids(&rest), vec!["lyon", "paris"]);
    }

    #[test]
    fn test_where_eq() {
        let store = seeded();
        let docs = store
            .collection("cities")
            .where_eq("capital", json!(false))
            .get()
            .unwrap();
        assert_eq!(ids(&docs), vec!["lille"]);
    }

    #[test]
    fn test_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.collection("nothing").get().unwrap().is_empty());
    }

    #[test]
    fn test_listener_notified_only_on_change() {
        let store = seeded();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let registration = store
            .collection("cities")
            .limit(2)
            .add_snapshot_listener(Box::new(move |result| {
                sink.lock().unwrap().push(result.map(|docs| docs.len()));
            }));

        // outside the listener window
        store.set("cities", "zurich", json!({"name": "Zurich"}));
        // inside the listener window
        store.set("cities", "amiens", json!({"name": "Amiens"}));

        assert_eq!(*received.lock().unwrap(), vec![Ok(2), Ok(2)]);
        assert_eq!(store.listener_count(), 1);

        registration.remove();
        assert_eq!(store.listener_count(), 0);
        store.set("cities", "aachen", json!({"name": "Aachen"}));
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_double_delivery() {
        let store = seeded().with_double_delivery(true);
        let received = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&received);
        let _registration = store
            .collection("cities")
            .add_snapshot_listener(Box::new(move |_| {
                *sink.lock().unwrap() += 1;
            }));
        assert_eq!(*received.lock().unwrap(), 2);
    }

    #[test]
    fn test_failure_is_delivered() {
        let store = seeded();
        store.set_failure(Some(StoreError::PermissionDenied("cities".to_string())));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _registration = store
            .collection("cities")
            .add_snapshot_listener(Box::new(move |result| {
                sink.lock().unwrap().push(result.is_err());
            }));

        assert_eq!(*received.lock().unwrap(), vec![true]);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_to_object() {
        #[derive(Deserialize)]
        struct City {
            name: String,
        }

        let doc = MemoryDocument::new("paris", json!({"name": "Paris"}));
        let city: City = doc.to_object().unwrap();
        assert_eq!(city.name, "Paris");

        let broken = MemoryDocument::new("x", json!({"label": 3}));
        assert!(broken.to_object::<City>().is_none());
    }
}
