use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::clients::{
    ClientError, ClientResult, Direction, Document, DocumentStore, Filter, Query, SetMode,
    SERVER_TIMESTAMP,
};

/// Store operations, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Query,
    Get,
    Add,
    Create,
    Set,
    Update,
    Delete,
    Increment,
}

#[derive(Default)]
struct StoreState {
    /// Documents per collection path, in insertion order
    collections: HashMap<String, Vec<Document>>,
    last_timestamp: i64,
    faults: HashMap<StoreOp, VecDeque<ClientError>>,
    offline: bool,
    calls: HashMap<StoreOp, usize>,
}

impl StoreState {
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_micros();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn resolve_server_timestamps(&mut self, data: &mut Value) {
        if let Value::Object(fields) = data {
            let pending: Vec<String> = fields
                .iter()
                .filter(|(_, value)| value.as_str() == Some(SERVER_TIMESTAMP))
                .map(|(key, _)| key.clone())
                .collect();
            if pending.is_empty() {
                return;
            }
            let ts = self.next_timestamp();
            for key in pending {
                fields.insert(key, Value::from(ts));
            }
        }
    }

    fn collection(&mut self, path: &str) -> &mut Vec<Document> {
        self.collections.entry(path.to_string()).or_default()
    }
}

/// In-process document store with the same contract as the managed backend.
///
/// Supports fault injection (`fail_next`, `set_offline`), a pause gate that
/// holds every call until `resume`, and optional yield points so concurrent
/// callers interleave.
pub struct MemoryDocumentStore {
    state: Mutex<StoreState>,
    paused: watch::Sender<bool>,
    yield_each_call: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(StoreState::default()),
            paused,
            yield_each_call: AtomicBool::new(false),
        }
    }

    /// Insert a document directly, bypassing faults and pauses
    pub fn seed(&self, collection: &str, id: &str, mut data: Value) {
        let mut state = self.state.lock();
        state.resolve_server_timestamps(&mut data);
        let docs = state.collection(collection);
        match docs.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => doc.data = data,
            None => docs.push(Document {
                id: id.to_string(),
                data,
            }),
        }
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .map(|doc| doc.data.clone())
    }

    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn fail_next(&self, op: StoreOp, err: ClientError) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Hold every subsequent call until `resume`
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn yield_each_call(&self, enabled: bool) {
        self.yield_each_call.store(enabled, AtomicOrdering::SeqCst);
    }

    async fn enter(&self, op: StoreOp) -> ClientResult<()> {
        if self.yield_each_call.load(AtomicOrdering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let mut paused = self.paused.subscribe();
        paused.wait_for(|paused| !*paused).await.map(|_| ()).ok();

        let mut state = self.state.lock();
        *state.calls.entry(op).or_default() += 1;
        if state.offline {
            return Err(ClientError::Unavailable("document store offline".to_string()));
        }
        if let Some(err) = state.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            debug!(?op, error = %err, "Injected store fault");
            return Err(err);
        }
        Ok(())
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn matches_filters(doc: &Document, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(field, value) => doc.data.get(field) == Some(value),
        Filter::In(field, values) => doc
            .data
            .get(field)
            .map_or(false, |actual| values.contains(actual)),
    })
}

fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, query: &Query) -> ClientResult<Vec<Document>> {
        self.enter(StoreOp::Query).await?;
        let state = self.state.lock();

        let mut docs: Vec<Document> = state
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filters(doc, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = &query.order_by {
            // Documents without the ordering field are not part of an ordered result
            docs.retain(|doc| doc.data.get(field).is_some());
            // Stable sort keeps insertion order for ties
            docs.sort_by(|a, b| {
                let ord = compare_values(&a.data[field.as_str()], &b.data[field.as_str()]);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(anchor) = &query.start_after {
            match docs.iter().position(|doc| doc.id == anchor.id) {
                Some(index) => {
                    docs.drain(..=index);
                }
                None => {
                    if let Some((field, direction)) = &query.order_by {
                        let past = match direction {
                            Direction::Ascending => Ordering::Greater,
                            Direction::Descending => Ordering::Less,
                        };
                        docs.retain(|doc| {
                            compare_values(&doc.data[field.as_str()], &anchor.value) == past
                        });
                    }
                }
            }
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> ClientResult<Option<Document>> {
        self.enter(StoreOp::Get).await?;
        let state = self.state.lock();
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn add(&self, collection: &str, mut data: Value) -> ClientResult<Document> {
        self.enter(StoreOp::Add).await?;
        let mut state = self.state.lock();
        state.resolve_server_timestamps(&mut data);

        let doc = Document {
            id: Uuid::new_v4().simple().to_string(),
            data,
        };
        state.collection(collection).push(doc.clone());
        Ok(doc)
    }

    async fn create(&self, collection: &str, id: &str, mut data: Value) -> ClientResult<bool> {
        self.enter(StoreOp::Create).await?;
        let mut state = self.state.lock();
        if state
            .collection(collection)
            .iter()
            .any(|doc| doc.id == id)
        {
            return Ok(false);
        }

        state.resolve_server_timestamps(&mut data);
        state.collection(collection).push(Document {
            id: id.to_string(),
            data,
        });
        Ok(true)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        mut data: Value,
        mode: SetMode,
    ) -> ClientResult<()> {
        self.enter(StoreOp::Set).await?;
        let mut state = self.state.lock();
        state.resolve_server_timestamps(&mut data);

        let docs = state.collection(collection);
        match docs.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => match mode {
                SetMode::Replace => doc.data = data,
                SetMode::Merge => merge_into(&mut doc.data, data),
            },
            None => docs.push(Document {
                id: id.to_string(),
                data,
            }),
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, mut data: Value) -> ClientResult<()> {
        self.enter(StoreOp::Update).await?;
        let mut state = self.state.lock();
        state.resolve_server_timestamps(&mut data);

        let doc = state
            .collection(collection)
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("{}/{}", collection, id)))?;
        merge_into(&mut doc.data, data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> ClientResult<bool> {
        self.enter(StoreOp::Delete).await?;
        let mut state = self.state.lock();
        let docs = state.collection(collection);
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        Ok(docs.len() < before)
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> ClientResult<i64> {
        self.enter(StoreOp::Increment).await?;
        let mut state = self.state.lock();

        let doc = state
            .collection(collection)
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("{}/{}", collection, id)))?;

        if doc.data.is_null() {
            doc.data = Value::Object(Map::new());
        }
        let fields = doc.data.as_object_mut().ok_or_else(|| {
            ClientError::Malformed(format!("{}/{} is not an object", collection, id))
        })?;

        let current = match fields.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                ClientError::Malformed(format!("{}/{}.{} is not an integer", collection, id, field))
            })?,
        };
        let next = current + delta;
        fields.insert(field.to_string(), Value::from(next));
        Ok(next)
    }
}
