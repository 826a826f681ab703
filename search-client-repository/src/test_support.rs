//! In-memory search engine used by the unit tests.
//!
//! Implements `CallbackSearchClient` over a map of indices, answering every
//! call from a separate thread the way a real client's I/O threads would.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::errors::ClientError;
use crate::interfaces::{
    CallbackSearchClient, CancellationHandle, OnDone, OnFailure, OnSuccess, SearchRequest,
};
use crate::stream::PageCursor;

struct CountingHandle(Arc<AtomicUsize>);

impl CancellationHandle for CountingHandle {
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Scroll {
    remaining: VecDeque<Value>,
    size: usize,
}

#[derive(Default)]
struct EngineState {
    indices: HashMap<String, BTreeMap<String, Value>>,
    scrolls: HashMap<String, Scroll>,
    next_id: u64,
    requests: Vec<&'static str>,
    scroll_fetches: usize,
    cleared: Vec<String>,
    fail_next: Option<ClientError>,
    stall: bool,
    parked: Vec<(OnSuccess<Value>, OnFailure<ClientError>)>,
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    state: Mutex<EngineState>,
    cancellations: Arc<AtomicUsize>,
}

fn not_found(what: &str) -> ClientError {
    ClientError::status(404, format!("{{\"error\":\"{} not found\"}}", what))
}

/// Minimal query matching: `term`, `match` and everything else as match-all.
fn matches(query: &Value, doc: &Value) -> bool {
    if let Some(term) = query["term"].as_object() {
        return term.iter().all(|(field, value)| &doc[field] == value);
    }
    if let Some(clause) = query["match"].as_object() {
        return clause.iter().all(|(field, matcher)| {
            let text = matcher["query"].as_str().or_else(|| matcher.as_str()).unwrap_or("");
            doc[field]
                .as_str()
                .map(|v| v.to_lowercase().contains(&text.to_lowercase()))
                .unwrap_or(false)
        });
    }
    true
}

fn hit(id: &str, source: &Value) -> Value {
    json!({ "_id": id, "_score": 1.0, "_source": source })
}

impl EngineState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn apply(&mut self, request: SearchRequest) -> Result<Value, ClientError> {
        match request {
            SearchRequest::ClusterHealth => Ok(json!({
                "cluster_name": "fake-cluster",
                "status": "green",
                "timed_out": false,
                "number_of_nodes": 1,
                "number_of_data_nodes": 1,
                "active_primary_shards": self.indices.len(),
                "active_shards": self.indices.len(),
                "unassigned_shards": 0
            })),
            SearchRequest::CreateIndex { index, .. } => {
                if self.indices.contains_key(&index) {
                    return Err(ClientError::status(400, "resource_already_exists_exception"));
                }
                self.indices.insert(index.clone(), BTreeMap::new());
                Ok(json!({ "acknowledged": true, "index": index }))
            }
            SearchRequest::DeleteIndex { index } => match self.indices.remove(&index) {
                Some(_) => Ok(json!({ "acknowledged": true })),
                None => Err(not_found("index")),
            },
            SearchRequest::IndexExists { index } => Ok(json!(self.indices.contains_key(&index))),
            SearchRequest::Refresh { index } => match self.indices.contains_key(&index) {
                true => Ok(json!({ "_shards": { "failed": 0 } })),
                false => Err(not_found("index")),
            },
            SearchRequest::Index {
                index,
                id,
                document,
            } => {
                let id = id.unwrap_or_else(|| self.next_id("gen"));
                self.indices
                    .entry(index)
                    .or_default()
                    .insert(id.clone(), document);
                Ok(json!({ "_id": id, "result": "created" }))
            }
            SearchRequest::Get { index, id } => {
                let docs = self.indices.get(&index).ok_or_else(|| not_found("index"))?;
                match docs.get(&id) {
                    Some(source) => Ok(json!({ "_id": id, "found": true, "_source": source })),
                    None => Err(not_found("document")),
                }
            }
            SearchRequest::Delete { index, id } => self
                .indices
                .get_mut(&index)
                .and_then(|docs| docs.remove(&id))
                .map(|_| json!({ "_id": id, "result": "deleted" }))
                .ok_or_else(|| not_found("document")),
            SearchRequest::Bulk { index, lines } => {
                let mut items = Vec::new();
                for pair in lines.chunks(2) {
                    let [action, source] = pair else {
                        return Err(ClientError::status(400, "malformed bulk body"));
                    };
                    let id = match action["index"]["_id"].as_str() {
                        Some(id) => id.to_string(),
                        None => self.next_id("gen"),
                    };
                    if source["title"].as_str() == Some("") {
                        items.push(json!({ "index": { "_id": id, "status": 400, "error": {
                            "type": "mapper_parsing_exception",
                            "reason": "title must not be empty"
                        } } }));
                        continue;
                    }
                    self.indices
                        .entry(index.clone())
                        .or_default()
                        .insert(id.clone(), source.clone());
                    items.push(json!({ "index": { "_id": id, "status": 201 } }));
                }
                Ok(json!({ "took": 1, "items": items }))
            }
            SearchRequest::Count { index, query } => {
                let docs = self.indices.get(&index).ok_or_else(|| not_found("index"))?;
                let query = query.unwrap_or(Value::Null);
                let count = docs.values().filter(|doc| matches(&query, doc)).count();
                Ok(json!({ "count": count }))
            }
            SearchRequest::Search {
                index,
                body,
                scroll,
            } => {
                let docs = self.indices.get(&index).ok_or_else(|| not_found("index"))?;
                let size = body["size"].as_u64().unwrap_or(10) as usize;
                let mut all: VecDeque<Value> = docs
                    .iter()
                    .filter(|(_, doc)| matches(&body["query"], doc))
                    .map(|(id, doc)| hit(id, doc))
                    .collect();
                let total = all.len();
                let first: Vec<Value> = all.drain(..size.min(total)).collect();

                let mut response = json!({
                    "hits": { "total": { "value": total, "relation": "eq" }, "hits": first }
                });
                if scroll.is_some() {
                    let id = self.next_id("scroll");
                    self.scrolls.insert(
                        id.clone(),
                        Scroll {
                            remaining: all,
                            size,
                        },
                    );
                    response["_scroll_id"] = json!(id);
                }
                Ok(response)
            }
        }
    }

    fn next_page(&mut self, cursor: &PageCursor) -> Result<Value, ClientError> {
        self.scroll_fetches += 1;
        let scroll = self
            .scrolls
            .get_mut(cursor.as_str())
            .ok_or_else(|| not_found("scroll"))?;
        let take = scroll.size.min(scroll.remaining.len());
        let hits: Vec<Value> = scroll.remaining.drain(..take).collect();
        Ok(json!({ "_scroll_id": cursor.as_str(), "hits": { "hits": hits } }))
    }
}

fn deliver(
    outcome: Result<Value, ClientError>,
    on_success: OnSuccess<Value>,
    on_failure: OnFailure<ClientError>,
) {
    std::thread::spawn(move || match outcome {
        Ok(body) => on_success(body),
        Err(e) => on_failure(e),
    });
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next call or page fetch with `err`.
    pub fn fail_next(&self, err: ClientError) {
        self.state.lock().fail_next = Some(err);
    }

    /// Hold every later call forever; only cancellation ends it.
    pub fn stall(&self) {
        self.state.lock().stall = true;
    }

    pub fn requests(&self) -> Vec<&'static str> {
        self.state.lock().requests.clone()
    }

    pub fn scroll_fetches(&self) -> usize {
        self.state.lock().scroll_fetches
    }

    pub fn cleared(&self) -> Vec<String> {
        self.state.lock().cleared.clone()
    }

    pub fn open_scrolls(&self) -> usize {
        self.state.lock().scrolls.len()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .indices
            .get(index)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    fn handle(&self) -> Box<dyn CancellationHandle> {
        Box::new(CountingHandle(Arc::clone(&self.cancellations)))
    }

    fn respond<F>(&self, on_success: OnSuccess<Value>, on_failure: OnFailure<ClientError>, work: F)
    where
        F: FnOnce(&mut EngineState) -> Result<Value, ClientError>,
    {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            drop(state);
            deliver(Err(err), on_success, on_failure);
            return;
        }
        if state.stall {
            state.parked.push((on_success, on_failure));
            return;
        }
        let outcome = work(&mut *state);
        drop(state);
        deliver(outcome, on_success, on_failure);
    }
}

impl CallbackSearchClient for FakeEngine {
    fn start_call(
        &self,
        request: SearchRequest,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle> {
        self.state.lock().requests.push(request.operation());
        self.respond(on_success, on_failure, |state| state.apply(request));
        self.handle()
    }

    fn start_paged_call(
        &self,
        cursor: &PageCursor,
        _keep_alive: &str,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle> {
        self.respond(on_success, on_failure, |state| state.next_page(cursor));
        self.handle()
    }

    fn clear_cursor(&self, cursor: PageCursor, on_done: OnDone<ClientError>) {
        let outcome = {
            let mut state = self.state.lock();
            state.cleared.push(cursor.as_str().to_string());
            match state.scrolls.remove(cursor.as_str()) {
                Some(_) => Ok(()),
                None => Err(not_found("scroll")),
            }
        };
        on_done(outcome);
    }
}
