//! Test doubles for resolver collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::SourceAvailability;
use crate::remote::{FragmentKind, FragmentRequest, RawResponse, RemoteClient, TransportError};
use crate::snapshot::{SnapshotStore, StaticSnapshot};
use crate::types::{Book, RecordId, Review};

/// Shared call counter handed out before a double is moved into a resolver
#[derive(Clone, Default)]
pub(crate) struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct FixedAvailability(pub bool);

impl SourceAvailability for FixedAvailability {
    fn is_configured(&self) -> bool {
        self.0
    }
}

type Outcome = Result<RawResponse, TransportError>;

/// Remote client answering from a fixed script
pub(crate) struct ScriptedClient {
    default: Outcome,
    by_kind: HashMap<FragmentKind, Outcome>,
    calls: CallCounter,
    seen: Arc<Mutex<Vec<FragmentRequest>>>,
}

impl ScriptedClient {
    pub fn responding(response: RawResponse) -> Self {
        Self::with_default(Ok(response))
    }

    pub fn failing(error: TransportError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default: Outcome) -> Self {
        Self {
            default,
            by_kind: HashMap::new(),
            calls: CallCounter::default(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the outcome for one fragment kind
    pub fn on(mut self, kind: FragmentKind, outcome: Outcome) -> Self {
        self.by_kind.insert(kind, outcome);
        self
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<FragmentRequest>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn fetch(&self, request: &FragmentRequest) -> Result<RawResponse, TransportError> {
        self.calls.hit();
        self.seen.lock().unwrap().push(request.clone());
        self.by_kind
            .get(&request.kind)
            .unwrap_or(&self.default)
            .clone()
    }
}

/// Remote client answering with a queue of outcomes, repeating the last one
pub(crate) struct SequenceClient {
    outcomes: Mutex<Vec<Outcome>>,
}

impl SequenceClient {
    pub fn new(mut outcomes: Vec<Outcome>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
        }
    }
}

#[async_trait]
impl RemoteClient for SequenceClient {
    async fn fetch(&self, _request: &FragmentRequest) -> Result<RawResponse, TransportError> {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop().unwrap()
        } else {
            outcomes.last().cloned().unwrap()
        }
    }
}

/// Snapshot wrapper that counts lookups
pub(crate) struct CountingSnapshot {
    inner: StaticSnapshot,
    lookups: CallCounter,
}

impl CountingSnapshot {
    pub fn new(inner: StaticSnapshot) -> Self {
        Self {
            inner,
            lookups: CallCounter::default(),
        }
    }

    pub fn lookups(&self) -> CallCounter {
        self.lookups.clone()
    }
}

impl SnapshotStore for CountingSnapshot {
    fn lookup_one(&self, id: &RecordId) -> Option<Book> {
        self.lookups.hit();
        self.inner.lookup_one(id)
    }

    fn lookup_many(&self, parent_id: &RecordId) -> Vec<Review> {
        self.lookups.hit();
        self.inner.lookup_many(parent_id)
    }
}

pub(crate) fn book(id: &str, title: &str) -> Book {
    Book {
        id: RecordId::from(id),
        title: title.to_string(),
        subtitle: String::new(),
        description: String::new(),
        author: String::new(),
        publisher: String::new(),
        cover_image_url: String::new(),
    }
}

pub(crate) fn snapshot_of(books: Vec<Book>) -> StaticSnapshot {
    StaticSnapshot::new(books, Vec::new()).unwrap()
}

pub(crate) fn json_response(status: u16, value: serde_json::Value) -> RawResponse {
    RawResponse::new(status, value.to_string())
}
