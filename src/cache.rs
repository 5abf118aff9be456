//! Response cache honoring per-request caching directives
//!
//! Wraps any [`RemoteClient`]. Successful responses are kept under their
//! request path until they are invalidated or evicted; entries made under a
//! `Tagged` directive can be dropped selectively by tag. The cache holds at
//! most `capacity` entries and evicts the least recently used one first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::remote::{FragmentRequest, RawResponse, RemoteClient, TransportError};

/// Entry limit used by [`CachingClient::new`]
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct CachedEntry {
    response: RawResponse,
    tag: Option<String>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedEntry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!(path = %key, "Evicted cache entry");
        }
    }
}

/// Cache-through [`RemoteClient`]
///
/// Only successful responses whose body has the shape of their fragment are
/// stored. Failure statuses, not-found responses, malformed bodies and
/// transport errors always go back to the inner client on the next call.
pub struct CachingClient<C>
where
    C: RemoteClient + 'static,
{
    inner: Arc<C>,
    state: Arc<Mutex<CacheState>>,
    capacity: usize,
}

impl<C> CachingClient<C>
where
    C: RemoteClient + 'static,
{
    pub fn new(inner: C) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` entries; zero disables storage
    pub fn with_capacity(inner: C, capacity: usize) -> Self {
        Self {
            inner: Arc::new(inner),
            state: Arc::new(Mutex::new(CacheState::default())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry stored under `tag`, returning how many were removed
    pub async fn invalidate_tag(&self, tag: &str) -> usize {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.tag.as_deref() != Some(tag));
        let removed = before - state.entries.len();
        debug!(tag, removed, "Invalidated cache tag");
        removed
    }

    /// Clear the cache
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
    }

    /// Prime the cache with a response
    ///
    /// The entry takes the tag of the request's directive. When the cache is
    /// full the least recently used entry makes room.
    pub async fn prime(&self, request: &FragmentRequest, response: RawResponse) {
        if self.capacity == 0 {
            return;
        }

        let key = request.path();
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            state.evict_least_recent();
        }

        let last_used = state.tick();
        state.entries.insert(
            key,
            CachedEntry {
                response,
                tag: request.cache_directive().tag().map(str::to_string),
                last_used,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn contains(&self, request: &FragmentRequest) -> bool {
        self.state.lock().await.entries.contains_key(&request.path())
    }
}

impl<C> Clone for CachingClient<C>
where
    C: RemoteClient + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: self.state.clone(),
            capacity: self.capacity,
        }
    }
}

#[async_trait]
impl<C> RemoteClient for CachingClient<C>
where
    C: RemoteClient + 'static,
{
    async fn fetch(&self, request: &FragmentRequest) -> Result<RawResponse, TransportError> {
        let key = request.path();

        {
            let mut state = self.state.lock().await;
            let now = state.tick();
            if let Some(entry) = state.entries.get_mut(&key) {
                entry.last_used = now;
                debug!(path = %key, "Cache hit");
                return Ok(entry.response.clone());
            }
        }

        // The lock is not held across the network call
        let response = self.inner.fetch(request).await?;

        if response.is_success() {
            if request.accepts(&response) {
                self.prime(request, response.clone()).await;
            } else {
                warn!(path = %key, "Not caching success response with malformed body");
            }
        }

        Ok(response)
    }
}
