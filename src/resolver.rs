//! Fragment resolvers
//!
//! Both resolvers follow the same sequence: availability check, at most one
//! remote attempt, then the resolver's own fallback. They differ in policy:
//!
//! - [`DetailResolver`] falls back to the snapshot and can end in `NotFound`.
//!   A remote 404 is authoritative and skips the snapshot.
//! - [`ListResolver`] has no fallback tier; every failure degrades to an
//!   empty collection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::SourceAvailability;
use crate::remote::{FragmentRequest, RemoteClient, ResponseClass};
use crate::snapshot::SnapshotStore;
use crate::types::{Book, RecordId, ResolutionOutcome, Review};
use crate::{ResolutionError, Result};

/// Resolves one page fragment by key
#[async_trait]
pub trait FragmentResolver: Send + Sync {
    type Output: Send;

    async fn resolve(&self, key: &RecordId) -> ResolutionOutcome<Self::Output>;
}

/// Resolves a single book: remote first, snapshot fallback
#[derive(Clone)]
pub struct DetailResolver {
    availability: Arc<dyn SourceAvailability>,
    remote: Arc<dyn RemoteClient>,
    snapshot: Arc<dyn SnapshotStore>,
}

impl DetailResolver {
    pub fn new(
        availability: Arc<dyn SourceAvailability>,
        remote: Arc<dyn RemoteClient>,
        snapshot: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            availability,
            remote,
            snapshot,
        }
    }

    /// Resolve the book, yielding `Found` or `NotFound`
    #[instrument(skip(self, id), fields(book_id = %id))]
    pub async fn resolve_book(&self, id: &RecordId) -> ResolutionOutcome<Book> {
        if !self.availability.is_configured() {
            debug!("Remote source not configured, reading snapshot");
            return self.snapshot_lookup(id);
        }

        let response = match self.remote.fetch(&FragmentRequest::detail(id.clone())).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Remote book fetch failed, falling back to snapshot");
                return self.snapshot_lookup(id);
            }
        };

        match response.classify() {
            ResponseClass::Success => match response.json::<Book>() {
                Ok(book) => ResolutionOutcome::Found(book),
                Err(e) => {
                    warn!(error = %e, "Remote book body unreadable, falling back to snapshot");
                    self.snapshot_lookup(id)
                }
            },
            // Confirmed absence upstream; the snapshot must not resurrect it
            ResponseClass::NotFound => {
                info!("Remote source reports book not found");
                ResolutionOutcome::NotFound
            }
            ResponseClass::Failure => {
                warn!(
                    status = response.status,
                    "Remote book fetch returned failure status, falling back to snapshot"
                );
                self.snapshot_lookup(id)
            }
        }
    }

    /// Resolve the book or fail with [`ResolutionError::NotFound`]
    pub async fn require(&self, id: &RecordId) -> Result<Book> {
        self.resolve_book(id)
            .await
            .into_option()
            .ok_or_else(|| ResolutionError::NotFound(id.clone()))
    }

    fn snapshot_lookup(&self, id: &RecordId) -> ResolutionOutcome<Book> {
        let outcome = ResolutionOutcome::from(self.snapshot.lookup_one(id));
        if !outcome.is_found() {
            info!("Book absent from snapshot");
        }
        outcome
    }
}

#[async_trait]
impl FragmentResolver for DetailResolver {
    type Output = Book;

    async fn resolve(&self, key: &RecordId) -> ResolutionOutcome<Book> {
        self.resolve_book(key).await
    }
}

/// Resolves the reviews of a book: remote first, empty fallback
#[derive(Clone)]
pub struct ListResolver {
    availability: Arc<dyn SourceAvailability>,
    remote: Arc<dyn RemoteClient>,
}

impl ListResolver {
    pub fn new(availability: Arc<dyn SourceAvailability>, remote: Arc<dyn RemoteClient>) -> Self {
        Self {
            availability,
            remote,
        }
    }

    /// Reviews of `book_id`; empty whenever the remote source cannot answer
    #[instrument(skip(self, book_id), fields(book_id = %book_id))]
    pub async fn reviews(&self, book_id: &RecordId) -> Vec<Review> {
        if !self.availability.is_configured() {
            debug!("Remote source not configured, no reviews");
            return Vec::new();
        }

        let response = match self
            .remote
            .fetch(&FragmentRequest::list_by_parent(book_id.clone()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Remote review fetch failed, returning no reviews");
                return Vec::new();
            }
        };

        if response.classify() != ResponseClass::Success {
            warn!(
                status = response.status,
                "Remote review fetch returned non-success status, returning no reviews"
            );
            return Vec::new();
        }

        match response.json::<Vec<serde_json::Value>>() {
            Ok(elements) => retain_for_parent(readable_reviews(elements), book_id),
            Err(e) => {
                warn!(error = %e, "Remote review body unreadable, returning no reviews");
                Vec::new()
            }
        }
    }
}

/// Decode each list element on its own so one bad review only drops itself
fn readable_reviews(elements: Vec<serde_json::Value>) -> Vec<Review> {
    elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value::<Review>(element) {
            Ok(review) => Some(review),
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable review");
                None
            }
        })
        .collect()
}

/// Drop reviews that belong to another book
fn retain_for_parent(reviews: Vec<Review>, book_id: &RecordId) -> Vec<Review> {
    let total = reviews.len();
    let kept: Vec<Review> = reviews
        .into_iter()
        .filter(|review| &review.book_id == book_id)
        .collect();

    if kept.len() != total {
        warn!(
            dropped = total - kept.len(),
            "Remote returned reviews for other books"
        );
    }
    kept
}

#[async_trait]
impl FragmentResolver for ListResolver {
    type Output = Vec<Review>;

    async fn resolve(&self, key: &RecordId) -> ResolutionOutcome<Vec<Review>> {
        ResolutionOutcome::from_collection(self.reviews(key).await)
    }
}
