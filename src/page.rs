//! Book detail page assembly
//!
//! A page is the book, the review submission affordance and the review
//! list. The book and the reviews are resolved concurrently; a missing book
//! aborts the whole page while missing reviews never do.

use std::sync::Arc;

use async_graphql::SimpleObject;
use tracing::{info, instrument};

use crate::cache::CachingClient;
use crate::config::{ApiConfig, SourceAvailability};
use crate::remote::{review_tag, HttpRemoteClient, RemoteClient};
use crate::resolver::{DetailResolver, ListResolver};
use crate::snapshot::{SnapshotStore, StaticSnapshot};
use crate::types::{Book, RecordId, Review};
use crate::{ResolutionError, Result};

/// Data behind the review submission form
#[derive(SimpleObject, Debug, Clone, PartialEq)]
pub struct ReviewEditor {
    pub book_id: RecordId,
}

/// Everything a book detail page renders
#[derive(SimpleObject, Debug, Clone, PartialEq)]
pub struct BookPage {
    pub book: Book,
    pub review_editor: ReviewEditor,
    pub reviews: Vec<Review>,
}

/// Resolves whole pages from the two fragment resolvers
#[derive(Clone)]
pub struct PageResolver {
    detail: DetailResolver,
    list: ListResolver,
    cache: Option<CachingClient<HttpRemoteClient>>,
}

impl PageResolver {
    pub fn new(
        availability: Arc<dyn SourceAvailability>,
        remote: Arc<dyn RemoteClient>,
        snapshot: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            detail: DetailResolver::new(availability.clone(), remote.clone(), snapshot),
            list: ListResolver::new(availability, remote),
            cache: None,
        }
    }

    /// Wire the HTTP client, response cache and snapshot named by `config`
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let cache = CachingClient::with_capacity(
            HttpRemoteClient::from_config(config)?,
            config.cache_capacity,
        );
        let snapshot = StaticSnapshot::for_config(config)?;
        let availability: Arc<dyn SourceAvailability> = Arc::new(config.clone());

        info!(
            remote_configured = availability.is_configured(),
            snapshot_books = snapshot.len(),
            "Page resolver ready"
        );

        let mut resolver = Self::new(availability, Arc::new(cache.clone()), snapshot);
        resolver.cache = Some(cache);
        Ok(resolver)
    }

    pub fn detail(&self) -> &DetailResolver {
        &self.detail
    }

    pub fn list(&self) -> &ListResolver {
        &self.list
    }

    /// Resolve every fragment of the page for `id`
    #[instrument(skip(self, id), fields(book_id = %id))]
    pub async fn resolve(&self, id: &RecordId) -> Result<BookPage> {
        let (book, reviews) = tokio::join!(self.detail.resolve_book(id), self.list.reviews(id));

        let book = book
            .into_option()
            .ok_or_else(|| ResolutionError::NotFound(id.clone()))?;

        Ok(BookPage {
            book,
            review_editor: ReviewEditor {
                book_id: id.clone(),
            },
            reviews,
        })
    }

    /// Drop cached reviews of `book_id` so the next page sees new submissions
    pub async fn invalidate_reviews(&self, book_id: &RecordId) -> usize {
        match &self.cache {
            Some(cache) => cache.invalidate_tag(&review_tag(book_id)).await,
            None => 0,
        }
    }
}
