//! Snapshot dataset used when the remote source cannot answer
//!
//! The snapshot is loaded once and never mutated, so it is shared across
//! concurrent resolutions without locking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use tracing::{error, info};

use crate::config::ApiConfig;
use crate::types::{Book, RecordId, Review};
use crate::{ResolutionError, Result};

const BUNDLED_DATASET: &str = include_str!("../data/books.json");

static BUNDLED: OnceLock<Arc<StaticSnapshot>> = OnceLock::new();

/// Read-only keyed lookup over the fallback dataset
///
/// Lookups never fail. Ids are compared in their normalized string form.
pub trait SnapshotStore: Send + Sync {
    /// Book with the given id, if present
    fn lookup_one(&self, id: &RecordId) -> Option<Book>;

    /// Reviews of the given book, in dataset order; may be empty
    fn lookup_many(&self, parent_id: &RecordId) -> Vec<Review>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Books(Vec<Book>),
    Full {
        books: Vec<Book>,
        #[serde(default)]
        reviews: Vec<Review>,
    },
}

/// In-memory snapshot indexed by book id
#[derive(Debug, Default)]
pub struct StaticSnapshot {
    books: Vec<Book>,
    index: HashMap<RecordId, usize>,
    reviews: Vec<Review>,
}

impl StaticSnapshot {
    /// Build a snapshot, rejecting duplicate book ids
    pub fn new(books: Vec<Book>, reviews: Vec<Review>) -> Result<Self> {
        let mut index = HashMap::with_capacity(books.len());
        for (position, book) in books.iter().enumerate() {
            if index.insert(book.id.clone(), position).is_some() {
                return Err(ResolutionError::Snapshot(format!(
                    "duplicate book id {}",
                    book.id
                )));
            }
        }

        Ok(Self {
            books,
            index,
            reviews,
        })
    }

    /// Parse a bare array of books or a `{ "books": [...], "reviews": [...] }` document
    pub fn from_json(json: &str) -> Result<Self> {
        let document: SnapshotDocument =
            serde_json::from_str(json).map_err(|e| ResolutionError::Snapshot(e.to_string()))?;

        match document {
            SnapshotDocument::Books(books) => Self::new(books, Vec::new()),
            SnapshotDocument::Full { books, reviews } => Self::new(books, reviews),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ResolutionError::Snapshot(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Dataset compiled into the crate, parsed once per process
    pub fn bundled() -> Arc<StaticSnapshot> {
        BUNDLED
            .get_or_init(|| match Self::from_json(BUNDLED_DATASET) {
                Ok(snapshot) => Arc::new(snapshot),
                Err(e) => {
                    error!(error = %e, "Bundled snapshot is invalid, using an empty dataset");
                    Arc::new(StaticSnapshot::default())
                }
            })
            .clone()
    }

    /// Snapshot named by the configuration, or the bundled one
    pub fn for_config(config: &ApiConfig) -> Result<Arc<StaticSnapshot>> {
        match &config.snapshot_path {
            Some(path) => {
                let snapshot = Self::from_path(path)?;
                info!(
                    path = %path.display(),
                    books = snapshot.len(),
                    "Loaded snapshot dataset"
                );
                Ok(Arc::new(snapshot))
            }
            None => Ok(Self::bundled()),
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl SnapshotStore for StaticSnapshot {
    fn lookup_one(&self, id: &RecordId) -> Option<Book> {
        self.index
            .get(id)
            .and_then(|&position| self.books.get(position))
            .cloned()
    }

    fn lookup_many(&self, parent_id: &RecordId) -> Vec<Review> {
        self.reviews
            .iter()
            .filter(|review| &review.book_id == parent_id)
            .cloned()
            .collect()
    }
}
