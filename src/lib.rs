//! # bookpage-resolvers
//!
//! Content resolution for book detail pages.
//!
//! A page is assembled from independently resolved fragments. Each fragment
//! is read remote-first and degrades locally when the data service is absent,
//! failing, or unreachable. Transport errors never reach the caller.
//!
//! ## Features
//!
//! - **Detail Resolution** - single book, remote-first with snapshot fallback
//! - **List Resolution** - reviews by book, remote-first with empty fallback
//! - **Cache Directives** - durable and tag-addressable response caching
//! - **Snapshot Store** - immutable in-process fallback dataset
//! - **GraphQL Surface** - page data exposed through async-graphql and axum
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bookpage_resolvers::{ApiConfig, PageResolver, RecordId};
//!
//! # async fn example() -> bookpage_resolvers::Result<()> {
//! let resolver = PageResolver::from_config(ApiConfig::global())?;
//! let page = resolver.resolve(&RecordId::from("1")).await?;
//! println!("{} ({} reviews)", page.book.title, page.reviews.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod graphql;
pub mod logging;
pub mod page;
pub mod remote;
pub mod resolver;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::CachingClient;
pub use crate::config::{ApiConfig, SourceAvailability};
pub use graphql::{build_schema, graphql_handler, router, BookPageSchema};
pub use page::{BookPage, PageResolver, ReviewEditor};
pub use remote::{
    CacheDirective, FragmentKind, FragmentRequest, HttpRemoteClient, RawResponse, RemoteClient,
    ResponseClass, TransportError,
};
pub use resolver::{DetailResolver, FragmentResolver, ListResolver};
pub use snapshot::{SnapshotStore, StaticSnapshot};
pub use types::{Book, RecordId, ResolutionOutcome, Review, Timestamp};

use thiserror::Error;

/// Resolution errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Book not found: {0}")]
    NotFound(RecordId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolutionError>;
