//! GraphQL surface over the page resolvers
//!
//! Exposes the page data contract to rendering clients. A missing book is
//! reported as an error carrying `extensions.code = "NOT_FOUND"`, which the
//! caller turns into its not-found page.

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Request, Response, Schema,
};
use axum::{extract::Extension, routing::post, Json, Router};

use crate::page::{BookPage, PageResolver};
use crate::types::{Book, RecordId, Review};
use crate::ResolutionError;

/// Schema served by [`router`]
pub type BookPageSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

impl ErrorExtensions for ResolutionError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| match self {
            ResolutionError::NotFound(_) => e.set("code", "NOT_FOUND"),
            _ => e.set("code", "INTERNAL"),
        })
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// All fragments of a book detail page
    async fn book_page(&self, ctx: &Context<'_>, id: RecordId) -> async_graphql::Result<BookPage> {
        let resolver = ctx.data::<PageResolver>()?;
        resolver.resolve(&id).await.map_err(|e| e.extend())
    }

    async fn book(&self, ctx: &Context<'_>, id: RecordId) -> async_graphql::Result<Book> {
        let resolver = ctx.data::<PageResolver>()?;
        resolver.detail().require(&id).await.map_err(|e| e.extend())
    }

    /// Reviews of a book; empty when the review service cannot answer
    async fn reviews(
        &self,
        ctx: &Context<'_>,
        book_id: RecordId,
    ) -> async_graphql::Result<Vec<Review>> {
        let resolver = ctx.data::<PageResolver>()?;
        Ok(resolver.list().reviews(&book_id).await)
    }
}

pub fn build_schema(resolver: PageResolver) -> BookPageSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(resolver)
        .finish()
}

/// Standard GraphQL handler
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::post, extract::Extension};
/// use bookpage_resolvers::{build_schema, graphql_handler, ApiConfig, PageResolver};
///
/// # fn example() -> bookpage_resolvers::Result<()> {
/// let schema = build_schema(PageResolver::from_config(ApiConfig::global())?);
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler))
///     .layer(Extension(schema));
/// # Ok(())
/// # }
/// ```
pub async fn graphql_handler(
    Extension(schema): Extension<BookPageSchema>,
    req: Json<Request>,
) -> Json<Response> {
    Json(schema.execute(req.0).await)
}

/// Router serving the schema at `POST /graphql`
pub fn router(schema: BookPageSchema) -> Router {
    Router::new()
        .route("/graphql", post(graphql_handler))
        .layer(Extension(schema))
}
