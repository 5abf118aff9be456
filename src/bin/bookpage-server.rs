//! Serves the book page GraphQL schema

use bookpage_resolvers::logging::init_tracing;
use bookpage_resolvers::{build_schema, router, ApiConfig, PageResolver, SourceAvailability};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::global();
    let schema = build_schema(PageResolver::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        remote_configured = config.is_configured(),
        "Listening"
    );

    axum::serve(listener, router(schema)).await?;
    Ok(())
}
