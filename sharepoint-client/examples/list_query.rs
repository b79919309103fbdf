//! Queries the lists of a site over the legacy REST dialect.
//!
//! Usage: SP_TOKEN=<bearer token> cargo run --example list_query -- https://contoso.sharepoint.com

use std::sync::Arc;

use anyhow::Context;
use sharepoint_client::{
    ClientConfig, EntityMetadata, EntityMetadataRegistry, FieldMetadata, FieldType, Filter,
    OperationRequest, OperationTarget, Protocol, Query, SharePointClient, StaticTokenProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let host = std::env::args()
        .nth(1)
        .context("expected the site host as the first argument")?;
    let token = std::env::var("SP_TOKEN").context("SP_TOKEN is not set")?;

    let mut registry = EntityMetadataRegistry::new();
    registry.register(
        EntityMetadata::new("List")
            .with_field(FieldMetadata::new("Title", FieldType::String))
            .with_field(FieldMetadata::new("Hidden", FieldType::Boolean)),
    );

    let client = SharePointClient::connect(
        Arc::new(StaticTokenProvider::new(token)),
        ClientConfig::default(),
        registry,
    )?;

    let query = Query::builder()
        .select(["Title"])
        .filter(Filter::eq("Hidden", false))
        .build();
    let result = client
        .execute(OperationRequest::read(
            Protocol::Rest,
            OperationTarget::new(host.as_str(), "List", "_api/web/lists"),
            query,
        ))
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
