//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the directory REST API to `openapi.json`,
//! for clients that generate code from it.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

/// Serializes the OpenAPI document and writes it to `path`.
fn write_document(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = api_doc.to_pretty_json()?;
    std::fs::write(path, document)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Build the document from the shared ApiDoc and save it to `openapi.json`.
    write_document(ApiDoc::openapi(), "openapi.json")?;
    Ok(())
}
