//! Print the OpenAPI document of the HTTP surface as pretty JSON.

use anyhow::Context;
use utoipa::OpenApi;
use wikirace_back::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json().context("rendering OpenAPI document")?);
    Ok(())
}
