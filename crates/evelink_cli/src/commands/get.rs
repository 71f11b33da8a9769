//! Get command implementation.

use super::{render_document, render_response, CommandResult, Format};
use evelink_client::{EveClient, Outcome, RawDocument, Transport};

/// Runs the get command.
pub async fn run<T: Transport>(
    client: &EveClient<T>,
    resource: &str,
    id: &str,
    etag: Option<&str>,
    format: Format,
) -> CommandResult {
    match client.get::<RawDocument>(resource, id, etag).await? {
        Outcome::Success(doc) => render_document(&doc, format),
        Outcome::NotModified(_) => Ok(format!("{resource}/{id} not modified")),
        Outcome::NotFound => Ok(format!("{resource}/{id} not found")),
        Outcome::Passthrough(response) => Ok(render_response(&response)),
    }
}
