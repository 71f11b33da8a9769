//! Post and put command implementations.

use super::{parse_document, render_document, render_response, CommandResult, Format};
use evelink_client::{EveClient, Outcome, RawDocument, Transport};
use serde_json::Value;

/// Runs the post command. A JSON array creates every element in one request.
pub async fn post<T: Transport>(client: &EveClient<T>, resource: &str, json: &str) -> CommandResult {
    let value: Value = serde_json::from_str(json)?;
    if value.is_array() {
        let docs: Vec<RawDocument> = serde_json::from_value(value)?;
        return match client.post_many(resource, &docs).await? {
            Outcome::Success(created) => {
                let ids: Vec<&str> = created.iter().filter_map(|d| d.id.as_deref()).collect();
                Ok(format!("created {} document(s): {}", ids.len(), ids.join(", ")))
            }
            Outcome::Passthrough(response) => Ok(render_response(&response)),
            other => Ok(format!("unexpected outcome: {other:?}")),
        };
    }

    let doc = parse_document(json)?;
    match client.post(resource, &doc).await? {
        Outcome::Success(created) => render_document(&created, Format::Text),
        Outcome::Passthrough(response) => Ok(render_response(&response)),
        other => Ok(format!("unexpected outcome: {other:?}")),
    }
}

/// Runs the put command.
pub async fn put<T: Transport>(client: &EveClient<T>, resource: &str, json: &str) -> CommandResult {
    let doc = parse_document(json)?;
    match client.put(resource, &doc).await? {
        Outcome::Success(updated) => render_document(&updated, Format::Text),
        Outcome::Passthrough(response) => Ok(render_response(&response)),
        other => Ok(format!("unexpected outcome: {other:?}")),
    }
}
