//! Delete and clear command implementations.

use super::{render_response, CommandResult};
use evelink_client::{EveClient, RawDocument, StatusCode, Transport};
use tracing::info;

/// Runs the delete command.
pub async fn run<T: Transport>(
    client: &EveClient<T>,
    resource: &str,
    id: &str,
    etag: &str,
) -> CommandResult {
    let doc = RawDocument {
        id: Some(id.to_string()),
        etag: Some(etag.to_string()),
        ..RawDocument::default()
    };
    let response = client.delete(resource, &doc).await?;
    if response.status == StatusCode::NO_CONTENT {
        Ok(format!("deleted {resource}/{id}"))
    } else {
        Ok(render_response(&response))
    }
}

/// Runs the clear command.
pub async fn clear<T: Transport>(client: &EveClient<T>, resource: &str, yes: bool) -> CommandResult {
    if !yes {
        return Err(format!("refusing to delete every document of {resource} without --yes").into());
    }
    info!(resource, "clearing resource");
    let response = client.delete_resource(resource).await?;
    if response.status == StatusCode::NO_CONTENT {
        Ok(format!("cleared {resource}"))
    } else {
        Ok(render_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evelink_client::{ClientConfig, MemoryTransport, Outcome};
    use serde_json::json;

    async fn seeded() -> (EveClient<MemoryTransport>, RawDocument) {
        let client = EveClient::new(ClientConfig::new("http://memory"), MemoryTransport::new());
        let doc: RawDocument = serde_json::from_value(json!({ "name": "Acme" })).unwrap();
        let created = match client.post("companies", &doc).await.unwrap() {
            Outcome::Success(created) => created,
            other => panic!("unexpected outcome: {other:?}"),
        };
        (client, created)
    }

    #[tokio::test]
    async fn delete_with_etag() {
        let (client, created) = seeded().await;
        let id = created.id.as_deref().unwrap();

        let output = run(&client, "companies", id, "stale").await.unwrap();
        assert!(output.starts_with("HTTP 412"));

        let output = run(&client, "companies", id, created.etag.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(output, format!("deleted companies/{id}"));
        assert_eq!(client.transport().document("companies", id).unwrap()["_deleted"], true);
    }

    #[tokio::test]
    async fn clear_needs_confirmation() {
        let (client, _) = seeded().await;

        assert!(clear(&client, "companies", false).await.is_err());
        assert_eq!(client.transport().len("companies"), 1);

        let output = clear(&client, "companies", true).await.unwrap();
        assert_eq!(output, "cleared companies");
        assert!(client.transport().is_empty("companies"));
    }
}
