//! List command implementation.

use super::{render_document, render_response, CommandResult, Format};
use evelink_client::{EveClient, Outcome, RawDocument, Transport};
use evelink_query::{rfc1123, Query};

/// Filters of the list command.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Raw filter object.
    pub filter: Option<String>,
    /// RFC 1123 lower bound on the last-updated field.
    pub since: Option<String>,
    /// Include soft-deleted documents.
    pub show_deleted: bool,
}

impl ListOptions {
    fn query(&self) -> Result<Query<RawDocument>, String> {
        let mut query = Query::new();
        if let Some(filter) = &self.filter {
            query = query.raw(filter.as_str());
        }
        if let Some(since) = &self.since {
            let since =
                rfc1123::parse(since).ok_or_else(|| format!("invalid RFC 1123 date: {since}"))?;
            query = query.modified_since(since);
        }
        if self.show_deleted {
            query = query.include_deleted();
        }
        Ok(query)
    }
}

/// Runs the list command.
pub async fn run<T: Transport>(
    client: &EveClient<T>,
    resource: &str,
    options: &ListOptions,
    format: Format,
) -> CommandResult {
    let query = options.query()?;
    let items = match client.list(resource, &query).await? {
        Outcome::Success(items) => items,
        Outcome::Passthrough(response) => return Ok(render_response(&response)),
        other => return Ok(format!("unexpected outcome: {other:?}")),
    };

    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&items)?),
        Format::Text => {
            let rendered = items
                .iter()
                .map(|doc| render_document(doc, format))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!(
                "{} document(s) in {resource}\n\n{}",
                items.len(),
                rendered.join("\n\n")
            ))
        }
    }
}
