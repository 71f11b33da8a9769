//! CLI command implementations.

pub mod delete;
pub mod get;
pub mod list;
pub mod write;

use clap::ValueEnum;
use evelink_client::{RawDocument, Response};
use evelink_query::rfc1123;
use serde_json::Value;

/// Result type of every command: the text to print.
pub type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One `field: value` line per field.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Parses a `NAME=VALUE` header argument.
pub fn parse_header(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{arg}`")),
    }
}

/// Parses a JSON document argument.
pub fn parse_document(json: &str) -> Result<RawDocument, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err("expected a JSON object".into());
    }
    Ok(serde_json::from_value(value)?)
}

/// Renders a document.
pub fn render_document(doc: &RawDocument, format: Format) -> CommandResult {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(doc)?),
        Format::Text => {
            let mut lines = Vec::new();
            if let Some(id) = &doc.id {
                lines.push(format!("_id: {id}"));
            }
            if let Some(etag) = &doc.etag {
                lines.push(format!("_etag: {etag}"));
            }
            if let Some(created) = &doc.created {
                lines.push(format!("_created: {}", rfc1123::format(created)));
            }
            if let Some(updated) = &doc.updated {
                lines.push(format!("_updated: {}", rfc1123::format(updated)));
            }
            if doc.is_deleted() {
                lines.push("_deleted: true".to_string());
            }
            for (key, value) in &doc.fields {
                lines.push(format!("{key}: {value}"));
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Renders a response the client did not interpret.
pub fn render_response(response: &Response) -> String {
    if response.body.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        format!("HTTP {}\n{}", response.status, response.body)
    }
}
