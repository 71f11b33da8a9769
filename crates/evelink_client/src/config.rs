//! Configuration for the client.

use evelink_query::{MetaRole, NameResolver, NamingPolicy};
use std::time::Duration;

/// Configuration for an [`crate::EveClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address of the service (e.g. `https://api.example.com/v1`).
    pub base_url: Option<String>,
    /// Resource used by operations that take no explicit resource name.
    pub resource: Option<String>,
    /// Wire name of the last-updated field, for types that declare none.
    pub last_updated_field: String,
    /// Naming policy shared by the codec and the predicate compiler.
    pub naming: NamingPolicy,
    /// Headers added to every request.
    pub custom_headers: Vec<(String, String)>,
    /// Transport-level request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Sets the default resource.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the last-updated field name used for modified-since filters.
    pub fn with_last_updated_field(mut self, field: impl Into<String>) -> Self {
        self.last_updated_field = field.into();
        self
    }

    /// Sets the naming policy.
    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the name resolver for the configured policy.
    pub fn resolver(&self) -> NameResolver {
        NameResolver::new(self.naming)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            resource: None,
            last_updated_field: MetaRole::LastUpdated.default_wire_name().to_string(),
            naming: NamingPolicy::default(),
            custom_headers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}
