//! The conditional-request engine.
//!
//! ## Preconditions
//!
//! Before anything is sent, operations check, in order:
//! 1. a base address is configured
//! 2. the resource name is not empty
//! 3. the document id resolves (single-document operations)
//! 4. the etag resolves (PUT and DELETE)
//!
//! A failed check returns an error and issues no request.
//!
//! ## Protocol states
//!
//! Not-modified, not-found and every unexpected status are values of
//! [`Outcome`], never errors. Nothing is retried and nothing is kept on the
//! client between calls.

use crate::auth::Authenticator;
use crate::codec::DocumentCodec;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::HttpTransport;
use crate::transport::{
    encode_segment, Method, Request, Response, StatusCode, Transport, ACCEPT, APPLICATION_JSON,
    AUTHORIZATION, IF_MATCH, IF_NONE_MATCH,
};
use evelink_query::{
    CompiledQuery, Document, MetaFieldMap, MetaFieldRegistry, MetaRole, NameResolver, Query,
    QueryContext,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A write ready to send: the type's field table, the encoded body and the
/// request carrying it.
type Prepared<D> = (Arc<MetaFieldMap<D>>, Map<String, Value>, Request);

/// Result of a typed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<D> {
    /// The service returned the document (or list).
    Success(D),
    /// The caller's copy is current. Holds that copy when the operation was
    /// given one.
    NotModified(Option<D>),
    /// The document does not exist.
    NotFound,
    /// Any other response, unparsed.
    Passthrough(Response),
}

impl<D> Outcome<D> {
    /// Returns true for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true for [`Outcome::NotModified`].
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Outcome::NotModified(_))
    }

    /// Returns true for [`Outcome::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound)
    }

    /// The up-to-date document, if the outcome carries one.
    pub fn into_document(self) -> Option<D> {
        match self {
            Outcome::Success(doc) | Outcome::NotModified(Some(doc)) => Some(doc),
            _ => None,
        }
    }

    /// The passed-through response.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Passthrough(response) => Some(response),
            _ => None,
        }
    }

    /// Maps the carried document.
    pub fn map<U>(self, f: impl FnOnce(D) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(doc) => Outcome::Success(f(doc)),
            Outcome::NotModified(doc) => Outcome::NotModified(doc.map(f)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Passthrough(response) => Outcome::Passthrough(response),
        }
    }
}

/// Client for an Eve-style REST document store.
///
/// Generic over the [`Transport`]; [`EveClient::http`] builds one backed by
/// reqwest. A client holds no per-call state and can be shared across tasks.
pub struct EveClient<T = HttpTransport> {
    config: ClientConfig,
    transport: T,
    authenticator: Option<Arc<dyn Authenticator>>,
    resolver: NameResolver,
    registry: &'static MetaFieldRegistry,
}

impl EveClient<HttpTransport> {
    /// Creates a client that talks HTTP.
    pub fn http(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::new(config, transport))
    }
}

impl<T: Transport> EveClient<T> {
    /// Creates a client over the given transport.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let resolver = config.resolver();
        Self {
            config,
            transport,
            authenticator: None,
            resolver,
            registry: MetaFieldRegistry::global(),
        }
    }

    /// Sets the authenticator consulted on every request.
    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Uses a specific meta-field registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: &'static MetaFieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The configured default resource.
    pub fn default_resource(&self) -> ClientResult<&str> {
        self.config
            .resource
            .as_deref()
            .ok_or(ClientError::MissingResource)
    }

    /// Compiles a collection query with this client's naming settings.
    pub fn compile<D: Document>(&self, query: &Query<D>) -> ClientResult<CompiledQuery> {
        let ctx = QueryContext {
            registry: self.registry,
            resolver: &self.resolver,
            last_updated_field: &self.config.last_updated_field,
        };
        Ok(query.compile(&ctx)?)
    }

    /// GET on an arbitrary endpoint, returning the raw response.
    ///
    /// A non-empty `etag` is sent as `If-None-Match`.
    pub async fn get_raw(
        &self,
        path: &str,
        etag: Option<&str>,
        query: &CompiledQuery,
    ) -> ClientResult<Response> {
        let base = self.base_url()?;
        check_resource(path)?;

        let mut request = self.request(base, Method::Get, path).with_query(query);
        if let Some(etag) = etag.filter(|e| !e.is_empty()) {
            request = request.with_header(IF_NONE_MATCH, etag);
        }
        self.send(request).await
    }

    /// Fetches a document by id.
    ///
    /// With an etag the request is conditional, and an unchanged document
    /// yields `NotModified(None)`.
    pub async fn get<D: Document>(
        &self,
        resource: &str,
        id: &str,
        etag: Option<&str>,
    ) -> ClientResult<Outcome<D>> {
        self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        if id.is_empty() {
            return Err(missing_id(&map));
        }

        let response = self
            .get_raw(&document_path(resource, id), etag, &CompiledQuery::empty())
            .await?;
        self.interpret(&map, response, None)
    }

    /// Re-fetches a document the caller already holds.
    ///
    /// The id is taken from the document and the etag, when present, makes
    /// the request conditional. An unchanged document is handed back as
    /// `NotModified(Some(doc))` without being re-parsed.
    pub async fn refresh<D: Document>(&self, resource: &str, doc: D) -> ClientResult<Outcome<D>> {
        self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let id = map
            .value(&doc, MetaRole::DocumentId)
            .ok_or_else(|| missing_id(&map))?;
        let etag = map.value(&doc, MetaRole::ETag);

        let response = self
            .get_raw(
                &document_path(resource, &id),
                etag.as_deref(),
                &CompiledQuery::empty(),
            )
            .await?;
        self.interpret(&map, response, Some(doc))
    }

    /// Fetches the documents of a resource matching a query.
    pub async fn list<D: Document>(
        &self,
        resource: &str,
        query: &Query<D>,
    ) -> ClientResult<Outcome<Vec<D>>> {
        self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let compiled = self.compile(query)?;

        let response = self.get_raw(resource, None, &compiled).await?;
        if response.status == StatusCode::OK {
            let items = DocumentCodec::new(&map, &self.resolver).decode_items(&response.body)?;
            Ok(Outcome::Success(items))
        } else {
            Ok(Outcome::Passthrough(response))
        }
    }

    /// Creates a document, returning the raw response.
    pub async fn post_raw<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Response> {
        let (_, _, request) = self.prepare_post(resource, doc)?;
        self.send(request).await
    }

    /// Creates a document. On 201 the document is returned with the meta
    /// fields the service assigned.
    pub async fn post<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Outcome<D>> {
        let (map, sent, request) = self.prepare_post(resource, doc)?;
        let response = self.send(request).await?;
        if response.status == StatusCode::CREATED {
            let created =
                DocumentCodec::new(&map, &self.resolver).decode_written(sent, &response.body)?;
            Ok(Outcome::Success(created))
        } else {
            Ok(Outcome::Passthrough(response))
        }
    }

    /// Creates several documents in one request.
    pub async fn post_many<D: Document>(
        &self,
        resource: &str,
        docs: &[D],
    ) -> ClientResult<Outcome<Vec<D>>> {
        let base = self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let codec = DocumentCodec::new(&map, &self.resolver);
        let sent = docs
            .iter()
            .map(|doc| codec.encode_value(doc))
            .collect::<ClientResult<Vec<_>>>()?;
        let body = Value::Array(sent.iter().cloned().map(Value::Object).collect()).to_string();

        let request = self.request(base, Method::Post, resource).with_body(body);
        let response = self.send(request).await?;
        if response.status == StatusCode::CREATED {
            Ok(Outcome::Success(
                codec.decode_written_items(sent, &response.body)?,
            ))
        } else {
            Ok(Outcome::Passthrough(response))
        }
    }

    /// Replaces a document, returning the raw response.
    ///
    /// The document must carry its id and etag; the etag is sent as
    /// `If-Match`.
    pub async fn put_raw<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Response> {
        let (_, _, request) = self.prepare_put(resource, doc)?;
        self.send(request).await
    }

    /// Replaces a document. On 200 the document is returned with its new
    /// meta fields; a stale etag comes back as a passed-through 412.
    pub async fn put<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Outcome<D>> {
        let (map, sent, request) = self.prepare_put(resource, doc)?;
        let response = self.send(request).await?;
        if response.status == StatusCode::OK {
            let updated =
                DocumentCodec::new(&map, &self.resolver).decode_written(sent, &response.body)?;
            Ok(Outcome::Success(updated))
        } else {
            Ok(Outcome::Passthrough(response))
        }
    }

    /// Deletes a document, conditional on its etag.
    pub async fn delete<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Response> {
        let base = self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let (id, etag) = conditional_target(&map, doc)?;

        let request = self
            .request(base, Method::Delete, &document_path(resource, &id))
            .with_header(IF_MATCH, etag);
        self.send(request).await
    }

    /// Deletes every document of a resource. Not conditional.
    pub async fn delete_resource(&self, resource: &str) -> ClientResult<Response> {
        let base = self.base_url()?;
        check_resource(resource)?;

        warn!(resource, "deleting every document of the resource");
        let request = self.request(base, Method::Delete, resource);
        self.send(request).await
    }

    fn base_url(&self) -> ClientResult<&str> {
        self.config
            .base_url
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or(ClientError::MissingBaseAddress)
    }

    fn request(&self, base: &str, method: Method, path: &str) -> Request {
        let mut request = Request::new(method, base, path).with_header(ACCEPT, APPLICATION_JSON);
        if let Some(authenticator) = &self.authenticator {
            request = request.with_header(AUTHORIZATION, authenticator.authorization());
        }
        for (name, value) in &self.config.custom_headers {
            request = request.with_header(name.as_str(), value.as_str());
        }
        request
    }

    fn prepare_post<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Prepared<D>> {
        let base = self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let sent = DocumentCodec::new(&map, &self.resolver).encode_value(doc)?;

        let request = self
            .request(base, Method::Post, resource)
            .with_body(Value::Object(sent.clone()).to_string());
        Ok((map, sent, request))
    }

    fn prepare_put<D: Document>(&self, resource: &str, doc: &D) -> ClientResult<Prepared<D>> {
        let base = self.base_url()?;
        check_resource(resource)?;
        let map = self.registry.map::<D>()?;
        let (id, etag) = conditional_target(&map, doc)?;
        let sent = DocumentCodec::new(&map, &self.resolver).encode_value(doc)?;

        let request = self
            .request(base, Method::Put, &document_path(resource, &id))
            .with_header(IF_MATCH, etag)
            .with_body(Value::Object(sent.clone()).to_string());
        Ok((map, sent, request))
    }

    async fn send(&self, request: Request) -> ClientResult<Response> {
        let method = request.method;
        let target = request.target();
        let response = self.transport.send(request).await?;
        debug!(%method, %target, status = %response.status, "request completed");
        Ok(response)
    }

    fn interpret<D: Document>(
        &self,
        map: &MetaFieldMap<D>,
        response: Response,
        current: Option<D>,
    ) -> ClientResult<Outcome<D>> {
        match response.status {
            StatusCode::OK => {
                let doc = DocumentCodec::new(map, &self.resolver).decode(&response.body)?;
                Ok(Outcome::Success(doc))
            }
            StatusCode::NOT_MODIFIED => Ok(Outcome::NotModified(current)),
            StatusCode::NOT_FOUND => Ok(Outcome::NotFound),
            _ => Ok(Outcome::Passthrough(response)),
        }
    }
}

impl<T> fmt::Debug for EveClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EveClient")
            .field("config", &self.config)
            .field("authenticated", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

fn check_resource(resource: &str) -> ClientResult<()> {
    if resource.trim_matches('/').is_empty() {
        return Err(ClientError::EmptyResource);
    }
    Ok(())
}

fn document_path(resource: &str, id: &str) -> String {
    format!("{}/{}", resource.trim_end_matches('/'), encode_segment(id))
}

fn role_field<D>(map: &MetaFieldMap<D>, role: MetaRole) -> String {
    map.resolve_role(role)
        .map_or(role.default_wire_name(), |spec| spec.name())
        .to_string()
}

fn missing_id<D>(map: &MetaFieldMap<D>) -> ClientError {
    ClientError::MissingDocumentId {
        field: role_field(map, MetaRole::DocumentId),
    }
}

/// Resolves the id and etag a conditional write needs.
fn conditional_target<D>(map: &MetaFieldMap<D>, doc: &D) -> ClientResult<(String, String)> {
    let id = map
        .value(doc, MetaRole::DocumentId)
        .ok_or_else(|| missing_id(map))?;
    let etag = map
        .value(doc, MetaRole::ETag)
        .ok_or_else(|| ClientError::MissingETag {
            field: role_field(map, MetaRole::ETag),
        })?;
    Ok((id, etag))
}
