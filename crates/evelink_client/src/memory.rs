//! In-process transport that behaves like an Eve service.
//!
//! Documents live in per-resource vectors. The store honours `If-None-Match`,
//! `If-Match`, `where` filters with `$and` / `$or` / `$ne` / `$gt` / `$gte` /
//! `$lt` / `$lte`, `show_deleted`, and soft delete. Every write advances a
//! logical clock by one second, so timestamps are deterministic.
//!
//! Like Eve, write responses carry only the meta fields of the written
//! document plus `_status` and `_links`; GET returns the full document.

use crate::error::ClientResult;
use crate::transport::{
    decode_segment, Method, Request, Response, StatusCode, Transport, APPLICATION_JSON,
    CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use evelink_query::{rfc1123, MetaRole, SHOW_DELETED_PARAM, WHERE_PARAM};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;
use uuid::Uuid;

type Object = Map<String, Value>;

const ITEMS: &str = "_items";
const ID: &str = "_id";
const ETAG: &str = "_etag";
const UPDATED: &str = "_updated";
const CREATED: &str = "_created";
const DELETED: &str = "_deleted";
const STATUS: &str = "_status";

/// 2024-01-01T00:00:00Z.
const EPOCH_SECONDS: i64 = 1_704_067_200;

#[derive(Debug)]
struct Store {
    resources: HashMap<String, Vec<Object>>,
    clock: DateTime<Utc>,
}

impl Store {
    fn tick(&mut self) -> String {
        self.clock += Duration::seconds(1);
        rfc1123::format(&self.clock)
    }
}

/// An in-memory Eve-compatible store.
///
/// Records every request it receives; see [`MemoryTransport::requests`].
#[derive(Debug)]
pub struct MemoryTransport {
    store: Mutex<Store>,
    requests: Mutex<Vec<Request>>,
}

impl MemoryTransport {
    /// Creates an empty store whose clock starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        let start = Utc
            .timestamp_opt(EPOCH_SECONDS, 0)
            .single()
            .unwrap_or_default();
        Self::starting_at(start)
    }

    /// Creates an empty store whose clock starts at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            store: Mutex::new(Store {
                resources: HashMap::new(),
                clock: start,
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Current value of the logical clock: the timestamp of the latest write.
    pub fn now(&self) -> DateTime<Utc> {
        self.store.lock().clock
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forgets the recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Returns a stored document, soft-deleted or not.
    pub fn document(&self, resource: &str, id: &str) -> Option<Value> {
        let store = self.store.lock();
        store
            .resources
            .get(resource)?
            .iter()
            .find(|doc| doc_id(doc) == Some(id))
            .map(|doc| Value::Object(doc.clone()))
    }

    /// Number of stored documents in a resource, soft-deleted ones included.
    pub fn len(&self, resource: &str) -> usize {
        self.store
            .lock()
            .resources
            .get(resource)
            .map_or(0, Vec::len)
    }

    /// Returns true if the resource holds no documents.
    pub fn is_empty(&self, resource: &str) -> bool {
        self.len(resource) == 0
    }

    fn handle(&self, request: &Request) -> Response {
        let segments: Vec<String> = request
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| decode_segment(s).into_owned())
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut store = self.store.lock();
        match (request.method, segments.as_slice()) {
            (Method::Get, [resource]) => list(&store, resource, request),
            (Method::Get, [resource, id]) => get(&store, resource, id, request),
            (Method::Post, [resource]) => insert(&mut store, resource, request),
            (Method::Put, [resource, id]) => replace(&mut store, resource, id, request),
            (Method::Delete, [resource, id]) => soft_delete(&mut store, resource, id, request),
            (Method::Delete, [resource]) => {
                store.resources.remove(*resource);
                Response::new(StatusCode::NO_CONTENT)
            }
            (_, [_] | [_, _]) => error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
            _ => error(StatusCode::NOT_FOUND, "not found"),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: Request) -> ClientResult<Response> {
        let response = self.handle(&request);
        trace!(method = %request.method, target = %request.target(), status = %response.status, "memory transport");
        self.requests.lock().push(request);
        Ok(response)
    }
}

fn list(store: &Store, resource: &str, request: &Request) -> Response {
    let filter = match request.query_param(WHERE_PARAM).flatten() {
        Some(text) => match serde_json::from_str::<Value>(&quote_bare_keys(text)) {
            Ok(filter) if filter.is_object() => Some(filter),
            _ => return error(StatusCode::BAD_REQUEST, "invalid where clause"),
        },
        None => None,
    };
    let show_deleted = request.query_param(SHOW_DELETED_PARAM).is_some();

    let items: Vec<Value> = store
        .resources
        .get(resource)
        .into_iter()
        .flatten()
        .filter(|doc| show_deleted || !is_deleted(doc))
        .filter(|doc| filter.as_ref().map_or(true, |f| matches(doc, f)))
        .map(|doc| Value::Object(doc.clone()))
        .collect();

    json_response(StatusCode::OK, &json!({ ITEMS: items }))
}

fn get(store: &Store, resource: &str, id: &str, request: &Request) -> Response {
    let show_deleted = request.query_param(SHOW_DELETED_PARAM).is_some();
    let Some(doc) = find(store, resource, id).filter(|doc| show_deleted || !is_deleted(doc)) else {
        return error(StatusCode::NOT_FOUND, "not found");
    };
    let etag = doc_etag(doc).unwrap_or_default().to_string();

    if request.header(IF_NONE_MATCH) == Some(etag.as_str()) {
        return Response::new(StatusCode::NOT_MODIFIED).with_header("ETag", etag);
    }
    json_response(StatusCode::OK, &Value::Object(doc.clone())).with_header("ETag", etag)
}

fn insert(store: &mut Store, resource: &str, request: &Request) -> Response {
    let body = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match body {
        Value::Object(fields) => {
            let doc = create(store, resource, fields);
            json_response(StatusCode::CREATED, &write_reply(resource, &doc))
        }
        Value::Array(values) => {
            if values.iter().any(|v| !v.is_object()) {
                return error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "every item of a batch must be an object",
                );
            }
            let items: Vec<Value> = values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(fields) => {
                        Some(write_reply(resource, &create(store, resource, fields)))
                    }
                    _ => None,
                })
                .collect();
            json_response(StatusCode::CREATED, &json!({ STATUS: "OK", ITEMS: items }))
        }
        _ => error(StatusCode::BAD_REQUEST, "body must be an object or an array"),
    }
}

fn create(store: &mut Store, resource: &str, fields: Object) -> Object {
    let now = store.tick();
    let mut doc = strip_meta(fields);
    doc.insert(ID.into(), Value::String(Uuid::new_v4().simple().to_string()));
    doc.insert(CREATED.into(), Value::String(now.clone()));
    doc.insert(UPDATED.into(), Value::String(now));
    doc.insert(DELETED.into(), Value::Bool(false));
    stamp(&mut doc);

    store
        .resources
        .entry(resource.to_string())
        .or_default()
        .push(doc.clone());
    doc
}

fn replace(store: &mut Store, resource: &str, id: &str, request: &Request) -> Response {
    if let Err(response) = check_precondition(store, resource, id, request) {
        return response;
    }
    let fields = match parse_body(request) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return error(StatusCode::BAD_REQUEST, "body must be an object"),
        Err(response) => return response,
    };

    let now = store.tick();
    let Some(doc) = find_mut(store, resource, id) else {
        return error(StatusCode::NOT_FOUND, "not found");
    };
    let mut replacement = strip_meta(fields);
    for key in [ID, CREATED] {
        if let Some(value) = doc.get(key) {
            replacement.insert(key.into(), value.clone());
        }
    }
    replacement.insert(UPDATED.into(), Value::String(now));
    replacement.insert(DELETED.into(), Value::Bool(false));
    stamp(&mut replacement);
    *doc = replacement;

    json_response(StatusCode::OK, &write_reply(resource, doc))
}

fn soft_delete(store: &mut Store, resource: &str, id: &str, request: &Request) -> Response {
    if let Err(response) = check_precondition(store, resource, id, request) {
        return response;
    }
    let now = store.tick();
    if let Some(doc) = find_mut(store, resource, id) {
        doc.insert(DELETED.into(), Value::Bool(true));
        doc.insert(UPDATED.into(), Value::String(now));
        stamp(doc);
    }
    Response::new(StatusCode::NO_CONTENT)
}

/// Checks that a live document exists and that `If-Match` names its etag.
fn check_precondition(
    store: &Store,
    resource: &str,
    id: &str,
    request: &Request,
) -> Result<(), Response> {
    let Some(doc) = find(store, resource, id).filter(|doc| !is_deleted(doc)) else {
        return Err(error(StatusCode::NOT_FOUND, "not found"));
    };
    match request.header(IF_MATCH) {
        None => Err(error(
            StatusCode::PRECONDITION_REQUIRED,
            "To edit a document its etag must be provided using the If-Match header",
        )),
        Some(etag) if Some(etag) != doc_etag(doc) => Err(error(
            StatusCode::PRECONDITION_FAILED,
            "Client and server etags don't match",
        )),
        Some(_) => Ok(()),
    }
}

fn parse_body(request: &Request) -> Result<Value, Response> {
    let body = request.body.as_deref().unwrap_or_default();
    serde_json::from_str(body).map_err(|e| error(StatusCode::BAD_REQUEST, &e.to_string()))
}

fn find<'a>(store: &'a Store, resource: &str, id: &str) -> Option<&'a Object> {
    store
        .resources
        .get(resource)?
        .iter()
        .find(|doc| doc_id(doc) == Some(id))
}

fn find_mut<'a>(store: &'a mut Store, resource: &str, id: &str) -> Option<&'a mut Object> {
    store
        .resources
        .get_mut(resource)?
        .iter_mut()
        .find(|doc| doc_id(doc) == Some(id))
}

fn doc_id(doc: &Object) -> Option<&str> {
    doc.get(ID).and_then(Value::as_str)
}

fn doc_etag(doc: &Object) -> Option<&str> {
    doc.get(ETAG).and_then(Value::as_str)
}

fn is_deleted(doc: &Object) -> bool {
    doc.get(DELETED).and_then(Value::as_bool).unwrap_or(false)
}

/// Removes every client-supplied meta field.
fn strip_meta(mut fields: Object) -> Object {
    for role in MetaRole::ALL {
        fields.remove(role.default_wire_name());
    }
    fields
}

/// Recomputes the etag: SHA-256 over the document without its etag.
fn stamp(doc: &mut Object) {
    doc.remove(ETAG);
    let digest = Sha256::digest(Value::Object(doc.clone()).to_string().as_bytes());
    let etag: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    doc.insert(ETAG.into(), Value::String(etag));
}

/// The reply to a successful write: meta fields, status and self link.
fn write_reply(resource: &str, doc: &Object) -> Value {
    let mut reply = Object::new();
    for key in [ID, UPDATED, CREATED, ETAG] {
        if let Some(value) = doc.get(key) {
            reply.insert(key.into(), value.clone());
        }
    }
    reply.insert(STATUS.into(), Value::String("OK".into()));
    let href = format!("{resource}/{}", doc_id(doc).unwrap_or_default());
    reply.insert(
        "_links".into(),
        json!({ "self": { "title": resource, "href": href } }),
    );
    Value::Object(reply)
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::new(status)
        .with_header(CONTENT_TYPE, APPLICATION_JSON)
        .with_body(body.to_string())
}

fn error(status: StatusCode, message: &str) -> Response {
    json_response(
        status,
        &json!({
            STATUS: "ERR",
            "_error": { "code": status.as_u16(), "message": message },
        }),
    )
}

/// Evaluates a filter object against a document.
fn matches(doc: &Object, filter: &Value) -> bool {
    let Some(clauses) = filter.as_object() else {
        return false;
    };
    clauses.iter().all(|(key, condition)| match key.as_str() {
        "$and" => condition
            .as_array()
            .map_or(false, |parts| parts.iter().all(|f| matches(doc, f))),
        "$or" => condition
            .as_array()
            .map_or(false, |parts| parts.iter().any(|f| matches(doc, f))),
        field => field_matches(doc.get(field), condition),
    })
}

fn field_matches(value: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, operand)| match op.as_str() {
                "$eq" => values_equal(value, operand),
                "$ne" => !values_equal(value, operand),
                "$gt" => compare(value, operand) == Some(Ordering::Greater),
                "$gte" => matches!(
                    compare(value, operand),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                "$lt" => compare(value, operand) == Some(Ordering::Less),
                "$lte" => matches!(
                    compare(value, operand),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                _ => false,
            })
        }
        _ => values_equal(value, condition),
    }
}

/// Missing fields equal null; numbers compare by value.
fn values_equal(value: Option<&Value>, expected: &Value) -> bool {
    match (value, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
        (None, _) => false,
    }
}

/// Orders numbers by value, RFC 1123 dates chronologically and other
/// strings lexically.
fn compare(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (value?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (rfc1123::parse(a), rfc1123::parse(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        _ => None,
    }
}

/// Quotes unquoted `$operator` keys so `{$or: [...]}` parses as JSON.
fn quote_bare_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant = None;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '$' && matches!(last_significant, Some('{') | Some(',')) {
            out.push('"');
            out.push(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    out.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push('"');
            last_significant = Some('"');
            continue;
        }

        if c == '"' {
            in_string = true;
        }
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
        out.push(c);
    }
    out
}
