//! Document encoding policy.
//!
//! Request bodies never carry meta fields or null values, and every declared
//! field is written under its wire name. Keys the descriptor does not declare
//! pass through unchanged. Response bodies are mapped back from wire names to
//! declared names before deserialization.
//!
//! Write responses only carry meta fields, so a written document is rebuilt
//! from the body that was sent with the response's fields laid over it.

use crate::error::{ClientError, ClientResult};
use evelink_query::{MetaFieldMap, NameResolver};
use serde_json::{Map, Value};

/// Key under which the service wraps collections.
pub const ITEMS_KEY: &str = "_items";

/// Keys of a write response that describe the response, not the document.
const ENVELOPE_KEYS: [&str; 3] = ["_status", "_links", "_issues"];

/// Applies the exclusion and renaming policy of one document type.
#[derive(Debug)]
pub struct DocumentCodec<'a, T> {
    map: &'a MetaFieldMap<T>,
    resolver: &'a NameResolver,
}

impl<'a, T: serde::Serialize + serde::de::DeserializeOwned> DocumentCodec<'a, T> {
    /// Creates a codec for a type's field table.
    pub fn new(map: &'a MetaFieldMap<T>, resolver: &'a NameResolver) -> Self {
        Self { map, resolver }
    }

    /// Encodes a document into a request body object.
    pub fn encode_value(&self, doc: &T) -> ClientResult<Map<String, Value>> {
        let Value::Object(object) = serde_json::to_value(doc)? else {
            return Err(ClientError::Codec(format!(
                "{} does not serialize to a JSON object",
                self.map.type_name()
            )));
        };

        let mut out = Map::with_capacity(object.len());
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            let wire = match self.map.field(&key) {
                Some(spec) if spec.is_meta() => continue,
                Some(spec) => self.resolver.resolve(spec.name(), spec.rename()).into_owned(),
                None => key,
            };
            out.insert(wire, value);
        }
        Ok(out)
    }

    /// Encodes a document into a JSON body.
    pub fn encode(&self, doc: &T) -> ClientResult<String> {
        Ok(Value::Object(self.encode_value(doc)?).to_string())
    }

    /// Encodes several documents into a JSON array body.
    pub fn encode_many(&self, docs: &[T]) -> ClientResult<String> {
        let items = docs
            .iter()
            .map(|doc| self.encode_value(doc).map(Value::Object))
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Value::Array(items).to_string())
    }

    /// Decodes a document from a response body.
    pub fn decode(&self, body: &str) -> ClientResult<T> {
        self.decode_value(serde_json::from_str(body)?)
    }

    /// Decodes the `_items` list of a collection response.
    pub fn decode_items(&self, body: &str) -> ClientResult<Vec<T>> {
        take_items(body)?
            .into_iter()
            .map(|item| self.decode_value(item))
            .collect()
    }

    /// Rebuilds a written document from the body that was sent and the
    /// service's reply to it.
    pub fn decode_written(&self, sent: Map<String, Value>, body: &str) -> ClientResult<T> {
        self.overlay(sent, serde_json::from_str(body)?)
    }

    /// Rebuilds the documents of a batch write, pairing each sent body with
    /// the reply item at the same position.
    pub fn decode_written_items(
        &self,
        sent: Vec<Map<String, Value>>,
        body: &str,
    ) -> ClientResult<Vec<T>> {
        let items = take_items(body)?;
        if items.len() != sent.len() {
            return Err(ClientError::Codec(format!(
                "sent {} documents but {ITEMS_KEY} holds {}",
                sent.len(),
                items.len()
            )));
        }
        sent.into_iter()
            .zip(items)
            .map(|(sent, reply)| self.overlay(sent, reply))
            .collect()
    }

    fn overlay(&self, mut sent: Map<String, Value>, reply: Value) -> ClientResult<T> {
        let Value::Object(reply) = reply else {
            return Err(ClientError::Codec(format!(
                "expected a JSON object for {}",
                self.map.type_name()
            )));
        };
        for (key, value) in reply {
            if !ENVELOPE_KEYS.contains(&key.as_str()) {
                sent.insert(key, value);
            }
        }
        self.decode_value(Value::Object(sent))
    }

    /// Decodes a document from a parsed JSON value.
    pub fn decode_value(&self, value: Value) -> ClientResult<T> {
        let Value::Object(mut object) = value else {
            return Err(ClientError::Codec(format!(
                "expected a JSON object for {}",
                self.map.type_name()
            )));
        };

        for spec in self.map.fields() {
            let wire = self.resolver.resolve(spec.name(), spec.rename());
            if wire != spec.name() {
                if let Some(value) = object.remove(wire.as_ref()) {
                    object.insert(spec.name().to_string(), value);
                }
            }
        }
        Ok(serde_json::from_value(Value::Object(object))?)
    }
}

fn take_items(body: &str) -> ClientResult<Vec<Value>> {
    let mut value: Value = serde_json::from_str(body)?;
    match value.get_mut(ITEMS_KEY).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ClientError::Codec(format!("{ITEMS_KEY} is not an array"))),
        None => Err(ClientError::Codec(format!("response has no {ITEMS_KEY}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawDocument;
    use evelink_query::{Descriptor, Document, MetaFieldRegistry, MetaRole, NamingPolicy};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[allow(non_snake_case)]
    struct Company {
        #[serde(default)]
        unique_id: Option<String>,
        #[serde(default)]
        etag: Option<String>,
        name: String,
        #[serde(default)]
        StateOrProvince: Option<String>,
        #[serde(default)]
        password: Option<String>,
    }

    impl Document for Company {
        fn describe() -> Descriptor<Self> {
            Descriptor::new()
                .meta("unique_id", MetaRole::DocumentId, |c: &Self| c.unique_id.clone())
                .rename("_id")
                .meta("etag", MetaRole::ETag, |c: &Self| c.etag.clone())
                .rename("_etag")
                .field("name")
                .field("StateOrProvince")
                .field("password")
                .rename("secret")
        }
    }

    fn acme() -> Company {
        Company {
            unique_id: Some("abc".into()),
            etag: Some("v1".into()),
            name: "Acme".into(),
            StateOrProvince: Some("tag".into()),
            password: None,
        }
    }

    #[test]
    fn encode_drops_meta_and_nulls() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let body = codec.encode_value(&acme()).unwrap();
        assert_eq!(
            Value::Object(body),
            json!({ "name": "Acme", "state_or_province": "tag" })
        );
    }

    #[test]
    fn encode_applies_policy_and_overrides() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::new(NamingPolicy::Lowercase);
        let codec = DocumentCodec::new(&map, &resolver);

        let company = Company {
            password: Some("pw".into()),
            ..acme()
        };
        let body: Value = serde_json::from_str(&codec.encode(&company).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({ "name": "Acme", "stateorprovince": "tag", "secret": "pw" })
        );
    }

    #[test]
    fn decode_maps_wire_names_back() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let body = json!({
            "_id": "abc",
            "_etag": "v2",
            "_created": "Mon, 01 Jan 2024 00:00:01 GMT",
            "name": "Acme",
            "state_or_province": "tag",
            "secret": "pw",
        });
        let company = codec.decode(&body.to_string()).unwrap();
        assert_eq!(company.unique_id.as_deref(), Some("abc"));
        assert_eq!(company.etag.as_deref(), Some("v2"));
        assert_eq!(company.StateOrProvince.as_deref(), Some("tag"));
        assert_eq!(company.password.as_deref(), Some("pw"));
    }

    #[test]
    fn decode_items() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let body = json!({ "_items": [{ "_id": "a", "name": "A" }, { "_id": "b", "name": "B" }] });
        let items = codec.decode_items(&body.to_string()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].unique_id.as_deref(), Some("b"));

        let empty = codec.decode_items(r#"{"_items": []}"#).unwrap();
        assert!(empty.is_empty());

        assert!(matches!(
            codec.decode_items(r#"{"name": "A"}"#),
            Err(ClientError::Codec(_))
        ));
        assert!(matches!(codec.decode("[1]"), Err(ClientError::Codec(_))));
        assert!(matches!(codec.decode("not json"), Err(ClientError::Json(_))));
    }

    #[test]
    fn encode_many() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let body: Value = serde_json::from_str(&codec.encode_many(&[acme(), acme()]).unwrap()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert!(body[0].get("_id").is_none());
    }

    #[test]
    fn undeclared_keys_pass_through() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<RawDocument>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let doc: RawDocument = serde_json::from_value(json!({
            "_id": "abc",
            "firstName": "Ada",
            "StateOrProvince": "tag",
        }))
        .unwrap();
        let body = codec.encode_value(&doc).unwrap();
        assert_eq!(
            Value::Object(body.clone()),
            json!({ "firstName": "Ada", "StateOrProvince": "tag" })
        );

        let decoded = codec.decode_value(Value::Object(body)).unwrap();
        assert_eq!(decoded.fields.get("firstName"), Some(&json!("Ada")));
    }

    #[test]
    fn written_document_takes_meta_from_reply() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let sent = codec.encode_value(&Company { password: Some("pw".into()), ..acme() }).unwrap();
        let reply = json!({
            "_id": "new",
            "_etag": "v1",
            "_updated": "Mon, 01 Jan 2024 00:00:01 GMT",
            "_created": "Mon, 01 Jan 2024 00:00:01 GMT",
            "_status": "OK",
            "_links": { "self": { "href": "companies/new" } },
        });
        let written = codec.decode_written(sent, &reply.to_string()).unwrap();
        assert_eq!(written.unique_id.as_deref(), Some("new"));
        assert_eq!(written.etag.as_deref(), Some("v1"));
        assert_eq!(written.name, "Acme");
        assert_eq!(written.StateOrProvince.as_deref(), Some("tag"));
        assert_eq!(written.password.as_deref(), Some("pw"));

        let raw_map = registry.map::<RawDocument>().unwrap();
        let raw_codec = DocumentCodec::new(&raw_map, &resolver);
        let sent = serde_json::from_value(json!({ "name": "Acme" })).unwrap();
        let written = raw_codec.decode_written(sent, &reply.to_string()).unwrap();
        assert_eq!(written.id.as_deref(), Some("new"));
        assert!(!written.fields.contains_key("_status"));
        assert!(!written.fields.contains_key("_links"));
    }

    #[test]
    fn written_batch_pairs_items_in_order() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();
        let resolver = NameResolver::default();
        let codec = DocumentCodec::new(&map, &resolver);

        let first = Company { name: "A".into(), ..Company::default() };
        let second = Company { name: "B".into(), ..Company::default() };
        let sent = vec![
            codec.encode_value(&first).unwrap(),
            codec.encode_value(&second).unwrap(),
        ];
        let reply = json!({
            "_status": "OK",
            "_items": [
                { "_id": "a", "_etag": "1", "_status": "OK" },
                { "_id": "b", "_etag": "2", "_status": "OK" },
            ],
        });
        let written = codec
            .decode_written_items(sent.clone(), &reply.to_string())
            .unwrap();
        assert_eq!(written[0].name, "A");
        assert_eq!(written[0].unique_id.as_deref(), Some("a"));
        assert_eq!(written[1].name, "B");
        assert_eq!(written[1].etag.as_deref(), Some("2"));

        let short = json!({ "_items": [{ "_id": "a" }] });
        assert!(matches!(
            codec.decode_written_items(sent, &short.to_string()),
            Err(ClientError::Codec(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn encoded_bodies_carry_no_meta_and_no_nulls(
            name in "[A-Za-z ]{0,12}",
            id in proptest::option::of("[a-f0-9]{8}"),
            etag in proptest::option::of("[a-f0-9]{8}"),
            state in proptest::option::of("[a-z]{1,4}"),
        ) {
            let registry = MetaFieldRegistry::new();
            let map = registry.map::<Company>().unwrap();
            let resolver = NameResolver::default();
            let codec = DocumentCodec::new(&map, &resolver);

            let company = Company {
                unique_id: id,
                etag,
                name,
                StateOrProvince: state.clone(),
                password: None,
            };
            let body = codec.encode_value(&company).unwrap();

            for key in ["_id", "_etag", "unique_id", "etag"] {
                proptest::prop_assert!(!body.contains_key(key));
            }
            proptest::prop_assert!(body.values().all(|v| !v.is_null()));
            proptest::prop_assert_eq!(body.contains_key("state_or_province"), state.is_some());
        }
    }
}
