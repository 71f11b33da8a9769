//! Property tests for filter compilation.

use evelink_query::{
    compile, Descriptor, Document, MetaFieldRegistry, MetaRole, NameResolver, Predicate, Query,
    QueryContext,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Serialize, Deserialize)]
#[allow(non_snake_case)]
struct Listing {
    id: Option<String>,
    Title: String,
    City: String,
    zip_code: String,
    active: bool,
}

impl Document for Listing {
    fn describe() -> Descriptor<Self> {
        Descriptor::new()
            .meta("id", MetaRole::DocumentId, |l: &Self| l.id.clone())
            .rename("_id")
            .field("Title")
            .field("City")
            .field("zip_code")
            .rename("zip")
            .field("active")
    }
}

const FIELDS: [&str; 4] = ["Title", "City", "zip_code", "active"];
const WIRE_NAMES: [&str; 4] = ["title", "city", "zip", "active"];

fn comparison() -> impl Strategy<Value = Predicate> {
    (
        prop::sample::select(FIELDS.to_vec()),
        any::<bool>(),
        prop_oneof![
            "[a-z \"\\\\]{0,6}".prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
    )
        .prop_map(|(field, equal, value)| match value {
            Value::String(s) if equal => Predicate::eq(field, s),
            Value::String(s) => Predicate::ne(field, s),
            Value::Bool(b) if equal => Predicate::eq(field, b),
            Value::Bool(b) => Predicate::ne(field, b),
            other if equal => Predicate::eq(field, other.as_i64().unwrap_or_default()),
            other => Predicate::ne(field, other.as_i64().unwrap_or_default()),
        })
}

fn predicate() -> impl Strategy<Value = Predicate> {
    comparison().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
            (inner.clone(), inner).prop_map(|(l, r)| l.or(r)),
        ]
    })
}

fn collect_keys(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                keys.push(key.clone());
                collect_keys(inner, keys);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_keys(item, keys)),
        _ => {}
    }
}

proptest! {
    #[test]
    fn wrapped_fragments_are_json_objects(predicate in predicate()) {
        let registry = MetaFieldRegistry::new();
        let fragment = compile::<Listing>(&registry, &NameResolver::default(), &predicate).unwrap();

        let object = format!("{{{}}}", fragment.replace("$or:", "\"$or\":"));
        let parsed: Value = serde_json::from_str(&object).unwrap();
        prop_assert!(parsed.is_object());

        let mut keys = Vec::new();
        collect_keys(&parsed, &mut keys);
        for key in keys {
            prop_assert!(
                key.starts_with('$') || WIRE_NAMES.contains(&key.as_str()),
                "unexpected key {}", key
            );
        }
    }

    #[test]
    fn compilation_is_deterministic(predicate in predicate()) {
        let resolver = NameResolver::default();
        let first = compile::<Listing>(&MetaFieldRegistry::new(), &resolver, &predicate).unwrap();
        let second = compile::<Listing>(MetaFieldRegistry::global(), &resolver, &predicate).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn negation_anywhere_is_rejected(predicate in predicate()) {
        let registry = MetaFieldRegistry::new();
        let resolver = NameResolver::default();
        let negated = predicate.clone().and(Predicate::eq("City", "x").not());
        prop_assert!(compile::<Listing>(&registry, &resolver, &negated).is_err());
        let negated = predicate.not().or(Predicate::eq("City", "x"));
        prop_assert!(compile::<Listing>(&registry, &resolver, &negated).is_err());
    }

    #[test]
    fn queries_compose_into_one_object(predicate in predicate(), raw in any::<bool>()) {
        let registry = MetaFieldRegistry::new();
        let resolver = NameResolver::default();
        let ctx = QueryContext {
            registry: &registry,
            resolver: &resolver,
            last_updated_field: "_updated",
        };
        let mut query = Query::<Listing>::new().filter(predicate);
        if raw {
            query = query.raw(r#"{"active": true}"#);
        }

        let compiled = query.compile(&ctx).unwrap();
        let filter = compiled.filter().unwrap().replace("$or:", "\"$or\":");
        let parsed: Value = serde_json::from_str(&filter).unwrap();
        prop_assert_eq!(parsed.get("$and").is_some(), raw);
        prop_assert!(!compiled.show_deleted());
    }
}
