//! Meta-field descriptors and the per-type registry.
//!
//! A document type declares its fields once through a [`Descriptor`]. Some of
//! those fields play a protocol role (document id, etag, timestamps, soft
//! delete flag). The [`MetaFieldRegistry`] validates the descriptor on first
//! use and caches the resulting [`MetaFieldMap`] for the lifetime of the
//! process.

use crate::error::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Protocol-reserved roles a field can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaRole {
    /// Document identifier (`_id`).
    DocumentId,
    /// Entity tag of the document's current version (`_etag`).
    ETag,
    /// Last modification time (`_updated`).
    LastUpdated,
    /// Creation time (`_created`).
    DateCreated,
    /// Soft-delete flag (`_deleted`).
    Deleted,
}

impl MetaRole {
    /// All roles, in declaration order.
    pub const ALL: [MetaRole; 5] = [
        MetaRole::DocumentId,
        MetaRole::ETag,
        MetaRole::LastUpdated,
        MetaRole::DateCreated,
        MetaRole::Deleted,
    ];

    /// The field name the service uses for this role unless configured otherwise.
    pub fn default_wire_name(&self) -> &'static str {
        match self {
            MetaRole::DocumentId => "_id",
            MetaRole::ETag => "_etag",
            MetaRole::LastUpdated => "_updated",
            MetaRole::DateCreated => "_created",
            MetaRole::Deleted => "_deleted",
        }
    }
}

/// Reads the textual value of a meta field from a document.
pub type Accessor<T> = fn(&T) -> Option<String>;

/// One declared field of a document type.
pub struct FieldSpec<T> {
    name: &'static str,
    rename: Option<&'static str>,
    role: Option<MetaRole>,
    accessor: Option<Accessor<T>>,
}

impl<T> FieldSpec<T> {
    /// The field's declared name, as it appears in the type's serde output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The explicit wire-name override, if any.
    pub fn rename(&self) -> Option<&'static str> {
        self.rename
    }

    /// The protocol role of the field, if any.
    pub fn role(&self) -> Option<MetaRole> {
        self.role
    }

    /// Returns true if the field is a protocol meta field.
    pub fn is_meta(&self) -> bool {
        self.role.is_some()
    }
}

impl<T> Clone for FieldSpec<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            rename: self.rename,
            role: self.role,
            accessor: self.accessor,
        }
    }
}

impl<T> fmt::Debug for FieldSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("rename", &self.rename)
            .field("role", &self.role)
            .finish()
    }
}

/// Declared field table of a document type.
///
/// # Example
///
/// ```
/// use evelink_query::{Descriptor, Document, MetaRole};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Default)]
/// struct Company {
///     #[serde(default)]
///     unique_id: Option<String>,
///     #[serde(default)]
///     etag: Option<String>,
///     name: String,
/// }
///
/// impl Document for Company {
///     fn describe() -> Descriptor<Self> {
///         Descriptor::new()
///             .meta("unique_id", MetaRole::DocumentId, |c: &Self| c.unique_id.clone())
///             .rename("_id")
///             .meta("etag", MetaRole::ETag, |c: &Self| c.etag.clone())
///             .rename("_etag")
///             .field("name")
///     }
/// }
/// ```
pub struct Descriptor<T> {
    fields: Vec<FieldSpec<T>>,
}

impl<T> Descriptor<T> {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declares an ordinary field.
    pub fn field(mut self, name: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            rename: None,
            role: None,
            accessor: None,
        });
        self
    }

    /// Declares a field playing a protocol role.
    pub fn meta(mut self, name: &'static str, role: MetaRole, accessor: Accessor<T>) -> Self {
        self.fields.push(FieldSpec {
            name,
            rename: None,
            role: Some(role),
            accessor: Some(accessor),
        });
        self
    }

    /// Overrides the wire name of the most recently declared field.
    pub fn rename(mut self, wire: &'static str) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.rename = Some(wire);
        }
        self
    }
}

impl<T> Default for Descriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type that can be stored as a document on the remote service.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the type's declared field table.
    ///
    /// Called by the registry on first use; the result is cached. It may
    /// look up other types in the same registry.
    fn describe() -> Descriptor<Self>;
}

/// Validated, indexed field table of one document type.
pub struct MetaFieldMap<T> {
    type_name: &'static str,
    fields: Vec<FieldSpec<T>>,
    by_name: HashMap<&'static str, usize>,
    by_role: HashMap<MetaRole, usize>,
}

impl<T> MetaFieldMap<T> {
    /// Builds and validates a map from a descriptor.
    pub fn build(type_name: &'static str, descriptor: Descriptor<T>) -> QueryResult<Self> {
        let fields = descriptor.fields;
        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_role = HashMap::new();

        for (idx, spec) in fields.iter().enumerate() {
            if by_name.insert(spec.name, idx).is_some() {
                return Err(QueryError::DuplicateField {
                    type_name,
                    field: spec.name,
                });
            }
            if let Some(role) = spec.role {
                if let Some(&first) = by_role.get(&role) {
                    let first: &FieldSpec<T> = &fields[first];
                    return Err(QueryError::DuplicateRole {
                        type_name,
                        role,
                        first: first.name,
                        second: spec.name,
                    });
                }
                by_role.insert(role, idx);
            }
        }

        Ok(Self {
            type_name,
            fields,
            by_name,
            by_role,
        })
    }

    /// Name of the document type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// All declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldSpec<T>] {
        &self.fields
    }

    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec<T>> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    /// Returns the field holding a role, if the type declares one.
    pub fn resolve_role(&self, role: MetaRole) -> Option<&FieldSpec<T>> {
        self.by_role.get(&role).map(|&idx| &self.fields[idx])
    }

    /// Reads the value of a meta field from a document.
    ///
    /// Returns `None` when the type has no field for the role, or the field
    /// is unset or empty.
    pub fn value(&self, doc: &T, role: MetaRole) -> Option<String> {
        let accessor = self.resolve_role(role)?.accessor?;
        accessor(doc).filter(|v| !v.is_empty())
    }
}

impl<T> fmt::Debug for MetaFieldMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaFieldMap")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

static GLOBAL: Lazy<MetaFieldRegistry> = Lazy::new(MetaFieldRegistry::new);

/// Process-wide cache of [`MetaFieldMap`]s, keyed by type.
///
/// Lookups after the first one per type only take the read lock.
#[derive(Default)]
pub struct MetaFieldRegistry {
    maps: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MetaFieldRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static MetaFieldRegistry {
        &GLOBAL
    }

    /// Returns the meta-field map of `T`, building it on first use.
    pub fn map<T: Document>(&self) -> QueryResult<Arc<MetaFieldMap<T>>> {
        let key = TypeId::of::<T>();

        if let Some(map) = self.maps.read().get(&key).and_then(downcast::<T>) {
            return Ok(map);
        }

        // Built without the lock held: `describe` may look up other types.
        let built = Arc::new(MetaFieldMap::build(
            std::any::type_name::<T>(),
            T::describe(),
        )?);

        let mut maps = self.maps.write();
        if let Some(map) = maps.get(&key).and_then(downcast::<T>) {
            return Ok(map);
        }
        maps.insert(key, built.clone() as Arc<dyn Any + Send + Sync>);
        Ok(built)
    }

    /// Number of types registered so far.
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    /// Returns true if no type has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }
}

impl fmt::Debug for MetaFieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaFieldRegistry")
            .field("types", &self.len())
            .finish()
    }
}

// Entries are keyed by TypeId, so the stored map always has type T.
fn downcast<T: 'static>(entry: &Arc<dyn Any + Send + Sync>) -> Option<Arc<MetaFieldMap<T>>> {
    Arc::clone(entry).downcast::<MetaFieldMap<T>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::thread;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Company {
        unique_id: Option<String>,
        etag: Option<String>,
        name: String,
    }

    impl Document for Company {
        fn describe() -> Descriptor<Self> {
            Descriptor::new()
                .meta("unique_id", MetaRole::DocumentId, |c: &Self| c.unique_id.clone())
                .rename("_id")
                .meta("etag", MetaRole::ETag, |c: &Self| c.etag.clone())
                .rename("_etag")
                .field("name")
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct TwoIds {
        a: String,
        b: String,
    }

    impl Document for TwoIds {
        fn describe() -> Descriptor<Self> {
            Descriptor::new()
                .meta("a", MetaRole::DocumentId, |d: &Self| Some(d.a.clone()))
                .meta("b", MetaRole::DocumentId, |d: &Self| Some(d.b.clone()))
        }
    }

    #[test]
    fn resolves_roles() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();

        assert_eq!(map.resolve_role(MetaRole::DocumentId).unwrap().name(), "unique_id");
        assert_eq!(map.resolve_role(MetaRole::ETag).unwrap().rename(), Some("_etag"));
        assert!(map.resolve_role(MetaRole::LastUpdated).is_none());
        assert!(!map.field("name").unwrap().is_meta());
    }

    #[test]
    fn reads_meta_values() {
        let registry = MetaFieldRegistry::new();
        let map = registry.map::<Company>().unwrap();

        let company = Company {
            unique_id: Some("abc".into()),
            etag: Some(String::new()),
            name: "Acme".into(),
        };
        assert_eq!(map.value(&company, MetaRole::DocumentId).as_deref(), Some("abc"));
        // Empty values count as absent.
        assert_eq!(map.value(&company, MetaRole::ETag), None);
        assert_eq!(map.value(&company, MetaRole::Deleted), None);
    }

    #[test]
    fn rejects_duplicate_role() {
        let registry = MetaFieldRegistry::new();
        let err = registry.map::<TwoIds>().unwrap_err();
        assert!(matches!(
            err,
            QueryError::DuplicateRole {
                role: MetaRole::DocumentId,
                first: "a",
                second: "b",
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_duplicate_field() {
        let descriptor: Descriptor<Company> = Descriptor::new().field("name").field("name");
        let err = MetaFieldMap::build("Company", descriptor).unwrap_err();
        assert!(matches!(err, QueryError::DuplicateField { field: "name", .. }));
    }

    #[test]
    fn caches_per_type() {
        let registry = MetaFieldRegistry::new();
        let first = registry.map::<Company>().unwrap();
        let second = registry.map::<Company>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_first_use_shares_one_map() {
        let registry = Arc::new(MetaFieldRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.map::<Company>().unwrap())
            })
            .collect();

        let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for map in &maps[1..] {
            assert!(Arc::ptr_eq(&maps[0], map));
        }
        assert_eq!(registry.len(), 1);
    }

    #[derive(Serialize, Deserialize)]
    struct Branch {
        name: String,
    }

    impl Document for Branch {
        fn describe() -> Descriptor<Self> {
            // The nested lookup takes the registry lock while this one is pending.
            let company = MetaFieldRegistry::global().map::<Company>();
            assert!(company.is_ok());
            Descriptor::new().field("name")
        }
    }

    #[test]
    fn describe_can_look_up_other_types() {
        let branch = MetaFieldRegistry::global().map::<Branch>().unwrap();
        assert!(branch.field("name").is_some());
        assert!(MetaFieldRegistry::global().map::<Company>().is_ok());
    }

    #[test]
    fn default_wire_names() {
        assert_eq!(MetaRole::DocumentId.default_wire_name(), "_id");
        assert_eq!(MetaRole::Deleted.default_wire_name(), "_deleted");
        assert_eq!(MetaRole::ALL.len(), 5);
    }
}
