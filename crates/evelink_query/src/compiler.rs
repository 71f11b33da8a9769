//! Compiles [`Predicate`] trees into the filter-query dialect.
//!
//! Output contract:
//!
//! - `field == v` becomes `"field": v`
//! - `field != v` becomes `"field": {"$ne": v}`
//! - `a && b` becomes `a, b`, a comma-joined fragment without braces; the
//!   composing layer wraps the whole expression in exactly one object
//! - `a || b` becomes `$or: [{a}, {b}]`; chained alternatives nest rather
//!   than flatten

use crate::error::{QueryError, QueryResult};
use crate::meta::{Document, MetaFieldMap, MetaFieldRegistry};
use crate::naming::NameResolver;
use crate::predicate::{Operand, Operator, Predicate};

/// Compiles predicates against the field table of one document type.
pub struct PredicateCompiler<'a, T> {
    map: &'a MetaFieldMap<T>,
    resolver: &'a NameResolver,
}

impl<'a, T> PredicateCompiler<'a, T> {
    /// Creates a compiler for a type's field table.
    pub fn new(map: &'a MetaFieldMap<T>, resolver: &'a NameResolver) -> Self {
        Self { map, resolver }
    }

    /// Compiles a predicate into a filter fragment.
    pub fn compile(&self, predicate: &Predicate) -> QueryResult<String> {
        match predicate {
            Predicate::Comparison { left, op, right } => {
                self.comparison(predicate, left, *op, right)
            }
            Predicate::And(l, r) => Ok(format!("{}, {}", self.compile(l)?, self.compile(r)?)),
            Predicate::Or(l, r) => Ok(format!(
                "$or: [{{{}}}, {{{}}}]",
                self.compile(l)?,
                self.compile(r)?
            )),
            Predicate::Not(_) => Err(QueryError::UnsupportedShape {
                subtree: predicate.to_string(),
            }),
        }
    }

    fn comparison(
        &self,
        node: &Predicate,
        left: &Operand,
        op: Operator,
        right: &Operand,
    ) -> QueryResult<String> {
        let (Operand::Field(field), Operand::Literal(literal)) = (left, right) else {
            return Err(QueryError::UnsupportedShape {
                subtree: node.to_string(),
            });
        };

        let spec = self
            .map
            .field(field)
            .ok_or_else(|| QueryError::UnknownField {
                type_name: self.map.type_name(),
                field: field.clone(),
            })?;
        let wire = self.resolver.resolve(spec.name(), spec.rename());
        let value = literal.render();

        match op {
            Operator::Eq => Ok(format!("\"{wire}\": {value}")),
            Operator::Ne => Ok(format!("\"{wire}\": {{\"$ne\": {value}}}")),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                Err(QueryError::UnsupportedOperator {
                    operator: op.symbol().to_string(),
                    subtree: node.to_string(),
                })
            }
        }
    }
}

/// Compiles a predicate for `T`, looking its field table up in `registry`.
pub fn compile<T: Document>(
    registry: &MetaFieldRegistry,
    resolver: &NameResolver,
    predicate: &Predicate,
) -> QueryResult<String> {
    let map = registry.map::<T>()?;
    PredicateCompiler::new(&map, resolver).compile(predicate)
}
