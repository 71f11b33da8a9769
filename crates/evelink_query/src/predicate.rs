//! Predicate AST and its fluent builder.
//!
//! Predicates are plain data. They name fields by their declared name and are
//! checked against a type's field table only when compiled.

use std::fmt;

/// Comparison operators representable in a predicate.
///
/// Only [`Operator::Eq`] and [`Operator::Ne`] compile; the ordering operators
/// are rejected by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl Operator {
    /// The operator's symbol, used when rendering predicates.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A constant value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A string.
    String(String),
    /// A signed integer.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// JSON null.
    Null,
}

impl Literal {
    /// Renders the literal in the filter dialect.
    ///
    /// Strings are quoted and escaped; everything else uses its JSON form.
    pub fn render(&self) -> String {
        match self {
            Literal::String(s) => serde_json::Value::String(s.clone()).to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) if f.is_finite() => f.to_string(),
            Literal::Float(_) | Literal::Null => "null".to_string(),
            Literal::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Literal::String(value.clone())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Literal::Float(f64::from(value))
    }
}

macro_rules! integer_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Literal::Integer(i64::from(value))
                }
            }
        )*
    };
}

integer_literal!(i8, i16, i32, i64, u8, u16, u32);

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A declared field of the document type.
    Field(String),
    /// A constant.
    Literal(Literal),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => f.write_str(name),
            Operand::Literal(lit) => fmt::Display::fmt(lit, f),
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `left <op> right`.
    Comparison {
        /// Left operand; must be a field to compile.
        left: Operand,
        /// The comparison operator.
        op: Operator,
        /// Right operand; must be a literal to compile.
        right: Operand,
    },
    /// Both sides hold.
    And(Box<Predicate>, Box<Predicate>),
    /// Either side holds.
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation. Representable, but not part of the filter dialect.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `field <op> value`.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Literal>) -> Self {
        Predicate::Comparison {
            left: Operand::Field(field.into()),
            op,
            right: Operand::Literal(value.into()),
        }
    }

    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// `field != value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Ne, value)
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Gt, value)
    }

    /// `field >= value`.
    pub fn gte(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Gte, value)
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Lt, value)
    }

    /// `field <= value`.
    pub fn lte(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Operator::Lte, value)
    }

    /// `self && other`.
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `self || other`.
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// `!self`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Predicate::And(l, r) => write!(f, "({l} && {r})"),
            Predicate::Or(l, r) => write!(f, "({l} || {r})"),
            Predicate::Not(inner) => write!(f, "!{inner}"),
        }
    }
}
