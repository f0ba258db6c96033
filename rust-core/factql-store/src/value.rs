// SPDX-License-Identifier: PMPL-1.0-or-later
//! Field values.

use std::fmt;

use crate::fact::Fact;

/// A field value.
///
/// The derived ordering is total: values of different variants compare by
/// variant position (`Int < Symbol < Str < Tuple < Fact`), values of the same
/// variant compare by payload. Tuples compare lexicographically and nested
/// facts compare by their field values.
///
/// A `Tuple` also doubles as the collection argument of the membership
/// operators (`in`, `not in`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A bare constant (lower-case identifier in term syntax).
    Symbol(String),
    /// A quoted string.
    Str(String),
    /// An ordered tuple of values.
    Tuple(Vec<Value>),
    /// A nested fact (complex term).
    Fact(Fact),
}

impl Value {
    /// Build a symbol value.
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The text of a string or symbol value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fact(&self) -> Option<&Fact> {
        match self {
            Value::Fact(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Fact(fact) => write!(f, "{}", fact),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Fact> for Value {
    fn from(fact: Fact) -> Self {
        Value::Fact(fact)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Tuple(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_variant_ordering() {
        assert!(Value::Int(100) < Value::symbol("a"));
        assert!(Value::symbol("z") < Value::from("a"));
        assert!(Value::from("z") < Value::Tuple(vec![]));
    }

    #[test]
    fn test_tuple_ordering_is_lexicographic() {
        let a = Value::Tuple(vec![Value::Int(1), Value::Int(5)]);
        let b = Value::Tuple(vec![Value::Int(2), Value::Int(0)]);
        assert!(a < b);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::symbol("foo").to_string(), "foo");
        assert_eq!(Value::from("foo").to_string(), "\"foo\"");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::symbol("a")]).to_string(),
            "(1,a)"
        );
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
    }
}
