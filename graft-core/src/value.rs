//! Value conversion between `neo4rs::BoltType` and Rust types.
//!
//! Property values travel through the engine as `BoltType`; this module holds
//! the [`FromGraphValue`] impls used to decode result rows, the property map
//! alias, primary-id keys and the [`Blob`] byte-array wrapper.

use std::collections::{BTreeMap, HashMap};

use crate::error::GraftError;
use crate::traits::{FromGraphValue, IntoGraphValue};

/// Property name to value, ordered by name so snapshots and statements are
/// deterministic.
pub type PropertyMap = BTreeMap<String, neo4rs::BoltType>;

/// Returns a human-readable name for a [`neo4rs::BoltType`] variant.
///
/// Used in error messages to describe the actual type received when a
/// conversion fails.
pub fn type_name(v: &neo4rs::BoltType) -> &'static str {
    match v {
        neo4rs::BoltType::Null(_) => "Null",
        neo4rs::BoltType::Boolean(_) => "Boolean",
        neo4rs::BoltType::Integer(_) => "Integer",
        neo4rs::BoltType::Float(_) => "Float",
        neo4rs::BoltType::String(_) => "String",
        neo4rs::BoltType::Bytes(_) => "Bytes",
        neo4rs::BoltType::List(_) => "List",
        neo4rs::BoltType::Map(_) => "Map",
        neo4rs::BoltType::Node(_) => "Node",
        neo4rs::BoltType::Relation(_) => "Relationship",
        neo4rs::BoltType::UnboundedRelation(_) => "UnboundedRelationship",
        neo4rs::BoltType::Path(_) => "Path",
        neo4rs::BoltType::Point2D(_) => "Point2D",
        neo4rs::BoltType::Point3D(_) => "Point3D",
        neo4rs::BoltType::Duration(_) => "Duration",
        neo4rs::BoltType::Date(_) => "Date",
        neo4rs::BoltType::Time(_) => "Time",
        neo4rs::BoltType::LocalTime(_) => "LocalTime",
        neo4rs::BoltType::LocalDateTime(_) => "LocalDateTime",
        neo4rs::BoltType::DateTime(_) => "DateTime",
        neo4rs::BoltType::DateTimeZoneId(_) => "DateTimeZoneId",
    }
}

/// `true` for `BoltType::Null`.
pub fn is_null(v: &neo4rs::BoltType) -> bool {
    matches!(v, neo4rs::BoltType::Null(_))
}

/// The `BoltType::Null` value.
pub fn null() -> neo4rs::BoltType {
    neo4rs::BoltType::Null(neo4rs::BoltNull)
}

/// Build a Bolt map from a [`PropertyMap`].
pub fn to_bolt_map(props: &PropertyMap) -> neo4rs::BoltType {
    neo4rs::BoltType::Map(neo4rs::BoltMap {
        value: props
            .iter()
            .map(|(k, v)| (neo4rs::BoltString::from(k.as_str()), v.clone()))
            .collect(),
    })
}

/// Build a Bolt list from already-converted values.
pub fn to_bolt_list(values: Vec<neo4rs::BoltType>) -> neo4rs::BoltType {
    neo4rs::BoltType::List(neo4rs::BoltList { value: values })
}

// ---------------------------------------------------------------------------
// Primary ids
// ---------------------------------------------------------------------------

/// Application-level primary key of an entity, used to find entities in the
/// mapping context before (or independently of) their native id.
///
/// Only integer and string keys are supported; other property types cannot
/// act as a primary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryId {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl PrimaryId {
    /// Project a property value into a key, if it has a usable type.
    pub fn from_value(value: &neo4rs::BoltType) -> Option<Self> {
        match value {
            neo4rs::BoltType::Integer(i) => Some(PrimaryId::Int(i.value)),
            neo4rs::BoltType::String(s) => Some(PrimaryId::Str(s.value.clone())),
            _ => None,
        }
    }
}

impl From<i64> for PrimaryId {
    fn from(v: i64) -> Self {
        PrimaryId::Int(v)
    }
}

impl From<&str> for PrimaryId {
    fn from(v: &str) -> Self {
        PrimaryId::Str(v.to_owned())
    }
}

impl From<String> for PrimaryId {
    fn from(v: String) -> Self {
        PrimaryId::Str(v)
    }
}

// ---------------------------------------------------------------------------
// Numeric macro
// ---------------------------------------------------------------------------

macro_rules! impl_from_val_num {
    ($t:ty, $pat:ident) => {
        impl FromGraphValue for $t {
            fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
                match value {
                    neo4rs::BoltType::$pat(v) => Ok(v.value as $t),
                    other => Err(GraftError::type_mismatch(
                        stringify!($pat),
                        type_name(&other),
                        stringify!($t),
                    )),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

impl FromGraphValue for String {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::String(s) => Ok(s.value),
            other => Err(GraftError::type_mismatch("String", type_name(&other), "String")),
        }
    }
}

impl FromGraphValue for bool {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::Boolean(b) => Ok(b.value),
            other => Err(GraftError::type_mismatch("Boolean", type_name(&other), "bool")),
        }
    }
}

impl_from_val_num!(i64, Integer);
impl_from_val_num!(i32, Integer);
impl_from_val_num!(u64, Integer);
impl_from_val_num!(u32, Integer);
impl_from_val_num!(f64, Float);
impl_from_val_num!(f32, Float);

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: FromGraphValue> FromGraphValue for Vec<T> {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::List(xs) => xs.value.into_iter().map(T::from_value).collect(),
            other => Err(GraftError::type_mismatch("List", type_name(&other), "Vec<T>")),
        }
    }
}

/// Present but `null` maps to `None`. A missing column is handled by the
/// `FromRow` derive.
impl<T: FromGraphValue> FromGraphValue for Option<T> {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::Null(_) => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }
}

/// Raw values pass through unchanged.
impl FromGraphValue for neo4rs::BoltType {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        Ok(value)
    }
}

/// Converts a Neo4j `Map` into `HashMap<String, V>`.
impl<V: FromGraphValue> FromGraphValue for HashMap<String, V> {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::Map(m) => {
                let mut out = HashMap::with_capacity(m.value.len());
                for (k, v) in m.value {
                    out.insert(k.value, V::from_value(v)?);
                }
                Ok(out)
            }
            other => Err(GraftError::type_mismatch("Map", type_name(&other), "HashMap<String, V>")),
        }
    }
}

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

/// Newtype wrapper for byte-array properties.
///
/// A dedicated type is used instead of `Vec<u8>` because `Vec<u8>` already
/// converts into a Bolt *list* of integers, not into Bolt `Bytes`.
///
/// ```rust,ignore
/// #[derive(NodeEntity)]
/// struct Attachment {
///     #[graft(id)]
///     id: Option<i64>,
///     payload: Blob,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl FromGraphValue for Blob {
    fn from_value(value: neo4rs::BoltType) -> Result<Self, GraftError> {
        match value {
            neo4rs::BoltType::Bytes(b) => Ok(Blob(b.value.to_vec())),
            other => Err(GraftError::type_mismatch("Bytes", type_name(&other), "Blob")),
        }
    }
}

impl IntoGraphValue for Blob {
    fn into_value(self) -> neo4rs::BoltType {
        neo4rs::BoltType::Bytes(neo4rs::BoltBytes::new(bytes::Bytes::from(self.0)))
    }
}
