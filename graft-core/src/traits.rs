//! Core traits connecting Rust structs to the graph mapping engine.

use std::cell::RefCell;
use std::rc::Rc;

use neo4rs::{BoltType as Value, Row as Record};

use crate::error::GraftError;
use crate::metadata::ClassInfo;

/// A shared, mutable handle to an entity of a known type.
///
/// Object graphs are built from these handles so that two fields pointing at
/// the same object really point at the same object.
pub type Shared<T> = Rc<RefCell<T>>;

/// A type-erased handle to any mapped entity.
///
/// Every `Shared<T>` where `T: GraphEntity` coerces into an `EntityRef`.
pub type EntityRef = Rc<RefCell<dyn GraphEntity>>;

/// Wrap a value in a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Reference identity of an entity handle.
///
/// Two handles have the same `EntityId` only if they point at the same
/// allocation, regardless of how the entity type implements equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    /// The identity of the object behind `entity`.
    pub fn of(entity: &EntityRef) -> Self {
        EntityId(Rc::as_ptr(entity) as *const () as usize)
    }
}

/// Read/write access to a mapped entity, used by the mapper and the
/// mapping context.
///
/// Automatically implemented by `#[derive(NodeEntity)]` and
/// `#[derive(RelationshipEntity)]`. The trait is object safe: the engine only
/// ever sees entities as [`EntityRef`]. Fields are addressed by their Rust
/// field name, as recorded in the type's [`ClassInfo`].
///
/// # Example
///
/// ```rust,ignore
/// #[derive(NodeEntity)]
/// #[graft(label = "Student", label = "DomainObject")]
/// struct Student {
///     #[graft(id)]
///     id: Option<i64>,
///     name: String,
/// }
/// ```
pub trait GraphEntity {
    /// The type name under which this entity's [`ClassInfo`] is registered.
    fn type_name(&self) -> &'static str;

    /// The store-assigned id, `None` until the entity has been saved.
    fn native_id(&self) -> Option<i64>;

    /// Overwrite the store-assigned id.
    fn set_native_id(&mut self, id: Option<i64>);

    /// Read a property field as a graph value. `None` means "no value".
    fn property(&self, field: &str) -> Option<Value>;

    /// Entities referenced by a relationship field.
    fn related(&self, _field: &str) -> Vec<EntityRef> {
        Vec::new()
    }

    /// Labels carried by the instance on top of the type's static labels.
    fn labels(&self) -> Vec<String> {
        Vec::new()
    }

    /// Start node of a relationship entity.
    fn start_node(&self) -> Option<EntityRef> {
        None
    }

    /// End node of a relationship entity.
    fn end_node(&self) -> Option<EntityRef> {
        None
    }
}

/// Static descriptor access for a concrete entity type.
///
/// Used by [`MetaDataBuilder::register`](crate::metadata::MetaDataBuilder::register)
/// and by relationship fields to name their target type.
pub trait EntityType: GraphEntity + Sized + 'static {
    /// The name this type is registered under (the struct name for derives).
    const TYPE_NAME: &'static str;

    /// Build the type's descriptor.
    fn class_info() -> ClassInfo;
}

/// A field that holds references to other entities.
///
/// Implemented for `Shared<T>`, `Option<Shared<T>>` and `Vec<Shared<T>>`.
/// The derives use it to enumerate relationship targets and to record the
/// target type and cardinality in the descriptor.
pub trait Relatable {
    /// Whether the field holds many targets.
    const COLLECTION: bool;

    /// Type name of the target entity.
    fn target_type() -> &'static str;

    /// The referenced entities, in field order.
    fn refs(&self) -> Vec<EntityRef>;
}

impl<T: EntityType> Relatable for Shared<T> {
    const COLLECTION: bool = false;

    fn target_type() -> &'static str {
        T::TYPE_NAME
    }

    fn refs(&self) -> Vec<EntityRef> {
        vec![self.clone() as EntityRef]
    }
}

impl<T: EntityType> Relatable for Option<Shared<T>> {
    const COLLECTION: bool = false;

    fn target_type() -> &'static str {
        T::TYPE_NAME
    }

    fn refs(&self) -> Vec<EntityRef> {
        self.iter().map(|e| e.clone() as EntityRef).collect()
    }
}

impl<T: EntityType> Relatable for Vec<Shared<T>> {
    const COLLECTION: bool = true;

    fn target_type() -> &'static str {
        T::TYPE_NAME
    }

    fn refs(&self) -> Vec<EntityRef> {
        self.iter().map(|e| e.clone() as EntityRef).collect()
    }
}

/// Maps a `neo4rs::Row` into a Rust struct by field name.
///
/// Automatically implemented by `#[derive(FromRow)]`. Each struct field
/// maps to a column name in the row; `Option<T>` fields tolerate missing
/// columns.
pub trait FromRow: Sized {
    /// Deserialize a [`Row`](neo4rs::Row) into `Self`.
    fn from_record(record: &Record) -> Result<Self, GraftError>;
}

/// Converts a single `neo4rs::BoltType` value into a Rust type.
pub trait FromGraphValue: Sized {
    /// Convert a [`BoltType`](neo4rs::BoltType) into `Self`.
    fn from_value(value: Value) -> Result<Self, GraftError>;
}

/// Converts a Rust value into a `neo4rs::BoltType` property value.
///
/// A blanket implementation covers all types that already implement
/// `Into<BoltType>` (e.g. `String`, `i64`, `f64`, `bool`, `Vec<i64>`). A
/// manual implementation is provided for [`Blob`](crate::Blob).
pub trait IntoGraphValue {
    /// Convert `self` into a [`BoltType`](neo4rs::BoltType).
    fn into_value(self) -> Value;
}

impl<T: Into<Value>> IntoGraphValue for T {
    fn into_value(self) -> Value {
        self.into()
    }
}
