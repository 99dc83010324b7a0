//! Procedural macros for graft.
//!
//! This crate is not meant to be used directly; use the [`graft`] facade
//! crate which re-exports all macros.

extern crate proc_macro;

use proc_macro::TokenStream;

mod attrs;
mod node_entity;
mod relationship_entity;
mod from_row;

/// Derive [`GraphEntity`](graft_core::traits::GraphEntity) and
/// [`EntityType`](graft_core::traits::EntityType) for a node entity.
///
/// Every field that is not marked otherwise is a property, read through
/// `IntoGraphValue` (so the field type must convert into `BoltType`).
/// `Option<T>` fields that are `None` are left out of the property map.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[graft(label = "...")]`: add a static label. Repeatable. Defaults to the struct name.
///
/// **Field-level:**
/// - `#[graft(id)]`: the native id. Required, must be `Option<i64>`.
/// - `#[graft(prop = "...")]`: override the property name (default: field name).
/// - `#[graft(primary)]`: the property is the type's primary index.
/// - `#[graft(skip)]`: not mapped.
/// - `#[graft(labels)]`: dynamic labels (`Vec<String>`).
/// - `#[graft(rel)]` / `#[graft(rel = "TYPE")]`: a relationship field of type
///   `Shared<T>`, `Option<Shared<T>>` or `Vec<Shared<T>>`. Without a type,
///   the session's naming policy derives one from the field name.
/// - `#[graft(direction = "INCOMING")]`: direction of a `rel` field
///   (`OUTGOING` by default, or `UNDIRECTED`).
///
/// # Example
///
/// ```rust,ignore
/// use graft::prelude::*;
///
/// #[derive(NodeEntity)]
/// #[graft(label = "Student", label = "DomainObject")]
/// struct Student {
///     #[graft(id)]
///     id: Option<i64>,
///     name: String,
/// }
///
/// #[derive(NodeEntity)]
/// struct Course {
///     #[graft(id)]
///     id: Option<i64>,
///     name: String,
///     #[graft(rel = "STUDENTS")]
///     students: Vec<Shared<Student>>,
/// }
/// ```
#[proc_macro_derive(NodeEntity, attributes(graft))]
pub fn node_entity(input: TokenStream) -> TokenStream {
    node_entity::expand(input)
}

/// Derive [`GraphEntity`](graft_core::traits::GraphEntity) and
/// [`EntityType`](graft_core::traits::EntityType) for a relationship entity:
/// an edge with its own identity and properties.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[graft(type = "...")]`: the relationship type. Defaults to the struct name.
///
/// **Field-level:**
/// - `#[graft(id)]`, `#[graft(prop = "...")]`, `#[graft(skip)]`: as for `NodeEntity`.
/// - `#[graft(start)]` / `#[graft(end)]`: the endpoints, each `Shared<T>` or
///   `Option<Shared<T>>`. Both are required; a `None` endpoint fails the save.
///
/// # Example
///
/// ```rust,ignore
/// use graft::prelude::*;
///
/// #[derive(RelationshipEntity)]
/// #[graft(type = "HAS_TOPIC")]
/// struct TopicLink {
///     #[graft(id)]
///     id: Option<i64>,
///     #[graft(start)]
///     forum: Option<Shared<Forum>>,
///     #[graft(end)]
///     topic: Option<Shared<Topic>>,
///     since: i64,
/// }
/// ```
#[proc_macro_derive(RelationshipEntity, attributes(graft))]
pub fn relationship_entity(input: TokenStream) -> TokenStream {
    relationship_entity::expand(input)
}

/// Derive [`FromRow`](graft_core::traits::FromRow) for a struct.
///
/// Maps a `neo4rs::Row` to a Rust struct. Each field is read from the row
/// by its name (the Cypher alias).
///
/// # Field type behaviour
///
/// - **`Option<T>`**: missing row key or `null` becomes `None`.
/// - **`T: FromGraphValue`**: any type with a value conversion.
///
/// # Example
///
/// ```rust,ignore
/// use graft::prelude::*;
///
/// #[derive(FromRow)]
/// struct CreatedRow {
///     reference: i64,
///     id: i64,
/// }
/// ```
#[proc_macro_derive(FromRow)]
pub fn from_row(input: TokenStream) -> TokenStream {
    from_row::expand(input)
}
