//! Core of graft: descriptors, the mapping context, the entity graph mapper,
//! the statement compiler and the Cypher renderer.
//!
//! This crate is not meant to be used directly; use the [`graft`] facade
//! crate instead, which re-exports everything you need.
//!
//! [`graft`]: https://docs.rs/graft

pub mod traits;
pub mod error;

pub mod value;
pub mod record;
pub mod metadata;
pub mod config;

pub mod relationship;
pub mod snapshot;
pub mod context;

pub mod compile;
pub mod mapper;
pub mod compiler;
pub mod cypher;
pub mod reconcile;

pub use error::GraftError;
pub use value::{Blob, PrimaryId, PropertyMap};
pub use traits::{
    shared, EntityId, EntityRef, EntityType, FromGraphValue, FromRow, GraphEntity, IntoGraphValue, Relatable,
    Shared,
};
pub use metadata::{ClassInfo, Direction, MetaData};
pub use context::MappingContext;
pub use mapper::{Depth, EntityGraphMapper};
pub use compile::CompileContext;
pub use relationship::MappedRelationship;
