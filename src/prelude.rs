//! Convenience re-exports for common graft usage.
//!
//! ```rust
//! use graft::prelude::*;
//! ```
//!
//! This imports the derive macros (`NodeEntity`, `RelationshipEntity`,
//! `FromRow`), the entity traits and handles (`GraphEntity`, `EntityRef`,
//! `Shared`, `shared`), the metadata builder, the mapping context and mapper,
//! the error type and the [`Blob`](graft_core::Blob) byte wrapper.

pub use crate::{FromRow, NodeEntity, RelationshipEntity};
pub use graft_core::traits::{
    shared, EntityRef, EntityType as EntityTypeTrait, FromGraphValue, FromRow as FromRowTrait, GraphEntity,
    IntoGraphValue, Shared,
};
pub use graft_core::metadata::{ClassInfo, Direction, MetaData, RelationshipField};
pub use graft_core::config::{Batching, MappingConfig};
pub use graft_core::context::MappingContext;
pub use graft_core::mapper::{Depth, EntityGraphMapper};
pub use graft_core::GraftError;
pub use graft_core::{Blob, PrimaryId};
