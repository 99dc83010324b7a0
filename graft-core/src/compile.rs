//! The per-call accumulator produced by the mapper.
//!
//! A [`CompileContext`] owns the node and relationship builders for one
//! `map()` call, the identity-keyed visited set that guards against cycles,
//! and the relationship scopes used to compute deletions. It is read by the
//! compiler and by [`MappingContext::apply_save`](crate::context::MappingContext::apply_save),
//! then dropped.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::compiler::{Compiler, Statement};
use crate::config::Batching;
use crate::mapper::Depth;
use crate::relationship::MappedRelationship;
use crate::traits::{EntityId, EntityRef};
use crate::value::PropertyMap;

/// Compile-time address of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    /// A node that already has a native id.
    Existing(i64),
    /// The n-th node created by this call.
    New(u32),
}

impl NodeRef {
    /// Statement parameter encoding: existing ids as-is, new references as
    /// negative integers starting at -1.
    pub fn to_param(self) -> i64 {
        match self {
            NodeRef::Existing(id) => id,
            NodeRef::New(n) => -(i64::from(n)) - 1,
        }
    }

    pub fn from_param(value: i64) -> Self {
        if value < 0 {
            NodeRef::New((-(value + 1)) as u32)
        } else {
            NodeRef::Existing(value)
        }
    }

    pub fn existing_id(self) -> Option<i64> {
        match self {
            NodeRef::Existing(id) => Some(id),
            NodeRef::New(_) => None,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Existing(id) => write!(f, "node#{id}"),
            NodeRef::New(n) => write!(f, "new-node#{n}"),
        }
    }
}

/// Compile-time address of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelRef {
    Existing(i64),
    New(u32),
}

impl RelRef {
    pub fn to_param(self) -> i64 {
        match self {
            RelRef::Existing(id) => id,
            RelRef::New(n) => -(i64::from(n)) - 1,
        }
    }

    pub fn existing_id(self) -> Option<i64> {
        match self {
            RelRef::Existing(id) => Some(id),
            RelRef::New(_) => None,
        }
    }
}

impl fmt::Display for RelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelRef::Existing(id) => write!(f, "rel#{id}"),
            RelRef::New(n) => write!(f, "new-rel#{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMutation {
    Create,
    Update,
    /// Visited but clean; kept so the node can still be an endpoint.
    Unchanged,
}

/// One node touched by a `map()` call.
#[derive(Clone)]
pub struct NodeBuilder {
    pub(crate) reference: NodeRef,
    pub(crate) type_name: String,
    pub(crate) labels: Vec<String>,
    pub(crate) removed_labels: Vec<String>,
    pub(crate) properties: PropertyMap,
    pub(crate) mutation: NodeMutation,
    pub(crate) entity: EntityRef,
}

impl NodeBuilder {
    pub fn reference(&self) -> NodeRef {
        self.reference
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// For a create: every label. For an update: labels to set.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn removed_labels(&self) -> &[String] {
        &self.removed_labels
    }

    /// For a create: every non-null property. For an update: changed ones.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn mutation(&self) -> NodeMutation {
        self.mutation
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("reference", &self.reference)
            .field("type_name", &self.type_name)
            .field("labels", &self.labels)
            .field("removed_labels", &self.removed_labels)
            .field("properties", &self.properties)
            .field("mutation", &self.mutation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipMutation {
    Create,
    /// Property update of a relationship entity.
    Update,
    Delete,
}

/// One relationship mutation.
#[derive(Clone)]
pub struct RelationshipBuilder {
    pub(crate) reference: Option<RelRef>,
    pub(crate) relationship_type: String,
    pub(crate) start: NodeRef,
    pub(crate) end: NodeRef,
    pub(crate) start_type: String,
    pub(crate) end_type: String,
    pub(crate) properties: PropertyMap,
    pub(crate) mutation: RelationshipMutation,
    pub(crate) entity: Option<EntityRef>,
}

impl RelationshipBuilder {
    /// `None` only for deletions of plain edges, which are addressed by
    /// their endpoints.
    pub fn reference(&self) -> Option<RelRef> {
        self.reference
    }

    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    pub fn start(&self) -> NodeRef {
        self.start
    }

    pub fn end(&self) -> NodeRef {
        self.end
    }

    pub fn start_type(&self) -> &str {
        &self.start_type
    }

    pub fn end_type(&self) -> &str {
        &self.end_type
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn mutation(&self) -> RelationshipMutation {
        self.mutation
    }

    /// The backing relationship entity, if any.
    pub fn entity(&self) -> Option<&EntityRef> {
        self.entity.as_ref()
    }

    pub fn is_relationship_entity(&self) -> bool {
        self.entity.is_some()
    }
}

impl fmt::Debug for RelationshipBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipBuilder")
            .field("reference", &self.reference)
            .field("relationship_type", &self.relationship_type)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("properties", &self.properties)
            .field("mutation", &self.mutation)
            .field("relationship_entity", &self.entity.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Visit {
    pub(crate) node: usize,
    pub(crate) depth: Depth,
}

/// Deduplication key of a plain edge. Undirected edges are stored with
/// their endpoints sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EdgeKey {
    pub(crate) relationship_type: String,
    pub(crate) start: NodeRef,
    pub(crate) end: NodeRef,
}

/// Everything one `map()` call decided.
#[derive(Debug, Default)]
pub struct CompileContext {
    pub(crate) nodes: Vec<NodeBuilder>,
    pub(crate) visited: HashMap<EntityId, Visit>,
    pub(crate) relationships: Vec<RelationshipBuilder>,
    pub(crate) edges: HashSet<EdgeKey>,
    pub(crate) visited_relationship_entities: HashMap<EntityId, Depth>,
    pub(crate) scoped: BTreeSet<MappedRelationship>,
    pub(crate) retained: BTreeSet<MappedRelationship>,
    pub(crate) deleted: Vec<MappedRelationship>,
    pub(crate) new_relationships: u32,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node builders in visit order.
    pub fn nodes(&self) -> &[NodeBuilder] {
        &self.nodes
    }

    /// Relationship builders in emission order.
    pub fn relationships(&self) -> &[RelationshipBuilder] {
        &self.relationships
    }

    /// The builder created for `entity`, if it was visited.
    pub fn node_for(&self, entity: &EntityRef) -> Option<&NodeBuilder> {
        self.visited
            .get(&EntityId::of(entity))
            .map(|v| &self.nodes[v.node])
    }

    pub fn is_visited(&self, entity: &EntityRef) -> bool {
        self.visited.contains_key(&EntityId::of(entity))
    }

    /// Known edges scheduled for deletion, in deterministic order.
    pub fn deleted_relationships(&self) -> &[MappedRelationship] {
        &self.deleted
    }

    /// Known edges that fell inside a visited relationship field.
    pub fn scoped_relationships(&self) -> &BTreeSet<MappedRelationship> {
        &self.scoped
    }

    /// Known edges re-encountered during traversal.
    pub fn retained_relationships(&self) -> &BTreeSet<MappedRelationship> {
        &self.retained
    }

    /// `true` when nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
            && self.nodes.iter().all(|n| n.mutation == NodeMutation::Unchanged)
    }

    /// Compile with the default batching.
    pub fn statements(&self) -> Vec<Statement> {
        Compiler::default().compile(self)
    }

    pub fn statements_with(&self, batching: Batching) -> Vec<Statement> {
        Compiler::new(batching).compile(self)
    }

    pub(crate) fn next_node_ref(&self) -> NodeRef {
        let created = self
            .nodes
            .iter()
            .filter(|n| matches!(n.reference, NodeRef::New(_)))
            .count();
        NodeRef::New(created as u32)
    }

    pub(crate) fn next_relationship_ref(&mut self) -> RelRef {
        let r = RelRef::New(self.new_relationships);
        self.new_relationships += 1;
        r
    }
}
