//! The entity graph mapper.
//!
//! Walks an object graph from one or more roots and decides, for every node
//! and edge it reaches, whether it has to be created, updated or deleted.
//! The mapping context is only read here; it is updated after the resulting
//! statements have been executed, by
//! [`MappingContext::apply_save`](crate::context::MappingContext::apply_save).
//!
//! # Deletions
//!
//! A persisted node visited with depth to spare claims a *scope* for each of
//! its relationship fields: every known edge of that field's type, on the
//! field's side of the node, whose other end has the field's target type.
//! Known edges met again during the walk are *retained*. Whatever is scoped
//! but not retained is deleted. Relationship types a node does not declare,
//! or declares in another direction, are never touched.

use std::slice;

use tracing::{debug, trace};

use crate::compile::{
    CompileContext, EdgeKey, NodeBuilder, NodeMutation, NodeRef, RelRef, RelationshipBuilder,
    RelationshipMutation, Visit,
};
use crate::context::MappingContext;
use crate::error::GraftError;
use crate::metadata::{ClassInfo, Direction, MetaData, RelationshipField};
use crate::relationship::MappedRelationship;
use crate::snapshot::{EntityKey, Snapshot};
use crate::traits::{EntityId, EntityRef};

/// How many relationship hops to follow from a root.
///
/// Ordered so that more remaining depth compares greater; `Unbounded` is
/// greater than any limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Depth {
    Limited(u32),
    /// Follow every relationship; the visited set guarantees termination.
    #[default]
    Unbounded,
}

impl Depth {
    /// No hops left.
    pub fn is_exhausted(self) -> bool {
        self == Depth::Limited(0)
    }

    /// The depth left after one more hop.
    pub fn descend(self) -> Depth {
        match self {
            Depth::Limited(n) => Depth::Limited(n.saturating_sub(1)),
            Depth::Unbounded => Depth::Unbounded,
        }
    }
}

/// Negative values mean unbounded.
impl From<i32> for Depth {
    fn from(depth: i32) -> Self {
        u32::try_from(depth).map_or(Depth::Unbounded, Depth::Limited)
    }
}

impl From<u32> for Depth {
    fn from(depth: u32) -> Self {
        Depth::Limited(depth)
    }
}

/// Maps object graphs against a [`MappingContext`].
///
/// ```rust,ignore
/// let mapper = EntityGraphMapper::new(&context);
/// let compiled = mapper.map_with_depth(&(course.clone() as EntityRef), 1)?;
/// for statement in compiled.statements() {
///     println!("{statement:?}");
/// }
/// ```
pub struct EntityGraphMapper<'a> {
    context: &'a MappingContext,
    metadata: &'a MetaData,
}

impl<'a> EntityGraphMapper<'a> {
    pub fn new(context: &'a MappingContext) -> Self {
        Self { context, metadata: context.metadata() }
    }

    /// Map everything reachable from `root`.
    pub fn map(&self, root: &EntityRef) -> Result<CompileContext, GraftError> {
        self.map_with_depth(root, Depth::Unbounded)
    }

    /// Map `root` following at most `depth` relationship hops. At depth 0
    /// only the root's own labels and properties are considered.
    pub fn map_with_depth(&self, root: &EntityRef, depth: impl Into<Depth>) -> Result<CompileContext, GraftError> {
        self.map_all(slice::from_ref(root), depth)
    }

    /// Map several roots into one compile context. Entities reachable from
    /// more than one root still get a single builder.
    pub fn map_all(&self, roots: &[EntityRef], depth: impl Into<Depth>) -> Result<CompileContext, GraftError> {
        let depth = depth.into();
        let mut cx = CompileContext::new();
        for root in roots {
            let type_name = root.borrow().type_name();
            if self.metadata.is_relationship_entity(type_name) {
                self.map_relationship_entity(&mut cx, root, depth)?;
            } else {
                self.map_node(&mut cx, root, depth)?;
            }
        }
        self.schedule_deletions(&mut cx);
        debug!(
            roots = roots.len(),
            ?depth,
            nodes = cx.nodes.len(),
            relationships = cx.relationships.len(),
            deleted = cx.deleted.len(),
            "object graph mapped"
        );
        Ok(cx)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    fn map_node(&self, cx: &mut CompileContext, entity: &EntityRef, depth: Depth) -> Result<NodeRef, GraftError> {
        let identity = EntityId::of(entity);
        let index = match cx.visited.get(&identity).copied() {
            Some(visit) if depth <= visit.depth => return Ok(cx.nodes[visit.node].reference),
            Some(visit) => {
                trace!(?depth, previous = ?visit.depth, "node reached again with more depth");
                cx.visited.insert(identity, Visit { node: visit.node, depth });
                visit.node
            }
            None => {
                let builder = self.node_builder(cx, entity)?;
                trace!(
                    type_name = %builder.type_name,
                    reference = %builder.reference,
                    mutation = ?builder.mutation,
                    "node visited"
                );
                cx.nodes.push(builder);
                let index = cx.nodes.len() - 1;
                cx.visited.insert(identity, Visit { node: index, depth });
                index
            }
        };

        let reference = cx.nodes[index].reference;
        if !depth.is_exhausted() {
            self.map_relationship_fields(cx, entity, reference, depth)?;
        }
        Ok(reference)
    }

    fn node_builder(&self, cx: &CompileContext, entity: &EntityRef) -> Result<NodeBuilder, GraftError> {
        let e = entity.borrow();
        let type_name = e.type_name();
        let info = self.metadata.class_info(type_name)?;
        if info.is_relationship_entity() {
            return Err(GraftError::Mapping(format!(
                "relationship entity {type_name} cannot be mapped as a node"
            )));
        }

        let current = Snapshot::capture(&*e, info);
        let mut labels = info.labels().to_vec();
        for label in current.labels() {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }

        let (reference, mutation, properties, removed_labels) = match e.native_id() {
            None => (cx.next_node_ref(), NodeMutation::Create, current.properties().clone(), Vec::new()),
            Some(id) => match self.context.snapshot(&EntityKey::node(type_name, id)) {
                None => (NodeRef::Existing(id), NodeMutation::Update, current.properties().clone(), Vec::new()),
                Some(previous) => {
                    let diff = previous.diff(&current);
                    if diff.is_empty() {
                        (NodeRef::Existing(id), NodeMutation::Unchanged, Default::default(), Vec::new())
                    } else {
                        (
                            NodeRef::Existing(id),
                            NodeMutation::Update,
                            diff.properties,
                            diff.removed_labels.into_iter().collect(),
                        )
                    }
                }
            },
        };

        Ok(NodeBuilder {
            reference,
            type_name: type_name.to_owned(),
            labels,
            removed_labels,
            properties,
            mutation,
            entity: entity.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Relationship fields
    // -----------------------------------------------------------------------

    fn map_relationship_fields(
        &self,
        cx: &mut CompileContext,
        entity: &EntityRef,
        reference: NodeRef,
        depth: Depth,
    ) -> Result<(), GraftError> {
        let type_name = entity.borrow().type_name();
        let info = self.metadata.class_info(type_name)?;

        for field in info.relationships() {
            let targets = entity.borrow().related(&field.field);
            if let NodeRef::Existing(id) = reference {
                self.claim_scope(cx, id, field)?;
            }
            for target in &targets {
                if field.relationship_entity {
                    self.map_relationship_entity(cx, target, depth.descend())?;
                } else {
                    let target_ref = self.map_node(cx, target, depth.descend())?;
                    let target_type = target.borrow().type_name();
                    self.link(cx, field, (reference, type_name), (target_ref, target_type));
                }
            }
        }
        Ok(())
    }

    /// Mark every known edge owned by `field` on node `id` as a deletion
    /// candidate.
    fn claim_scope(&self, cx: &mut CompileContext, id: i64, field: &RelationshipField) -> Result<(), GraftError> {
        let (outgoing_other, incoming_other) = if field.relationship_entity {
            let target = self.metadata.class_info(&field.target_type)?;
            (endpoint_type(target, false), endpoint_type(target, true))
        } else {
            (field.target_type.as_str(), field.target_type.as_str())
        };

        let before = cx.scoped.len();
        for m in self.context.relationships_of(id) {
            if m.relationship_type() != field.relationship_type
                || m.relationship_id().is_some() != field.relationship_entity
            {
                continue;
            }
            let outgoing = m.start_node_id() == id && m.end_type() == outgoing_other;
            let incoming = m.end_node_id() == id && m.start_type() == incoming_other;
            let in_scope = match field.direction {
                Direction::Outgoing => outgoing,
                Direction::Incoming => incoming,
                Direction::Undirected => outgoing || incoming,
            };
            if in_scope {
                cx.scoped.insert(m.clone());
            }
        }
        trace!(
            node = id,
            field = %field.field,
            relationship_type = %field.relationship_type,
            direction = %field.direction,
            claimed = cx.scoped.len() - before,
            "relationship scope claimed"
        );
        Ok(())
    }

    /// Record a plain edge between a visited node and one of its targets.
    fn link(
        &self,
        cx: &mut CompileContext,
        field: &RelationshipField,
        (owner, owner_type): (NodeRef, &str),
        (target, target_type): (NodeRef, &str),
    ) {
        let rel_type = field.relationship_type.as_str();
        let ((start, start_type), (end, end_type)) = match field.direction {
            Direction::Outgoing => ((owner, owner_type), (target, target_type)),
            Direction::Incoming => ((target, target_type), (owner, owner_type)),
            Direction::Undirected => self.orient(rel_type, (owner, owner_type), (target, target_type)),
        };

        let key = if field.direction == Direction::Undirected {
            EdgeKey { relationship_type: rel_type.to_owned(), start: start.min(end), end: start.max(end) }
        } else {
            EdgeKey { relationship_type: rel_type.to_owned(), start, end }
        };
        if !cx.edges.insert(key) {
            return;
        }

        if let (Some(s), Some(e)) = (start.existing_id(), end.existing_id()) {
            let known = MappedRelationship::new(s, rel_type, e, start_type, end_type);
            if self.context.contains_relationship(&known) {
                trace!(start = s, end = e, relationship_type = rel_type, "known relationship retained");
                cx.retained.insert(known);
                return;
            }
        }

        let reference = cx.next_relationship_ref();
        trace!(%start, %end, relationship_type = rel_type, "relationship created");
        cx.relationships.push(RelationshipBuilder {
            reference: Some(reference),
            relationship_type: rel_type.to_owned(),
            start,
            end,
            start_type: start_type.to_owned(),
            end_type: end_type.to_owned(),
            properties: Default::default(),
            mutation: RelationshipMutation::Create,
            entity: None,
        });
    }

    /// Pick one orientation for an undirected edge: the one already known,
    /// else lower native id first, else the side that reached it first.
    fn orient<'t>(
        &self,
        rel_type: &str,
        owner: (NodeRef, &'t str),
        target: (NodeRef, &'t str),
    ) -> ((NodeRef, &'t str), (NodeRef, &'t str)) {
        let (Some(a), Some(b)) = (owner.0.existing_id(), target.0.existing_id()) else {
            return (owner, target);
        };
        let known = |s: i64, e: i64| {
            self.context
                .contains_relationship(&MappedRelationship::new(s, rel_type, e, "", ""))
        };
        if known(a, b) {
            (owner, target)
        } else if known(b, a) || b < a {
            (target, owner)
        } else {
            (owner, target)
        }
    }

    // -----------------------------------------------------------------------
    // Relationship entities
    // -----------------------------------------------------------------------

    /// Map a relationship entity and both of its endpoints. Reached again
    /// with more depth, only the endpoints are walked further.
    fn map_relationship_entity(&self, cx: &mut CompileContext, rel: &EntityRef, depth: Depth) -> Result<(), GraftError> {
        let identity = EntityId::of(rel);
        match cx.visited_relationship_entities.get(&identity).copied() {
            Some(previous) if depth <= previous => return Ok(()),
            Some(previous) => {
                trace!(?depth, ?previous, "relationship entity reached again with more depth");
                cx.visited_relationship_entities.insert(identity, depth);
                let (start, end) = {
                    let e = rel.borrow();
                    (e.start_node(), e.end_node())
                };
                for endpoint in start.iter().chain(end.iter()) {
                    self.map_node(cx, endpoint, depth)?;
                }
                return Ok(());
            }
            None => {
                cx.visited_relationship_entities.insert(identity, depth);
            }
        }

        let (type_name, native_id, start, end) = {
            let e = rel.borrow();
            (e.type_name(), e.native_id(), e.start_node(), e.end_node())
        };
        let info = self.metadata.class_info(type_name)?;
        let rel_type = info.relationship_type().ok_or_else(|| {
            GraftError::Mapping(format!("{type_name} is not a relationship entity"))
        })?;
        let start = start.ok_or_else(|| GraftError::missing_endpoint(rel_type, "start"))?;
        let end = end.ok_or_else(|| GraftError::missing_endpoint(rel_type, "end"))?;

        let start_ref = self.map_node(cx, &start, depth)?;
        let end_ref = self.map_node(cx, &end, depth)?;
        let start_type = start.borrow().type_name();
        let end_type = end.borrow().type_name();
        let current = Snapshot::capture(&*rel.borrow(), info);

        let mut builder = RelationshipBuilder {
            reference: None,
            relationship_type: rel_type.to_owned(),
            start: start_ref,
            end: end_ref,
            start_type: start_type.to_owned(),
            end_type: end_type.to_owned(),
            properties: current.properties().clone(),
            mutation: RelationshipMutation::Create,
            entity: Some(rel.clone()),
        };

        let Some(id) = native_id else {
            builder.reference = Some(cx.next_relationship_ref());
            trace!(relationship_type = rel_type, "relationship entity created");
            cx.relationships.push(builder);
            return Ok(());
        };

        match self.context.relationship_by_entity_id(id) {
            Some(known)
                if Some(known.start_node_id()) == start_ref.existing_id()
                    && Some(known.end_node_id()) == end_ref.existing_id() =>
            {
                cx.retained.insert(known.clone());
                builder.reference = Some(RelRef::Existing(id));
                builder.mutation = RelationshipMutation::Update;
                if let Some(previous) = self.context.snapshot(&EntityKey::relationship(type_name, id)) {
                    let diff = previous.diff(&current);
                    if diff.is_empty() {
                        trace!(id, relationship_type = rel_type, "relationship entity unchanged");
                        return Ok(());
                    }
                    builder.properties = diff.properties;
                }
                debug!(id, relationship_type = rel_type, "relationship entity updated");
                cx.relationships.push(builder);
            }
            Some(known) => {
                debug!(id, relationship_type = rel_type, "relationship entity moved to new endpoints");
                cx.scoped.insert(known.clone());
                builder.reference = Some(cx.next_relationship_ref());
                cx.relationships.push(builder);
            }
            None => {
                debug!(id, relationship_type = rel_type, "relationship entity not known to the context");
                builder.reference = Some(RelRef::Existing(id));
                builder.mutation = RelationshipMutation::Update;
                cx.relationships.push(builder);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Deletions
    // -----------------------------------------------------------------------

    fn schedule_deletions(&self, cx: &mut CompileContext) {
        let deleted: Vec<MappedRelationship> = cx.scoped.difference(&cx.retained).cloned().collect();
        for m in &deleted {
            debug!(
                start = m.start_node_id(),
                end = m.end_node_id(),
                relationship_type = m.relationship_type(),
                relationship_id = ?m.relationship_id(),
                "relationship deleted"
            );
            cx.relationships.push(RelationshipBuilder {
                reference: m.relationship_id().map(RelRef::Existing),
                relationship_type: m.relationship_type().to_owned(),
                start: NodeRef::Existing(m.start_node_id()),
                end: NodeRef::Existing(m.end_node_id()),
                start_type: m.start_type().to_owned(),
                end_type: m.end_type().to_owned(),
                properties: Default::default(),
                mutation: RelationshipMutation::Delete,
                entity: m
                    .relationship_id()
                    .and_then(|id| self.context.get_relationship_entity(id)),
            });
        }
        cx.deleted = deleted;
    }
}

/// Type name on one end of a relationship entity.
fn endpoint_type(info: &ClassInfo, start: bool) -> &str {
    let endpoint = if start { info.start_field() } else { info.end_field() };
    endpoint.map_or("", |e| e.target_type.as_str())
}
