//! The per-session identity map and dirty-check registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::compile::{CompileContext, NodeMutation, RelRef, RelationshipBuilder, RelationshipMutation};
use crate::error::GraftError;
use crate::metadata::{ClassInfo, MetaData};
use crate::reconcile::IdAssignments;
use crate::relationship::MappedRelationship;
use crate::snapshot::{EntityKey, KeyKind, Snapshot};
use crate::traits::{EntityId, EntityRef};
use crate::value::PrimaryId;

type PrimaryKey = (KeyKind, String, PrimaryId);

/// Tracks which entities a session has seen, what they looked like at the
/// time, and which edges are known to exist between them.
///
/// Node and relationship-entity registries are separate, so a node and a
/// relationship may share a native id. Entities are held by handle; the
/// context never clones entity values.
pub struct MappingContext {
    metadata: Arc<MetaData>,
    nodes: HashMap<i64, EntityRef>,
    relationship_entities: HashMap<i64, EntityRef>,
    identities: HashMap<EntityId, EntityKey>,
    primary: HashMap<PrimaryKey, EntityRef>,
    types: BTreeMap<(KeyKind, String), BTreeSet<i64>>,
    relationships: BTreeSet<MappedRelationship>,
    /// Known edges by endpoint node id.
    by_node: HashMap<i64, BTreeSet<MappedRelationship>>,
    /// Known edges by backing relationship entity id.
    by_entity: HashMap<i64, MappedRelationship>,
    snapshots: HashMap<EntityKey, Snapshot>,
}

impl MappingContext {
    pub fn new(metadata: Arc<MetaData>) -> Self {
        Self {
            metadata,
            nodes: HashMap::new(),
            relationship_entities: HashMap::new(),
            identities: HashMap::new(),
            primary: HashMap::new(),
            types: BTreeMap::new(),
            relationships: BTreeSet::new(),
            by_node: HashMap::new(),
            by_entity: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    pub fn metadata(&self) -> &Arc<MetaData> {
        &self.metadata
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Register a persisted node entity and snapshot it.
    ///
    /// If another object is already registered under the same id, that object
    /// is returned and `entity` is not registered.
    pub fn add_node_entity(&mut self, entity: &EntityRef) -> Result<EntityRef, GraftError> {
        let id = require_id(entity)?;
        self.register(KeyKind::Node, entity, id, false)
    }

    pub fn get_node_entity(&self, id: i64) -> Option<EntityRef> {
        self.nodes.get(&id).cloned()
    }

    pub fn get_node_entity_by_primary_id(&self, type_name: &str, id: &PrimaryId) -> Option<EntityRef> {
        self.primary
            .get(&(KeyKind::Node, type_name.to_owned(), id.clone()))
            .cloned()
    }

    /// Give `entity` a new native id, register it under that id and take a
    /// fresh snapshot. Used once a create has been executed.
    pub fn replace_node_entity(&mut self, entity: &EntityRef, id: i64) -> Result<(), GraftError> {
        self.deregister(entity);
        entity.borrow_mut().set_native_id(Some(id));
        self.register(KeyKind::Node, entity, id, true)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Relationship entities
    // -----------------------------------------------------------------------

    /// Register a relationship entity under `id`, assigning the id if the
    /// entity does not carry it yet.
    pub fn add_relationship_entity(&mut self, entity: &EntityRef, id: i64) -> Result<EntityRef, GraftError> {
        if entity.borrow().native_id() != Some(id) {
            entity.borrow_mut().set_native_id(Some(id));
        }
        self.register(KeyKind::Relationship, entity, id, false)
    }

    pub fn get_relationship_entity(&self, id: i64) -> Option<EntityRef> {
        self.relationship_entities.get(&id).cloned()
    }

    pub fn get_relationship_entity_by_id(&self, info: &ClassInfo, id: &PrimaryId) -> Option<EntityRef> {
        self.primary
            .get(&(KeyKind::Relationship, info.name().to_owned(), id.clone()))
            .cloned()
    }

    /// Like [`replace_node_entity`](Self::replace_node_entity), for
    /// relationship entities.
    pub fn replace_relationship_entity(&mut self, entity: &EntityRef, id: i64) -> Result<(), GraftError> {
        self.deregister(entity);
        entity.borrow_mut().set_native_id(Some(id));
        self.register(KeyKind::Relationship, entity, id, true)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Forget an entity. Removing a node also forgets every edge touching it
    /// and the relationship entities backing those edges. Returns `false` if
    /// the entity was not registered.
    pub fn remove_entity(&mut self, entity: &EntityRef) -> bool {
        let Some(key) = self.deregister(entity) else {
            return false;
        };
        match key.kind {
            KeyKind::Node => {
                let touching: Vec<MappedRelationship> = self.relationships_of(key.id).cloned().collect();
                for m in touching {
                    self.unindex_relationship(&m);
                    if let Some(rel) = m.relationship_id().and_then(|r| self.get_relationship_entity(r)) {
                        self.deregister(&rel);
                    }
                }
            }
            KeyKind::Relationship => {
                if let Some(m) = self.by_entity.get(&key.id).cloned() {
                    self.unindex_relationship(&m);
                }
            }
        }
        debug!(kind = ?key.kind, type_name = %key.type_name, id = key.id, "entity removed from mapping context");
        true
    }

    /// Evict every entity of a type and every known edge touching it.
    pub fn remove_type(&mut self, type_name: &str) {
        let mut evicted = Vec::new();
        for kind in [KeyKind::Node, KeyKind::Relationship] {
            if let Some(ids) = self.types.get(&(kind, type_name.to_owned())) {
                let registry = match kind {
                    KeyKind::Node => &self.nodes,
                    KeyKind::Relationship => &self.relationship_entities,
                };
                evicted.extend(ids.iter().filter_map(|id| registry.get(id).cloned()));
            }
        }
        for entity in &evicted {
            self.remove_entity(entity);
        }
        let touching: Vec<MappedRelationship> = self
            .relationships
            .iter()
            .filter(|m| m.start_type() == type_name || m.end_type() == type_name)
            .cloned()
            .collect();
        for m in &touching {
            self.unindex_relationship(m);
        }
        debug!(type_name, evicted = evicted.len(), "type evicted from mapping context");
    }

    /// Reset every registry. Live entities keep their native ids.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationship_entities.clear();
        self.identities.clear();
        self.primary.clear();
        self.types.clear();
        self.relationships.clear();
        self.by_node.clear();
        self.by_entity.clear();
        self.snapshots.clear();
        debug!("mapping context cleared");
    }

    // -----------------------------------------------------------------------
    // Known relationships
    // -----------------------------------------------------------------------

    /// Record a known edge. A relationship id that does not name a registered
    /// relationship entity is dropped.
    pub fn add_relationship(&mut self, relationship: MappedRelationship) -> bool {
        let relationship = match relationship.relationship_id() {
            Some(id) if !self.relationship_entities.contains_key(&id) => relationship.without_relationship_id(),
            _ => relationship,
        };
        self.index_relationship(relationship)
    }

    pub fn contains_relationship(&self, relationship: &MappedRelationship) -> bool {
        self.relationships.contains(relationship)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &MappedRelationship> {
        self.relationships.iter()
    }

    /// Known edges starting or ending at node `id`.
    pub fn relationships_of(&self, id: i64) -> impl Iterator<Item = &MappedRelationship> {
        self.by_node.get(&id).into_iter().flatten()
    }

    pub fn remove_relationship(&mut self, relationship: &MappedRelationship) -> bool {
        self.unindex_relationship(relationship)
    }

    /// Record a loaded plain edge between two persisted entities, registering
    /// both endpoints if needed.
    pub fn attach_edge(&mut self, start: &EntityRef, relationship_type: &str, end: &EntityRef) -> Result<bool, GraftError> {
        let start = self.add_node_entity(start)?;
        let end = self.add_node_entity(end)?;
        let m = MappedRelationship::new(
            require_id(&start)?,
            relationship_type,
            require_id(&end)?,
            start.borrow().type_name(),
            end.borrow().type_name(),
        );
        Ok(self.add_relationship(m))
    }

    /// Register a loaded relationship entity together with its endpoints and
    /// the edge it stands for.
    pub fn attach_relationship_entity(&mut self, rel: &EntityRef) -> Result<(), GraftError> {
        let id = require_id(rel)?;
        let type_name = rel.borrow().type_name();
        let info = self.metadata.class_info(type_name)?;
        let rel_type = info
            .relationship_type()
            .ok_or_else(|| GraftError::Mapping(format!("{type_name} is not a relationship entity")))?
            .to_owned();
        let start = rel
            .borrow()
            .start_node()
            .ok_or_else(|| GraftError::missing_endpoint(&rel_type, "start"))?;
        let end = rel
            .borrow()
            .end_node()
            .ok_or_else(|| GraftError::missing_endpoint(&rel_type, "end"))?;
        let start = self.add_node_entity(&start)?;
        let end = self.add_node_entity(&end)?;
        self.add_relationship_entity(rel, id)?;
        let m = MappedRelationship::new(
            require_id(&start)?,
            rel_type,
            require_id(&end)?,
            start.borrow().type_name(),
            end.borrow().type_name(),
        )
        .with_relationship_id(id);
        self.add_relationship(m);
        Ok(())
    }

    /// The known edge backed by a relationship entity id.
    pub fn relationship_by_entity_id(&self, id: i64) -> Option<&MappedRelationship> {
        self.by_entity.get(&id)
    }

    // -----------------------------------------------------------------------
    // Dirty checking
    // -----------------------------------------------------------------------

    /// The registry key for an entity, computed from its type and current id.
    pub fn key_of(&self, entity: &EntityRef) -> Option<EntityKey> {
        let e = entity.borrow();
        let id = e.native_id()?;
        let type_name = e.type_name();
        Some(if self.metadata.is_relationship_entity(type_name) {
            EntityKey::relationship(type_name, id)
        } else {
            EntityKey::node(type_name, id)
        })
    }

    /// `true` if the entity was never snapshotted or differs from its
    /// snapshot.
    pub fn is_dirty(&self, entity: &EntityRef) -> bool {
        let Some(key) = self.key_of(entity) else {
            return true;
        };
        let Some(previous) = self.snapshots.get(&key) else {
            return true;
        };
        let Ok(info) = self.metadata.class_info(&key.type_name) else {
            return true;
        };
        let current = Snapshot::capture(&*entity.borrow(), info);
        !previous.diff(&current).is_empty()
    }

    pub fn snapshot(&self, key: &EntityKey) -> Option<&Snapshot> {
        self.snapshots.get(key)
    }

    /// Dynamic labels of a node at its last snapshot.
    pub fn label_history(&self, id: i64) -> Option<&BTreeSet<String>> {
        let entity = self.nodes.get(&id)?;
        let key = self.identities.get(&EntityId::of(entity))?;
        self.snapshots.get(key).map(Snapshot::labels)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether this exact object is registered.
    pub fn is_registered(&self, entity: &EntityRef) -> bool {
        self.identities.contains_key(&EntityId::of(entity))
    }

    /// Registered nodes one known edge away from `entity`.
    pub fn neighbours(&self, entity: &EntityRef) -> Vec<EntityRef> {
        let Some(id) = entity.borrow().native_id() else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        self.relationships_of(id)
            .map(|m| if m.start_node_id() == id { m.end_node_id() } else { m.start_node_id() })
            .filter(|other| seen.insert(*other))
            .filter_map(|other| self.nodes.get(&other).cloned())
            .collect()
    }

    /// Registered entities of a type, by ascending id.
    pub fn entities_of(&self, type_name: &str) -> Vec<EntityRef> {
        let mut out = Vec::new();
        for kind in [KeyKind::Node, KeyKind::Relationship] {
            let registry = match kind {
                KeyKind::Node => &self.nodes,
                KeyKind::Relationship => &self.relationship_entities,
            };
            if let Some(ids) = self.types.get(&(kind, type_name.to_owned())) {
                out.extend(ids.iter().filter_map(|id| registry.get(id).cloned()));
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_entity_count(&self) -> usize {
        self.relationship_entities.len()
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Fold the outcome of an executed save back into the context.
    ///
    /// Every reference in `compiled` is resolved against `ids` before anything
    /// is changed, so an incomplete set of ids leaves the context untouched.
    pub fn apply_save(&mut self, compiled: &CompileContext, ids: &IdAssignments) -> Result<(), GraftError> {
        for node in compiled.nodes() {
            ids.resolve_node(node.reference())?;
        }
        for rel in compiled.relationships() {
            ids.resolve_node(rel.start())?;
            ids.resolve_node(rel.end())?;
            if rel.is_relationship_entity() && rel.mutation() != RelationshipMutation::Delete {
                relationship_id(rel, ids)?;
            }
        }

        for node in compiled.nodes() {
            let id = ids.resolve_node(node.reference())?;
            match node.mutation() {
                NodeMutation::Create => self.replace_node_entity(node.entity(), id)?,
                NodeMutation::Update => self.refresh(KeyKind::Node, node.entity(), id)?,
                NodeMutation::Unchanged => {
                    if !self.is_registered(node.entity()) {
                        self.add_node_entity(node.entity())?;
                    }
                }
            }
        }

        for m in compiled.deleted_relationships() {
            self.unindex_relationship(m);
        }

        for rel in compiled.relationships() {
            let start = ids.resolve_node(rel.start())?;
            let end = ids.resolve_node(rel.end())?;
            let mapped = MappedRelationship::new(start, rel.relationship_type(), end, rel.start_type(), rel.end_type());
            match (rel.mutation(), rel.entity()) {
                (RelationshipMutation::Create, None) => {
                    self.add_relationship(mapped);
                }
                (RelationshipMutation::Create, Some(entity)) => {
                    let id = relationship_id(rel, ids)?;
                    self.replace_relationship_entity(entity, id)?;
                    self.add_relationship(mapped.with_relationship_id(id));
                }
                (RelationshipMutation::Update, Some(entity)) => {
                    let id = relationship_id(rel, ids)?;
                    self.refresh(KeyKind::Relationship, entity, id)?;
                    self.add_relationship(mapped.with_relationship_id(id));
                }
                (RelationshipMutation::Update, None) => {}
                (RelationshipMutation::Delete, entity) => {
                    if let (Some(entity), Some(id)) = (entity, rel.reference().and_then(RelRef::existing_id)) {
                        if self.relationship_entities.get(&id).is_some_and(|e| EntityId::of(e) == EntityId::of(entity)) {
                            self.deregister(entity);
                        }
                    }
                }
            }
        }

        debug!(
            nodes = self.nodes.len(),
            relationship_entities = self.relationship_entities.len(),
            relationships = self.relationships.len(),
            "save applied to mapping context"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn index_relationship(&mut self, m: MappedRelationship) -> bool {
        if self.relationships.contains(&m) {
            return false;
        }
        for node in [m.start_node_id(), m.end_node_id()] {
            self.by_node.entry(node).or_default().insert(m.clone());
        }
        if let Some(id) = m.relationship_id() {
            self.by_entity.insert(id, m.clone());
        }
        self.relationships.insert(m)
    }

    fn unindex_relationship(&mut self, m: &MappedRelationship) -> bool {
        let Some(stored) = self.relationships.take(m) else {
            return false;
        };
        for node in [stored.start_node_id(), stored.end_node_id()] {
            if let Some(edges) = self.by_node.get_mut(&node) {
                edges.remove(&stored);
                if edges.is_empty() {
                    self.by_node.remove(&node);
                }
            }
        }
        if let Some(id) = stored.relationship_id() {
            self.by_entity.remove(&id);
        }
        true
    }

    /// Re-register an entity that is already persisted and take a new snapshot.
    fn refresh(&mut self, kind: KeyKind, entity: &EntityRef, id: i64) -> Result<(), GraftError> {
        self.deregister(entity);
        self.register(kind, entity, id, true)?;
        Ok(())
    }

    fn register(&mut self, kind: KeyKind, entity: &EntityRef, id: i64, replace: bool) -> Result<EntityRef, GraftError> {
        let type_name = entity.borrow().type_name();
        let info = self.metadata.class_info(type_name)?;
        let registry = match kind {
            KeyKind::Node => &mut self.nodes,
            KeyKind::Relationship => &mut self.relationship_entities,
        };

        if let Some(existing) = registry.get(&id) {
            if EntityId::of(existing) == EntityId::of(entity) {
                if !replace {
                    return Ok(existing.clone());
                }
            } else if !replace {
                trace!(type_name, id, "id already registered to another object");
                return Ok(existing.clone());
            }
        }

        if let Some(previous) = registry.insert(id, entity.clone()) {
            if EntityId::of(&previous) != EntityId::of(entity) {
                self.identities.remove(&EntityId::of(&previous));
            }
        }

        let key = EntityKey { kind, type_name: type_name.to_owned(), id };
        self.identities.insert(EntityId::of(entity), key.clone());
        self.types
            .entry((kind, type_name.to_owned()))
            .or_default()
            .insert(id);

        let e = entity.borrow();
        if let Some(field) = info.primary_index_field() {
            if let Some(pid) = e.property(field).as_ref().and_then(PrimaryId::from_value) {
                self.primary
                    .insert((kind, type_name.to_owned(), pid), entity.clone());
            }
        }
        self.snapshots.insert(key, Snapshot::capture(&*e, info));
        trace!(kind = ?kind, type_name, id, "entity registered");
        Ok(entity.clone())
    }

    /// Remove every registration of this object, leaving known edges alone.
    fn deregister(&mut self, entity: &EntityRef) -> Option<EntityKey> {
        let identity = EntityId::of(entity);
        let key = self.identities.remove(&identity)?;
        let registry = match key.kind {
            KeyKind::Node => &mut self.nodes,
            KeyKind::Relationship => &mut self.relationship_entities,
        };
        if registry.get(&key.id).is_some_and(|e| EntityId::of(e) == identity) {
            registry.remove(&key.id);
            if let Some(ids) = self.types.get_mut(&(key.kind, key.type_name.clone())) {
                ids.remove(&key.id);
            }
            self.snapshots.remove(&key);
        }
        self.primary.retain(|_, e| EntityId::of(e) != identity);
        Some(key)
    }
}

fn require_id(entity: &EntityRef) -> Result<i64, GraftError> {
    let e = entity.borrow();
    e.native_id().ok_or_else(|| GraftError::NotPersisted {
        type_name: e.type_name().to_owned(),
    })
}

fn relationship_id(rel: &RelationshipBuilder, ids: &IdAssignments) -> Result<i64, GraftError> {
    let reference = rel.reference().ok_or_else(|| {
        GraftError::UnresolvedReference(format!("{} relationship without a reference", rel.relationship_type()))
    })?;
    ids.resolve_relationship(reference)
}
