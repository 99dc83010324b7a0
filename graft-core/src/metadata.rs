//! Entity descriptors consumed by the mapper.
//!
//! A [`MetaData`] is built once, validated, and then shared immutably (by
//! `Arc`) between every mapping context that needs it. Descriptors are plain
//! records: the derives in `graft-macros` generate a [`ClassInfo`] per type,
//! and the builder API below can describe types by hand.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::error::GraftError;
use crate::traits::EntityType;

/// Direction of a relationship field, seen from the entity declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Direction {
    /// The declaring entity is the start node.
    #[default]
    Outgoing,
    /// The declaring entity is the end node.
    Incoming,
    /// Either orientation; the mapper writes one edge and never two.
    Undirected,
}

impl Direction {
    /// Parse `"OUTGOING"`, `"INCOMING"` or `"UNDIRECTED"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OUTGOING" => Some(Direction::Outgoing),
            "INCOMING" => Some(Direction::Incoming),
            "UNDIRECTED" => Some(Direction::Undirected),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Outgoing => "OUTGOING",
            Direction::Incoming => "INCOMING",
            Direction::Undirected => "UNDIRECTED",
        };
        f.write_str(s)
    }
}

/// A scalar property field and the graph property it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyField {
    pub field: String,
    pub property: String,
}

/// A field holding references to other entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipField {
    /// Rust field name, passed to [`GraphEntity::related`](crate::GraphEntity::related).
    pub field: String,
    /// Graph relationship type. Empty until resolved by [`MetaDataBuilder::build`]
    /// when left to the naming policy.
    pub relationship_type: String,
    pub direction: Direction,
    /// Registered type name of the referenced entities.
    pub target_type: String,
    /// Whether the field holds many targets.
    pub collection: bool,
    /// Set by [`MetaDataBuilder::build`] when the target is a relationship entity.
    pub relationship_entity: bool,
}

impl RelationshipField {
    pub fn new(field: impl Into<String>, target_type: impl Into<String>, collection: bool) -> Self {
        Self {
            field: field.into(),
            relationship_type: String::new(),
            direction: Direction::Outgoing,
            target_type: target_type.into(),
            collection,
            relationship_entity: false,
        }
    }

    /// Set an explicit relationship type instead of the inferred one.
    pub fn relationship_type(mut self, relationship_type: impl Into<String>) -> Self {
        self.relationship_type = relationship_type.into();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// The start or end field of a relationship entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointField {
    pub field: String,
    pub target_type: String,
}

/// Whether a type maps to a node or to a relationship with its own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Relationship {
        relationship_type: String,
        start: Option<EndpointField>,
        end: Option<EndpointField>,
    },
}

/// Descriptor of one entity type.
///
/// ```rust
/// use graft_core::metadata::{ClassInfo, Direction, RelationshipField};
///
/// let course = ClassInfo::node("Course")
///     .label("Course")
///     .identity("id")
///     .property("name", "name")
///     .relationship(RelationshipField::new("students", "Student", true));
///
/// let enrolment = ClassInfo::relationship_entity("Enrolment", "ENROLLED_IN")
///     .identity("id")
///     .start("student", "Student")
///     .end("course", "Course");
///
/// assert!(enrolment.is_relationship_entity());
/// assert_eq!(course.labels(), ["Course".to_string()]);
/// # let _ = Direction::Incoming;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    name: String,
    kind: EntityKind,
    labels: Vec<String>,
    identity: Option<String>,
    properties: Vec<PropertyField>,
    relationships: Vec<RelationshipField>,
    primary_index: Option<String>,
    label_field: Option<String>,
}

impl ClassInfo {
    /// Describe a node entity type.
    pub fn node(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), EntityKind::Node)
    }

    /// Describe a relationship entity type with the given graph type.
    pub fn relationship_entity(name: impl Into<String>, relationship_type: impl Into<String>) -> Self {
        Self::with_kind(
            name.into(),
            EntityKind::Relationship {
                relationship_type: relationship_type.into(),
                start: None,
                end: None,
            },
        )
    }

    fn with_kind(name: String, kind: EntityKind) -> Self {
        Self {
            name,
            kind,
            labels: Vec::new(),
            identity: None,
            properties: Vec::new(),
            relationships: Vec::new(),
            primary_index: None,
            label_field: None,
        }
    }

    /// Add a static label. Duplicates are ignored.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    /// Name the field holding the native id.
    pub fn identity(mut self, field: impl Into<String>) -> Self {
        self.identity = Some(field.into());
        self
    }

    /// Add a property field stored under `property`.
    pub fn property(mut self, field: impl Into<String>, property: impl Into<String>) -> Self {
        self.properties.push(PropertyField { field: field.into(), property: property.into() });
        self
    }

    /// Mark a property field as the application-level primary key.
    pub fn primary_index(mut self, field: impl Into<String>) -> Self {
        self.primary_index = Some(field.into());
        self
    }

    /// Name the field that carries dynamic labels.
    pub fn label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = Some(field.into());
        self
    }

    pub fn relationship(mut self, field: RelationshipField) -> Self {
        self.relationships.push(field);
        self
    }

    /// Set the start node field of a relationship entity. No effect on nodes.
    pub fn start(mut self, field: impl Into<String>, target_type: impl Into<String>) -> Self {
        if let EntityKind::Relationship { start, .. } = &mut self.kind {
            *start = Some(EndpointField { field: field.into(), target_type: target_type.into() });
        }
        self
    }

    /// Set the end node field of a relationship entity. No effect on nodes.
    pub fn end(mut self, field: impl Into<String>, target_type: impl Into<String>) -> Self {
        if let EntityKind::Relationship { end, .. } = &mut self.kind {
            *end = Some(EndpointField { field: field.into(), target_type: target_type.into() });
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn identity_field(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn properties(&self) -> &[PropertyField] {
        &self.properties
    }

    pub fn relationships(&self) -> &[RelationshipField] {
        &self.relationships
    }

    pub fn primary_index_field(&self) -> Option<&str> {
        self.primary_index.as_deref()
    }

    /// The graph property name of the primary index field.
    pub fn primary_index_property(&self) -> Option<&str> {
        let field = self.primary_index.as_deref()?;
        self.properties
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.property.as_str())
    }

    pub fn dynamic_label_field(&self) -> Option<&str> {
        self.label_field.as_deref()
    }

    pub fn is_relationship_entity(&self) -> bool {
        matches!(self.kind, EntityKind::Relationship { .. })
    }

    /// Graph type of a relationship entity, `None` for nodes.
    pub fn relationship_type(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Relationship { relationship_type, .. } => Some(relationship_type),
            EntityKind::Node => None,
        }
    }

    pub fn start_field(&self) -> Option<&EndpointField> {
        match &self.kind {
            EntityKind::Relationship { start, .. } => start.as_ref(),
            EntityKind::Node => None,
        }
    }

    pub fn end_field(&self) -> Option<&EndpointField> {
        match &self.kind {
            EntityKind::Relationship { end, .. } => end.as_ref(),
            EntityKind::Node => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Naming policy
// ---------------------------------------------------------------------------

/// Derives a relationship type from a field name when none is declared.
pub trait NamingPolicy {
    fn relationship_type(&self, field: &str) -> String;
}

/// `writesPolicy` and `writes_policy` both become `WRITES_POLICY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperSnakeCase;

impl NamingPolicy for UpperSnakeCase {
    fn relationship_type(&self, field: &str) -> String {
        let mut out = String::with_capacity(field.len() + 4);
        let mut prev_lower = false;
        for c in field.chars() {
            if c == '_' || c == '-' {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
                prev_lower = false;
                continue;
            }
            if c.is_uppercase() && prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.extend(c.to_uppercase());
        }
        out.trim_end_matches('_').to_owned()
    }
}

impl<F: Fn(&str) -> String> NamingPolicy for F {
    fn relationship_type(&self, field: &str) -> String {
        self(field)
    }
}

// ---------------------------------------------------------------------------
// MetaData
// ---------------------------------------------------------------------------

/// The validated set of entity descriptors for a session.
///
/// ```rust
/// use graft_core::metadata::{ClassInfo, MetaData, RelationshipField};
///
/// let meta = MetaData::builder()
///     .class(ClassInfo::node("Person").label("Person").identity("id")
///         .relationship(RelationshipField::new("knows", "Person", true)))
///     .build()
///     .unwrap();
///
/// let knows = &meta.class_info("Person").unwrap().relationships()[0];
/// assert_eq!(knows.relationship_type, "KNOWS");
/// ```
#[derive(Debug, Clone)]
pub struct MetaData {
    classes: BTreeMap<String, ClassInfo>,
}

impl MetaData {
    pub fn builder() -> MetaDataBuilder {
        MetaDataBuilder::default()
    }

    /// Descriptor of a registered type.
    pub fn class_info(&self, type_name: &str) -> Result<&ClassInfo, GraftError> {
        self.classes
            .get(type_name)
            .ok_or_else(|| GraftError::UnknownType(type_name.to_owned()))
    }

    pub fn labels_for(&self, type_name: &str) -> Result<&[String], GraftError> {
        Ok(self.class_info(type_name)?.labels())
    }

    /// `false` for unknown types.
    pub fn is_relationship_entity(&self, type_name: &str) -> bool {
        self.classes
            .get(type_name)
            .is_some_and(ClassInfo::is_relationship_entity)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Collects descriptors and validates them into a [`MetaData`].
pub struct MetaDataBuilder {
    classes: Vec<ClassInfo>,
    naming: Box<dyn NamingPolicy>,
}

impl Default for MetaDataBuilder {
    fn default() -> Self {
        Self { classes: Vec::new(), naming: Box::new(UpperSnakeCase) }
    }
}

impl MetaDataBuilder {
    /// Register a type through its generated descriptor.
    pub fn register<T: EntityType>(self) -> Self {
        self.class(T::class_info())
    }

    pub fn class(mut self, info: ClassInfo) -> Self {
        self.classes.push(info);
        self
    }

    /// Replace the policy used for relationship fields without an explicit type.
    pub fn naming_policy(mut self, policy: impl NamingPolicy + 'static) -> Self {
        self.naming = Box::new(policy);
        self
    }

    /// Validate every descriptor and resolve inferred relationship types.
    ///
    /// Fails with [`GraftError::InvalidMetadata`] on duplicate type names,
    /// node types without labels or identity, relationship entities missing a
    /// start or end, unknown relationship targets, a primary index that is
    /// not a property, or a relationship field whose declared type disagrees
    /// with the relationship entity it points at.
    pub fn build(self) -> Result<MetaData, GraftError> {
        let mut classes = BTreeMap::new();
        for info in self.classes {
            if classes.contains_key(&info.name) {
                return Err(GraftError::invalid_metadata(format!(
                    "type {} registered twice",
                    info.name
                )));
            }
            classes.insert(info.name.clone(), info);
        }

        for info in classes.values() {
            validate_class(info, &classes)?;
        }

        // Resolve relationship types against the (now complete) class table.
        let snapshot = classes.clone();
        for info in classes.values_mut() {
            for rel in &mut info.relationships {
                let target = &snapshot[&rel.target_type];
                match target.relationship_type() {
                    Some(entity_type) => {
                        if !rel.relationship_type.is_empty() && rel.relationship_type != entity_type {
                            return Err(GraftError::invalid_metadata(format!(
                                "{}.{} declares type {} but {} has type {}",
                                info.name, rel.field, rel.relationship_type, target.name, entity_type
                            )));
                        }
                        rel.relationship_type = entity_type.to_owned();
                        rel.relationship_entity = true;
                    }
                    None if rel.relationship_type.is_empty() => {
                        rel.relationship_type = self.naming.relationship_type(&rel.field);
                        if rel.relationship_type.is_empty() {
                            return Err(GraftError::invalid_metadata(format!(
                                "{}.{} resolves to an empty relationship type",
                                info.name, rel.field
                            )));
                        }
                    }
                    None => {}
                }
            }
        }

        for info in classes.values() {
            for rel in info.relationships.iter().filter(|r| r.relationship_entity) {
                validate_entity_field(info, rel, &classes[&rel.target_type])?;
            }
        }

        debug!(types = classes.len(), "metadata built");
        Ok(MetaData { classes })
    }
}

fn validate_class(info: &ClassInfo, classes: &BTreeMap<String, ClassInfo>) -> Result<(), GraftError> {
    if info.identity.is_none() {
        return Err(GraftError::invalid_metadata(format!("{} has no identity field", info.name)));
    }

    let mut seen = BTreeSet::new();
    for p in &info.properties {
        if !seen.insert(p.property.as_str()) {
            return Err(GraftError::invalid_metadata(format!(
                "{} maps property {} twice",
                info.name, p.property
            )));
        }
    }

    if let Some(primary) = &info.primary_index {
        if !info.properties.iter().any(|p| &p.field == primary) {
            return Err(GraftError::invalid_metadata(format!(
                "{} primary index {} is not a property field",
                info.name, primary
            )));
        }
    }

    for rel in &info.relationships {
        if !classes.contains_key(&rel.target_type) {
            return Err(GraftError::invalid_metadata(format!(
                "{}.{} targets unregistered type {}",
                info.name, rel.field, rel.target_type
            )));
        }
    }

    match &info.kind {
        EntityKind::Node => {
            if info.labels.is_empty() {
                return Err(GraftError::invalid_metadata(format!("{} has no labels", info.name)));
            }
        }
        EntityKind::Relationship { relationship_type, start, end } => {
            if relationship_type.is_empty() {
                return Err(GraftError::invalid_metadata(format!(
                    "{} has an empty relationship type",
                    info.name
                )));
            }
            if !info.relationships.is_empty() {
                return Err(GraftError::invalid_metadata(format!(
                    "relationship entity {} cannot declare relationship fields",
                    info.name
                )));
            }
            for (endpoint, name) in [(start, "start"), (end, "end")] {
                let endpoint = endpoint.as_ref().ok_or_else(|| {
                    GraftError::invalid_metadata(format!("{} has no {} node field", info.name, name))
                })?;
                match classes.get(&endpoint.target_type) {
                    Some(target) if !target.is_relationship_entity() => {}
                    Some(_) => {
                        return Err(GraftError::invalid_metadata(format!(
                            "{} {} node {} is itself a relationship entity",
                            info.name, name, endpoint.target_type
                        )))
                    }
                    None => {
                        return Err(GraftError::invalid_metadata(format!(
                            "{} {} node targets unregistered type {}",
                            info.name, name, endpoint.target_type
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

/// A node's field pointing at relationship entities must sit on the matching
/// end of them.
fn validate_entity_field(
    owner: &ClassInfo,
    rel: &RelationshipField,
    target: &ClassInfo,
) -> Result<(), GraftError> {
    let start = target.start_field().map(|e| e.target_type.as_str());
    let end = target.end_field().map(|e| e.target_type.as_str());
    let fits = match rel.direction {
        Direction::Outgoing => start == Some(owner.name()),
        Direction::Incoming => end == Some(owner.name()),
        Direction::Undirected => start == Some(owner.name()) || end == Some(owner.name()),
    };
    if fits {
        Ok(())
    } else {
        Err(GraftError::invalid_metadata(format!(
            "{}.{} ({}) does not match the endpoints of {}",
            owner.name, rel.field, rel.direction, target.name
        )))
    }
}
