//! Turns a compile context into an ordered list of abstract statements.
//!
//! Statements carry rows, not query text: rendering belongs to a
//! [`StatementFactory`](crate::cypher::StatementFactory). Order is fixed:
//!
//! 1. create nodes
//! 2. update nodes
//! 3. delete relationships
//! 4. delete relationship entities
//! 5. create relationships
//! 6. update relationships
//!
//! so every node a relationship points at exists before the relationship is
//! written, and a relationship entity moved to new endpoints is removed
//! before its replacement is created.

use tracing::debug;

use crate::compile::{CompileContext, NodeMutation, NodeRef, RelRef, RelationshipBuilder, RelationshipMutation};
use crate::config::Batching;
use crate::error::GraftError;
use crate::metadata::MetaData;
use crate::traits::EntityRef;
use crate::value::PropertyMap;

/// One node in a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub reference: NodeRef,
    pub properties: PropertyMap,
}

/// One relationship in a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRow {
    pub reference: Option<RelRef>,
    pub start: NodeRef,
    pub end: NodeRef,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateNodes {
        labels: Vec<String>,
        rows: Vec<NodeRow>,
    },
    UpdateNodes {
        labels: Vec<String>,
        removed_labels: Vec<String>,
        rows: Vec<NodeRow>,
    },
    DeleteRelationships {
        relationship_type: String,
        rows: Vec<RelationshipRow>,
    },
    DeleteRelationshipEntities {
        rows: Vec<RelationshipRow>,
    },
    CreateRelationships {
        relationship_type: String,
        rows: Vec<RelationshipRow>,
    },
    UpdateRelationships {
        rows: Vec<RelationshipRow>,
    },
    /// Detach and delete persisted nodes. Only produced by
    /// [`deletion_statements`], never by a save.
    DeleteNodes {
        rows: Vec<NodeRow>,
    },
}

impl Statement {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Statement::CreateNodes { rows, .. }
            | Statement::UpdateNodes { rows, .. }
            | Statement::DeleteNodes { rows } => rows.len(),
            Statement::DeleteRelationships { rows, .. }
            | Statement::DeleteRelationshipEntities { rows }
            | Statement::CreateRelationships { rows, .. }
            | Statement::UpdateRelationships { rows } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether executing the statement returns `reference`/`id` rows.
    pub fn returns_ids(&self) -> bool {
        matches!(self, Statement::CreateNodes { .. } | Statement::CreateRelationships { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Statement::DeleteRelationships { .. }
                | Statement::DeleteRelationshipEntities { .. }
                | Statement::DeleteNodes { .. }
        )
    }
}

/// Groups builders into statements.
///
/// ```rust
/// use graft_core::compile::CompileContext;
/// use graft_core::compiler::Compiler;
/// use graft_core::config::Batching;
///
/// let statements = Compiler::new(Batching::PerRow).compile(&CompileContext::new());
/// assert!(statements.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    batching: Batching,
}

impl Compiler {
    pub fn new(batching: Batching) -> Self {
        Self { batching }
    }

    /// Produce the statements for `cx`. Builders are only read; compiling the
    /// same context twice gives the same result.
    pub fn compile(&self, cx: &CompileContext) -> Vec<Statement> {
        let mut creates: Groups<Vec<String>, NodeRow> = Groups::default();
        let mut updates: Groups<(Vec<String>, Vec<String>), NodeRow> = Groups::default();
        for node in cx.nodes() {
            let row = NodeRow { reference: node.reference(), properties: node.properties().clone() };
            match node.mutation() {
                NodeMutation::Create => creates.push(self.batching, node.labels().to_vec(), row),
                NodeMutation::Update => updates.push(
                    self.batching,
                    (node.labels().to_vec(), node.removed_labels().to_vec()),
                    row,
                ),
                NodeMutation::Unchanged => {}
            }
        }

        let mut deletes: Groups<String, RelationshipRow> = Groups::default();
        let mut entity_deletes: Groups<(), RelationshipRow> = Groups::default();
        let mut rel_creates: Groups<String, RelationshipRow> = Groups::default();
        let mut rel_updates: Groups<(), RelationshipRow> = Groups::default();
        for rel in cx.relationships() {
            let row = relationship_row(rel);
            match (rel.mutation(), rel.reference()) {
                (RelationshipMutation::Delete, Some(RelRef::Existing(_))) => {
                    entity_deletes.push(self.batching, (), row)
                }
                (RelationshipMutation::Delete, _) => {
                    deletes.push(self.batching, rel.relationship_type().to_owned(), row)
                }
                (RelationshipMutation::Create, _) => {
                    rel_creates.push(self.batching, rel.relationship_type().to_owned(), row)
                }
                (RelationshipMutation::Update, _) => rel_updates.push(self.batching, (), row),
            }
        }

        let mut out = Vec::new();
        out.extend(creates.0.into_iter().map(|(labels, rows)| Statement::CreateNodes { labels, rows }));
        out.extend(
            updates
                .0
                .into_iter()
                .map(|((labels, removed_labels), rows)| Statement::UpdateNodes { labels, removed_labels, rows }),
        );
        out.extend(
            deletes
                .0
                .into_iter()
                .map(|(relationship_type, rows)| Statement::DeleteRelationships { relationship_type, rows }),
        );
        out.extend(entity_deletes.0.into_iter().map(|((), rows)| Statement::DeleteRelationshipEntities { rows }));
        out.extend(
            rel_creates
                .0
                .into_iter()
                .map(|(relationship_type, rows)| Statement::CreateRelationships { relationship_type, rows }),
        );
        out.extend(rel_updates.0.into_iter().map(|((), rows)| Statement::UpdateRelationships { rows }));

        debug!(statements = out.len(), batching = ?self.batching, "statements compiled");
        out
    }
}

/// Statements deleting persisted entities outright: relationship entities
/// first, then nodes together with every relationship attached to them.
pub fn deletion_statements(metadata: &MetaData, entities: &[EntityRef]) -> Result<Vec<Statement>, GraftError> {
    let mut nodes = Vec::new();
    let mut relationships = Vec::new();
    for entity in entities {
        let id = persisted_id(entity)?;
        let e = entity.borrow();
        let type_name = e.type_name();
        let info = metadata.class_info(type_name)?;
        if let Some(rel_type) = info.relationship_type() {
            let start = e.start_node().ok_or_else(|| GraftError::missing_endpoint(rel_type, "start"))?;
            let end = e.end_node().ok_or_else(|| GraftError::missing_endpoint(rel_type, "end"))?;
            relationships.push(RelationshipRow {
                reference: Some(RelRef::Existing(id)),
                start: NodeRef::Existing(persisted_id(&start)?),
                end: NodeRef::Existing(persisted_id(&end)?),
                properties: Default::default(),
            });
        } else {
            nodes.push(NodeRow { reference: NodeRef::Existing(id), properties: Default::default() });
        }
    }

    let mut out = Vec::new();
    if !relationships.is_empty() {
        out.push(Statement::DeleteRelationshipEntities { rows: relationships });
    }
    if !nodes.is_empty() {
        out.push(Statement::DeleteNodes { rows: nodes });
    }
    Ok(out)
}

fn persisted_id(entity: &EntityRef) -> Result<i64, GraftError> {
    let e = entity.borrow();
    e.native_id()
        .ok_or_else(|| GraftError::NotPersisted { type_name: e.type_name().to_owned() })
}

fn relationship_row(rel: &RelationshipBuilder) -> RelationshipRow {
    RelationshipRow {
        reference: rel.reference(),
        start: rel.start(),
        end: rel.end(),
        properties: rel.properties().clone(),
    }
}

/// Rows grouped by shape, in order of first appearance.
struct Groups<K, R>(Vec<(K, Vec<R>)>);

impl<K, R> Default for Groups<K, R> {
    fn default() -> Self {
        Groups(Vec::new())
    }
}

impl<K: PartialEq, R> Groups<K, R> {
    fn push(&mut self, batching: Batching, key: K, row: R) {
        if batching == Batching::ByShape {
            if let Some((_, rows)) = self.0.iter_mut().find(|(k, _)| *k == key) {
                rows.push(row);
                return;
            }
        }
        self.0.push((key, vec![row]));
    }
}
