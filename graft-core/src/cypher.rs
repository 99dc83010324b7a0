//! Cypher rendering of compiled statements.
//!
//! Every statement is rendered as a single `UNWIND $rows AS row ...` query so
//! that a batch of one and a batch of many share the same text. Nodes created
//! earlier in the same save are resolved to their assigned ids at render
//! time, which is why rendering takes the [`IdAssignments`] gathered so far.

use std::collections::{BTreeMap, HashMap};

use neo4rs::BoltType as Value;

use crate::compiler::{NodeRow, RelationshipRow, Statement};
use crate::error::GraftError;
use crate::reconcile::IdAssignments;
use crate::value;

/// A statement ready to be sent: query text plus named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub cypher: String,
    pub parameters: BTreeMap<String, Value>,
}

/// Renders abstract statements into concrete queries.
pub trait StatementFactory {
    fn render(&self, statement: &Statement, ids: &IdAssignments) -> Result<RenderedStatement, GraftError>;
}

/// The Cypher renderer.
///
/// ```rust
/// use graft_core::compile::NodeRef;
/// use graft_core::compiler::{NodeRow, Statement};
/// use graft_core::cypher::{CypherStatementFactory, StatementFactory};
/// use graft_core::reconcile::IdAssignments;
///
/// let statement = Statement::CreateNodes {
///     labels: vec!["Student".into()],
///     rows: vec![NodeRow { reference: NodeRef::New(0), properties: Default::default() }],
/// };
/// let rendered = CypherStatementFactory.render(&statement, &IdAssignments::new()).unwrap();
/// assert!(rendered.cypher.starts_with("UNWIND $rows AS row CREATE (n:`Student`)"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CypherStatementFactory;

impl StatementFactory for CypherStatementFactory {
    fn render(&self, statement: &Statement, ids: &IdAssignments) -> Result<RenderedStatement, GraftError> {
        let (cypher, rows) = match statement {
            Statement::CreateNodes { labels, rows } => (
                format!(
                    "UNWIND $rows AS row CREATE (n{}) SET n = row.props RETURN row.ref AS reference, id(n) AS id",
                    label_list(labels)
                ),
                rows.iter().map(create_node_row).collect::<Vec<_>>(),
            ),
            Statement::UpdateNodes { labels, removed_labels, rows } => {
                let mut cypher = String::from("UNWIND $rows AS row MATCH (n) WHERE id(n) = row.id");
                if !removed_labels.is_empty() {
                    cypher.push_str(&format!(" REMOVE n{}", label_list(removed_labels)));
                }
                if !labels.is_empty() {
                    cypher.push_str(&format!(" SET n{}", label_list(labels)));
                }
                cypher.push_str(" SET n += row.props");
                (cypher, rows.iter().map(|r| update_node_row(r, ids)).collect::<Result<Vec<_>, _>>()?)
            }
            Statement::DeleteRelationships { relationship_type, rows } => (
                format!(
                    "UNWIND $rows AS row MATCH (startNode)-[rel:{}]->(endNode) \
                     WHERE id(startNode) = row.startNodeId AND id(endNode) = row.endNodeId DELETE rel",
                    escape(relationship_type)
                ),
                rows.iter()
                    .map(|r| endpoint_row(r, ids, false))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Statement::DeleteRelationshipEntities { rows } => (
                "UNWIND $rows AS row MATCH ()-[rel]->() WHERE id(rel) = row.id DELETE rel".to_owned(),
                rows.iter()
                    .map(|r| relationship_id_row(r, false))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Statement::CreateRelationships { relationship_type, rows } => (
                format!(
                    "UNWIND $rows AS row MATCH (startNode) WHERE id(startNode) = row.startNodeId \
                     WITH row, startNode MATCH (endNode) WHERE id(endNode) = row.endNodeId \
                     CREATE (startNode)-[rel:{}]->(endNode) SET rel += row.props \
                     RETURN row.ref AS reference, id(rel) AS id",
                    escape(relationship_type)
                ),
                rows.iter()
                    .map(|r| endpoint_row(r, ids, true))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Statement::UpdateRelationships { rows } => (
                "UNWIND $rows AS row MATCH ()-[rel]->() WHERE id(rel) = row.id SET rel += row.props".to_owned(),
                rows.iter()
                    .map(|r| relationship_id_row(r, true))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Statement::DeleteNodes { rows } => (
                "UNWIND $rows AS row MATCH (n) WHERE id(n) = row.id DETACH DELETE n".to_owned(),
                rows.iter()
                    .map(|r| Ok(map(vec![("id", ids.resolve_node(r.reference)?.into())])))
                    .collect::<Result<Vec<_>, GraftError>>()?,
            ),
        };

        let mut parameters = BTreeMap::new();
        parameters.insert("rows".to_owned(), value::to_bolt_list(rows));
        Ok(RenderedStatement { cypher, parameters })
    }
}

/// Quote a label or relationship type with backticks.
pub fn escape(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn label_list(labels: &[String]) -> String {
    labels.iter().map(|l| format!(":{}", escape(l))).collect()
}

fn map(entries: Vec<(&str, Value)>) -> Value {
    let value: HashMap<neo4rs::BoltString, Value> = entries
        .into_iter()
        .map(|(k, v)| (neo4rs::BoltString::from(k), v))
        .collect();
    Value::Map(neo4rs::BoltMap { value })
}

fn create_node_row(row: &NodeRow) -> Value {
    map(vec![
        ("ref", row.reference.to_param().into()),
        ("props", value::to_bolt_map(&row.properties)),
    ])
}

fn update_node_row(row: &NodeRow, ids: &IdAssignments) -> Result<Value, GraftError> {
    Ok(map(vec![
        ("id", ids.resolve_node(row.reference)?.into()),
        ("props", value::to_bolt_map(&row.properties)),
    ]))
}

fn endpoint_row(row: &RelationshipRow, ids: &IdAssignments, create: bool) -> Result<Value, GraftError> {
    let mut entries: Vec<(&str, Value)> = vec![
        ("startNodeId", ids.resolve_node(row.start)?.into()),
        ("endNodeId", ids.resolve_node(row.end)?.into()),
    ];
    if create {
        let reference = row
            .reference
            .ok_or_else(|| GraftError::UnresolvedReference("relationship create without a reference".into()))?;
        entries.push(("ref", reference.to_param().into()));
        entries.push(("props", value::to_bolt_map(&row.properties)));
    }
    Ok(map(entries))
}

fn relationship_id_row(row: &RelationshipRow, with_props: bool) -> Result<Value, GraftError> {
    let id = row
        .reference
        .and_then(|r| r.existing_id())
        .ok_or_else(|| GraftError::UnresolvedReference(format!("relationship {:?} has no id", row.reference)))?;
    let mut entries: Vec<(&str, Value)> = vec![("id", id.into())];
    if with_props {
        entries.push(("props", value::to_bolt_map(&row.properties)));
    }
    Ok(map(entries))
}
