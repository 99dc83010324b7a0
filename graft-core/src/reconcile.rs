//! Native ids reported back by executed create statements.

use std::collections::HashMap;

use crate::compile::{NodeRef, RelRef};
use crate::error::GraftError;

/// Ids assigned to the nodes and relationships created by one save, keyed by
/// their compile-time reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAssignments {
    nodes: HashMap<u32, i64>,
    relationships: HashMap<u32, i64>,
}

impl IdAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id of a created node from the `reference` column of a
    /// create statement. Non-negative references are not new nodes.
    pub fn record_node(&mut self, reference: i64, id: i64) -> Result<(), GraftError> {
        match NodeRef::from_param(reference) {
            NodeRef::New(n) => {
                self.nodes.insert(n, id);
                Ok(())
            }
            NodeRef::Existing(_) => Err(GraftError::UnresolvedReference(format!(
                "{reference} is not a new node reference"
            ))),
        }
    }

    pub fn record_relationship(&mut self, reference: i64, id: i64) -> Result<(), GraftError> {
        if reference >= 0 {
            return Err(GraftError::UnresolvedReference(format!(
                "{reference} is not a new relationship reference"
            )));
        }
        self.relationships.insert((-(reference + 1)) as u32, id);
        Ok(())
    }

    /// Assign directly by reference.
    pub fn assign_node(&mut self, reference: NodeRef, id: i64) {
        if let NodeRef::New(n) = reference {
            self.nodes.insert(n, id);
        }
    }

    pub fn assign_relationship(&mut self, reference: RelRef, id: i64) {
        if let RelRef::New(n) = reference {
            self.relationships.insert(n, id);
        }
    }

    /// The native id behind a node reference.
    pub fn resolve_node(&self, reference: NodeRef) -> Result<i64, GraftError> {
        match reference {
            NodeRef::Existing(id) => Ok(id),
            NodeRef::New(n) => self
                .nodes
                .get(&n)
                .copied()
                .ok_or_else(|| GraftError::UnresolvedReference(reference.to_string())),
        }
    }

    pub fn resolve_relationship(&self, reference: RelRef) -> Result<i64, GraftError> {
        match reference {
            RelRef::Existing(id) => Ok(id),
            RelRef::New(n) => self
                .relationships
                .get(&n)
                .copied()
                .ok_or_else(|| GraftError::UnresolvedReference(reference.to_string())),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}
