//! Edges known to a mapping context.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// An edge known to the session, because it was loaded or because an
/// earlier save created it.
///
/// Equality, hashing and ordering look at `(start, type, end, relationship id)`
/// only. The endpoint type names are carried so deletion scopes can be
/// narrowed to the other end's type.
#[derive(Debug, Clone)]
pub struct MappedRelationship {
    start_node_id: i64,
    relationship_type: String,
    end_node_id: i64,
    relationship_id: Option<i64>,
    start_type: String,
    end_type: String,
}

impl MappedRelationship {
    pub fn new(
        start_node_id: i64,
        relationship_type: impl Into<String>,
        end_node_id: i64,
        start_type: impl Into<String>,
        end_type: impl Into<String>,
    ) -> Self {
        Self {
            start_node_id,
            relationship_type: relationship_type.into(),
            end_node_id,
            relationship_id: None,
            start_type: start_type.into(),
            end_type: end_type.into(),
        }
    }

    /// Attach the id of the relationship entity backing this edge.
    pub fn with_relationship_id(mut self, id: i64) -> Self {
        self.relationship_id = Some(id);
        self
    }

    pub(crate) fn without_relationship_id(mut self) -> Self {
        self.relationship_id = None;
        self
    }

    pub fn start_node_id(&self) -> i64 {
        self.start_node_id
    }

    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    pub fn end_node_id(&self) -> i64 {
        self.end_node_id
    }

    pub fn relationship_id(&self) -> Option<i64> {
        self.relationship_id
    }

    pub fn start_type(&self) -> &str {
        &self.start_type
    }

    pub fn end_type(&self) -> &str {
        &self.end_type
    }

    /// Whether the edge touches the node with the given native id.
    pub fn touches(&self, node_id: i64) -> bool {
        self.start_node_id == node_id || self.end_node_id == node_id
    }

    fn key(&self) -> (i64, &str, i64, Option<i64>) {
        (self.start_node_id, &self.relationship_type, self.end_node_id, self.relationship_id)
    }
}

impl PartialEq for MappedRelationship {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MappedRelationship {}

impl Hash for MappedRelationship {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for MappedRelationship {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MappedRelationship {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
