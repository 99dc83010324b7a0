//! Dirty-check snapshots.
//!
//! A snapshot holds what an entity looked like when it was last registered:
//! its mapped properties (never the identity field) and its dynamic labels.
//! Values are compared exactly rather than through a hash.

use std::collections::BTreeSet;

use crate::metadata::ClassInfo;
use crate::traits::GraphEntity;
use crate::value::{self, PropertyMap};

/// Which registry an [`EntityKey`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Node,
    Relationship,
}

/// Registry key: node id 1 and relationship id 1 are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: KeyKind,
    pub type_name: String,
    pub id: i64,
}

impl EntityKey {
    pub fn node(type_name: impl Into<String>, id: i64) -> Self {
        Self { kind: KeyKind::Node, type_name: type_name.into(), id }
    }

    pub fn relationship(type_name: impl Into<String>, id: i64) -> Self {
        Self { kind: KeyKind::Relationship, type_name: type_name.into(), id }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    properties: PropertyMap,
    labels: BTreeSet<String>,
}

/// What changed between a registered snapshot and the live entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    /// Changed or added properties, plus `Null` for removed ones.
    pub properties: PropertyMap,
    pub added_labels: BTreeSet<String>,
    pub removed_labels: BTreeSet<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.added_labels.is_empty() && self.removed_labels.is_empty()
    }
}

impl Snapshot {
    /// Read the current state of `entity` as described by `info`.
    ///
    /// Properties whose value is absent or `null` are left out.
    pub fn capture(entity: &dyn GraphEntity, info: &ClassInfo) -> Self {
        let identity = info.identity_field();
        let properties = info
            .properties()
            .iter()
            .filter(|p| Some(p.field.as_str()) != identity)
            .filter_map(|p| {
                entity
                    .property(&p.field)
                    .filter(|v| !value::is_null(v))
                    .map(|v| (p.property.clone(), v))
            })
            .collect();
        let labels = entity
            .labels()
            .into_iter()
            .filter(|l| !info.labels().contains(l))
            .collect();
        Self { properties, labels }
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Dynamic labels at the time of the snapshot.
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Compare against a newer snapshot of the same entity.
    pub fn diff(&self, current: &Snapshot) -> SnapshotDiff {
        let mut properties = PropertyMap::new();
        for (name, v) in &current.properties {
            if self.properties.get(name) != Some(v) {
                properties.insert(name.clone(), v.clone());
            }
        }
        for name in self.properties.keys() {
            if !current.properties.contains_key(name) {
                properties.insert(name.clone(), value::null());
            }
        }
        SnapshotDiff {
            properties,
            added_labels: current.labels.difference(&self.labels).cloned().collect(),
            removed_labels: self.labels.difference(&current.labels).cloned().collect(),
        }
    }
}
