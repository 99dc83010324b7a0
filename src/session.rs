//! Saving object graphs through a [`neo4rs::Graph`].

use std::sync::Arc;

use neo4rs::{Graph, Txn};
use tracing::{info, warn};

use graft_core::compile::CompileContext;
use graft_core::compiler::{deletion_statements, Statement};
use graft_core::config::MappingConfig;
use graft_core::context::MappingContext;
use graft_core::cypher::{CypherStatementFactory, StatementFactory};
use graft_core::error::GraftError;
use graft_core::mapper::{Depth, EntityGraphMapper};
use graft_core::metadata::MetaData;
use graft_core::reconcile::IdAssignments;
use graft_core::traits::{EntityRef, EntityType};

use crate::query::GraftQuery;
use crate::FromRow;

/// Row returned by every create statement.
#[derive(Debug, FromRow)]
struct CreatedRow {
    reference: i64,
    id: i64,
}

/// What a save wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub statements: usize,
    pub nodes_created: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
}

/// A unit of work against one database.
///
/// A session owns a [`MappingContext`], so it remembers what it has saved
/// and only writes what changed on the next save. Entity graphs are
/// `Rc`-based, which keeps a session on one thread; run it on a
/// current-thread runtime or inside a `LocalSet`.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use graft::prelude::*;
/// # use graft::session::Session;
/// # #[derive(NodeEntity)]
/// # #[graft(label = "Student", label = "DomainObject")]
/// # struct Student { #[graft(id)] id: Option<i64>, name: String }
/// # async fn example(graph: neo4rs::Graph) -> Result<(), GraftError> {
/// let metadata = Arc::new(MetaData::builder().register::<Student>().build()?);
/// let mut session = Session::new(graph, metadata);
///
/// let gary = shared(Student { id: None, name: "Gary".into() });
/// session.save(&(gary.clone() as EntityRef)).await?;
/// assert!(gary.borrow().id.is_some());
/// # Ok(())
/// # }
/// ```
pub struct Session {
    graph: Graph,
    context: MappingContext,
    config: MappingConfig,
    factory: CypherStatementFactory,
}

impl Session {
    pub fn new(graph: Graph, metadata: Arc<MetaData>) -> Self {
        Self::with_config(graph, metadata, MappingConfig::default())
    }

    pub fn with_config(graph: Graph, metadata: Arc<MetaData>, config: MappingConfig) -> Self {
        Self {
            graph,
            context: MappingContext::new(metadata),
            config,
            factory: CypherStatementFactory,
        }
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Register an entity loaded elsewhere so later saves diff against it.
    pub fn attach(&mut self, entity: &EntityRef) -> Result<EntityRef, GraftError> {
        self.context.add_node_entity(entity)
    }

    /// Register a loaded plain edge.
    pub fn attach_edge(&mut self, start: &EntityRef, relationship_type: &str, end: &EntityRef) -> Result<(), GraftError> {
        self.context.attach_edge(start, relationship_type, end)?;
        Ok(())
    }

    /// Register a loaded relationship entity and its endpoints.
    pub fn attach_relationship(&mut self, rel: &EntityRef) -> Result<(), GraftError> {
        self.context.attach_relationship_entity(rel)
    }

    /// Forget every entity of type `T` and the edges touching them.
    pub fn evict_type<T: EntityType>(&mut self) {
        self.context.remove_type(T::TYPE_NAME);
    }

    /// Forget everything this session has seen.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    /// Map and compile without touching the database.
    pub fn compile(&self, root: &EntityRef, depth: impl Into<Depth>) -> Result<(CompileContext, Vec<Statement>), GraftError> {
        let compiled = EntityGraphMapper::new(&self.context).map_with_depth(root, depth)?;
        let statements = compiled.statements_with(self.config.batching_mode());
        Ok((compiled, statements))
    }

    /// Save everything reachable from `root`, up to the configured depth.
    pub async fn save(&mut self, root: &EntityRef) -> Result<SaveSummary, GraftError> {
        let depth = self.config.depth();
        self.save_all(std::slice::from_ref(root), depth).await
    }

    pub async fn save_with_depth(&mut self, root: &EntityRef, depth: impl Into<Depth>) -> Result<SaveSummary, GraftError> {
        self.save_all(std::slice::from_ref(root), depth).await
    }

    /// Save several roots in one transaction.
    ///
    /// Mapping errors surface before a transaction is opened. If any
    /// statement fails the transaction is rolled back and the mapping context
    /// is left as it was.
    pub async fn save_all(&mut self, roots: &[EntityRef], depth: impl Into<Depth>) -> Result<SaveSummary, GraftError> {
        let compiled = EntityGraphMapper::new(&self.context).map_all(roots, depth)?;
        let statements = compiled.statements_with(self.config.batching_mode());
        if statements.is_empty() {
            return Ok(SaveSummary::default());
        }

        let mut txn = self.graph.start_txn().await?;
        let ids = match self.execute(&mut txn, &statements).await {
            Ok(ids) => ids,
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "rollback after failed save also failed");
                }
                return Err(err);
            }
        };
        txn.commit().await?;

        self.context.apply_save(&compiled, &ids)?;
        let summary = SaveSummary {
            statements: statements.len(),
            nodes_created: ids.node_count(),
            relationships_created: ids.relationship_count(),
            relationships_deleted: compiled.deleted_relationships().len(),
        };
        info!(
            statements = summary.statements,
            nodes_created = summary.nodes_created,
            relationships_created = summary.relationships_created,
            relationships_deleted = summary.relationships_deleted,
            "save committed"
        );
        Ok(summary)
    }

    /// Delete entities from the database and forget them.
    ///
    /// Nodes are detached from every relationship before they are deleted.
    /// Relationship entities delete only the relationship they stand for.
    /// Deleted entities lose their native id, so saving one again creates it
    /// anew.
    pub async fn delete_all(&mut self, entities: &[EntityRef]) -> Result<usize, GraftError> {
        let statements = deletion_statements(self.context.metadata(), entities)?;
        if statements.is_empty() {
            return Ok(0);
        }

        let mut txn = self.graph.start_txn().await?;
        if let Err(err) = self.execute(&mut txn, &statements).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "rollback after failed delete also failed");
            }
            return Err(err);
        }
        txn.commit().await?;

        for entity in entities {
            self.context.remove_entity(entity);
            entity.borrow_mut().set_native_id(None);
        }
        info!(deleted = entities.len(), "delete committed");
        Ok(entities.len())
    }

    pub async fn delete(&mut self, entity: &EntityRef) -> Result<usize, GraftError> {
        self.delete_all(std::slice::from_ref(entity)).await
    }

    /// Delete every entity of type `T` this session knows about.
    pub async fn delete_type<T: EntityType>(&mut self) -> Result<usize, GraftError> {
        let entities = self.context.entities_of(T::TYPE_NAME);
        self.delete_all(&entities).await
    }

    async fn execute(&self, txn: &mut Txn, statements: &[Statement]) -> Result<IdAssignments, GraftError> {
        let mut ids = IdAssignments::new();
        for statement in statements {
            let query = GraftQuery::from(self.factory.render(statement, &ids)?);
            match statement {
                Statement::CreateNodes { .. } => {
                    for row in query.fetch_all_in::<CreatedRow>(txn).await? {
                        ids.record_node(row.reference, row.id)?;
                    }
                }
                Statement::CreateRelationships { .. } => {
                    for row in query.fetch_all_in::<CreatedRow>(txn).await? {
                        ids.record_relationship(row.reference, row.id)?;
                    }
                }
                _ => query.run_in(txn).await?,
            }
        }
        Ok(ids)
    }
}
