use neo4rs::{Graph, Query, Txn, BoltType as Value};
use graft_core::cypher::RenderedStatement;
use graft_core::traits::FromRow;
use graft_core::error::GraftError;

/// A typed query wrapper around [`neo4rs::Query`].
///
/// Provides a builder-style `.param()` API and typed fetch helpers that
/// automatically map rows via [`FromRow`]. Rendered save statements convert
/// into a `GraftQuery` with [`From`].
///
/// # Examples
///
/// ```rust,no_run
/// # use graft::query::GraftQuery;
/// # async fn example(graph: &neo4rs::Graph) -> Result<(), graft::GraftError> {
/// let query = GraftQuery::new("MATCH (s:Student {name: $name}) RETURN id(s) AS id")
///     .param("name", "Gary");
/// # Ok(())
/// # }
/// ```
pub struct GraftQuery {
    inner: Query,
}

impl GraftQuery {
    /// Create a new query from a Cypher string.
    pub fn new(query: impl Into<String>) -> Self {
        let q: String = query.into();
        Self { inner: neo4rs::query(&q) }
    }

    /// Bind a named parameter. Accepts any type that converts to `BoltType`.
    ///
    /// ```rust,no_run
    /// # use graft::query::GraftQuery;
    /// let q = GraftQuery::new("MATCH (s:Student) WHERE id(s) = $id RETURN s")
    ///     .param("id", 30_i64);
    /// ```
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let k: String = key.into();
        self.inner = self.inner.param(&k, value.into());
        self
    }

    /// Execute against a [`Graph`] and collect all rows into `Vec<T>`.
    pub async fn fetch_all<T: FromRow>(self, graph: &Graph) -> Result<Vec<T>, GraftError> {
        let mut stream = graph.execute(self.inner).await?;
        let mut out = Vec::new();
        while let Some(row) = stream.next().await? {
            out.push(T::from_record(&row)?);
        }
        Ok(out)
    }

    /// Execute within a [`Txn`] and collect all rows into `Vec<T>`.
    ///
    /// Like [`fetch_all`](Self::fetch_all) but runs inside an existing
    /// transaction. The stream is driven through `txn.handle()`.
    pub async fn fetch_all_in<T: FromRow>(self, txn: &mut Txn) -> Result<Vec<T>, GraftError> {
        let mut stream = txn.execute(self.inner).await?;
        let mut out = Vec::new();
        while let Some(row) = stream.next(txn.handle()).await? {
            out.push(T::from_record(&row)?);
        }
        Ok(out)
    }

    /// Execute within a [`Txn`], discarding any result rows.
    pub async fn run_in(self, txn: &mut Txn) -> Result<(), GraftError> {
        txn.run(self.inner).await?;
        Ok(())
    }
}

impl From<RenderedStatement> for GraftQuery {
    fn from(statement: RenderedStatement) -> Self {
        statement
            .parameters
            .into_iter()
            .fold(GraftQuery::new(statement.cypher), |q, (k, v)| q.param(k, v))
    }
}

/// Convenience constructor, equivalent to [`GraftQuery::new`].
///
/// ```rust,no_run
/// # use graft::query;
/// let q = query::query("MATCH (s:Student) RETURN s");
/// ```
pub fn query(q: impl Into<String>) -> GraftQuery {
    GraftQuery::new(q)
}
