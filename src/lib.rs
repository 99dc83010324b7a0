#![doc = r#"
An object-graph mapper for Neo4j in Rust.

`graft` saves graphs of plain Rust structs to Neo4j and remembers what it
saved, so the next save only writes what changed: new nodes, changed
properties, new edges, and edges that disappeared from a relationship field.
Built on [`neo4rs`] 0.8.

# Quick start

## Define entities

```rust
use graft::prelude::*;

#[derive(NodeEntity)]
#[graft(label = "Student", label = "DomainObject")]
struct Student {
    #[graft(id)]
    id: Option<i64>,
    name: String,
}

#[derive(NodeEntity)]
struct Course {
    #[graft(id)]
    id: Option<i64>,
    name: String,
    #[graft(rel = "STUDENTS")]
    students: Vec<Shared<Student>>,
}
```

Relationship fields hold [`Shared<T>`] handles (`Rc<RefCell<T>>`), so two
fields pointing at the same student really point at the same student, and
cyclic graphs are fine.

## Register the types

```rust
# use graft::prelude::*;
# #[derive(NodeEntity)]
# #[graft(label = "Student", label = "DomainObject")]
# struct Student { #[graft(id)] id: Option<i64>, name: String }
# #[derive(NodeEntity)]
# struct Course { #[graft(id)] id: Option<i64>, name: String,
#     #[graft(rel = "STUDENTS")] students: Vec<Shared<Student>> }
let metadata = MetaData::builder()
    .register::<Student>()
    .register::<Course>()
    .build()
    .unwrap();
```

## See what a save would write

```rust
# use std::sync::Arc;
# use graft::prelude::*;
# #[derive(NodeEntity)]
# #[graft(label = "Student", label = "DomainObject")]
# struct Student { #[graft(id)] id: Option<i64>, name: String }
let metadata = Arc::new(MetaData::builder().register::<Student>().build().unwrap());
let context = MappingContext::new(metadata);

let gary: EntityRef = shared(Student { id: None, name: "Gary".into() });
let compiled = EntityGraphMapper::new(&context).map(&gary).unwrap();
let statements = compiled.statements();
assert_eq!(statements.len(), 1);
```

## Save

```rust,no_run
# use std::sync::Arc;
# use graft::prelude::*;
# use graft::session::Session;
# #[derive(NodeEntity)]
# #[graft(label = "Student", label = "DomainObject")]
# struct Student { #[graft(id)] id: Option<i64>, name: String }
# async fn example(graph: neo4rs::Graph) -> Result<(), GraftError> {
let metadata = Arc::new(MetaData::builder().register::<Student>().build()?);
let mut session = Session::new(graph, metadata);

let gary = shared(Student { id: None, name: "Gary".into() });
session.save(&(gary.clone() as EntityRef)).await?;

gary.borrow_mut().name = "Gary B.".into();
session.save(&(gary.clone() as EntityRef)).await?; // one property update
# Ok(())
# }
```

# Depth

`save_with_depth(root, depth)` follows at most `depth` relationship hops.
At depth 0 only the root's own labels and properties are written; no edges
are created or deleted. Negative depths (and [`Depth::Unbounded`]) follow
everything reachable.

# Error handling

Every operation returns [`GraftError`]. Mapping errors, such as a
relationship entity with no end node, are raised before anything is sent to
the database:

```text
relationship entity HAS_TOPIC cannot have a missing end node
```

[`neo4rs`]: https://docs.rs/neo4rs
[`Shared<T>`]: graft_core::Shared
[`Depth::Unbounded`]: graft_core::Depth::Unbounded
[`GraftError`]: graft_core::GraftError
"#]

pub mod prelude;
pub mod query;
pub mod session;

pub use graft_core as core;
pub use graft_macros::{FromRow, NodeEntity, RelationshipEntity};

pub use graft_core::traits::{EntityType as EntityTypeTrait, FromRow as FromRowTrait, GraphEntity};
pub use graft_core::GraftError;
