mod common;

use common::*;
use graft_core::compile::{NodeRef, RelRef};
use graft_core::compiler::{deletion_statements, Compiler, NodeRow, RelationshipRow, Statement};
use graft_core::config::Batching;
use graft_core::cypher::{escape, CypherStatementFactory, StatementFactory};
use graft_core::reconcile::IdAssignments;
use graft_core::{EntityGraphMapper, FromGraphValue, GraftError, PropertyMap};
use neo4rs::BoltType;

fn rows_of(statement: &graft_core::cypher::RenderedStatement) -> Vec<std::collections::HashMap<String, BoltType>> {
    let rows = statement.parameters.get("rows").cloned().unwrap();
    Vec::<std::collections::HashMap<String, BoltType>>::from_value(rows).unwrap()
}

fn kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::CreateNodes { .. } => "create-nodes",
        Statement::UpdateNodes { .. } => "update-nodes",
        Statement::DeleteRelationships { .. } => "delete-relationships",
        Statement::DeleteRelationshipEntities { .. } => "delete-relationship-entities",
        Statement::CreateRelationships { .. } => "create-relationships",
        Statement::UpdateRelationships { .. } => "update-relationships",
        Statement::DeleteNodes { .. } => "delete-nodes",
    }
}

#[test]
fn test_statement_order() {
    let mut context = context();
    let mut store = FakeStore::new();

    let maths = Course::new("Maths");
    let gary = Student::new("Gary");
    let mary = Student::new("Mary");
    maths.borrow_mut().students = vec![gary.clone(), mary.clone()];
    let forum = Forum::new("Rust");
    let topic = Topic::new("Ownership");
    let link = TopicLink::new(&forum, &topic, 1);
    let stale = TopicLink::new(&forum, &Topic::new("Stale"), 1);
    forum.borrow_mut().topics = vec![link.clone(), stale.clone()];
    store.save(&mut context, &[entity(&maths), entity(&forum)], -1);

    maths.borrow_mut().name = "Applied Maths".into();
    maths.borrow_mut().students = vec![gary.clone(), Student::new("Sue")];
    link.borrow_mut().weight = 2;
    forum.borrow_mut().topics = vec![link.clone()];

    let compiled = EntityGraphMapper::new(&context)
        .map_all(&[entity(&maths), entity(&forum)], -1)
        .unwrap();
    let kinds: Vec<_> = compiled.statements().iter().map(kind).collect();

    assert_eq!(
        kinds,
        [
            "create-nodes",
            "update-nodes",
            "delete-relationships",
            "delete-relationship-entities",
            "create-relationships",
            "update-relationships",
        ]
    );
}

#[test]
fn test_batching_by_shape_and_per_row() {
    let context = context();
    let course = Course::new("Maths");
    course.borrow_mut().students = vec![Student::new("Gary"), Student::new("Mary"), Student::new("Sue")];

    let compiled = EntityGraphMapper::new(&context).map(&entity(&course)).unwrap();

    let by_shape = Compiler::new(Batching::ByShape).compile(&compiled);
    let kinds: Vec<_> = by_shape.iter().map(|s| (kind(s), s.len())).collect();
    assert_eq!(kinds, [("create-nodes", 1), ("create-nodes", 3), ("create-relationships", 3)]);

    let per_row = Compiler::new(Batching::PerRow).compile(&compiled);
    assert_eq!(per_row.len(), 7);
    assert!(per_row.iter().all(|s| s.len() == 1));
}

#[test]
fn test_compiling_twice_gives_the_same_statements() {
    let context = context();
    let course = Course::new("Maths");
    course.borrow_mut().students = vec![Student::new("Gary")];
    let compiled = EntityGraphMapper::new(&context).map(&entity(&course)).unwrap();

    assert_eq!(compiled.statements(), compiled.statements());
}

#[test]
fn test_render_create_nodes() {
    let mut props = PropertyMap::new();
    props.insert("name".into(), BoltType::from("Gary"));
    let statement = Statement::CreateNodes {
        labels: vec!["Student".into(), "DomainObject".into()],
        rows: vec![NodeRow { reference: NodeRef::New(0), properties: props }],
    };

    let rendered = CypherStatementFactory.render(&statement, &IdAssignments::new()).unwrap();

    assert_eq!(
        rendered.cypher,
        "UNWIND $rows AS row CREATE (n:`Student`:`DomainObject`) SET n = row.props \
         RETURN row.ref AS reference, id(n) AS id"
    );
    let rows = rows_of(&rendered);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("ref"), Some(&BoltType::from(-1_i64)));
    let props = std::collections::HashMap::<String, String>::from_value(rows[0]["props"].clone()).unwrap();
    assert_eq!(props.get("name").map(String::as_str), Some("Gary"));
}

#[test]
fn test_render_update_nodes_with_removed_labels() {
    let statement = Statement::UpdateNodes {
        labels: vec!["Student".into()],
        removed_labels: vec!["Senior".into()],
        rows: vec![NodeRow { reference: NodeRef::Existing(4), properties: PropertyMap::new() }],
    };

    let rendered = CypherStatementFactory.render(&statement, &IdAssignments::new()).unwrap();

    assert_eq!(
        rendered.cypher,
        "UNWIND $rows AS row MATCH (n) WHERE id(n) = row.id REMOVE n:`Senior` SET n:`Student` SET n += row.props"
    );
    assert_eq!(rows_of(&rendered)[0].get("id"), Some(&BoltType::from(4_i64)));
}

#[test]
fn test_render_create_relationships_resolves_new_nodes() {
    let statement = Statement::CreateRelationships {
        relationship_type: "STUDENTS".into(),
        rows: vec![RelationshipRow {
            reference: Some(RelRef::New(0)),
            start: NodeRef::New(0),
            end: NodeRef::Existing(9),
            properties: PropertyMap::new(),
        }],
    };
    let mut ids = IdAssignments::new();
    ids.record_node(-1, 21).unwrap();

    let rendered = CypherStatementFactory.render(&statement, &ids).unwrap();

    assert!(rendered.cypher.contains("CREATE (startNode)-[rel:`STUDENTS`]->(endNode)"));
    let row = &rows_of(&rendered)[0];
    assert_eq!(row.get("startNodeId"), Some(&BoltType::from(21_i64)));
    assert_eq!(row.get("endNodeId"), Some(&BoltType::from(9_i64)));
    assert_eq!(row.get("ref"), Some(&BoltType::from(-1_i64)));
}

#[test]
fn test_render_fails_on_unresolved_node() {
    let statement = Statement::CreateRelationships {
        relationship_type: "STUDENTS".into(),
        rows: vec![RelationshipRow {
            reference: Some(RelRef::New(0)),
            start: NodeRef::New(3),
            end: NodeRef::Existing(9),
            properties: PropertyMap::new(),
        }],
    };

    let err = CypherStatementFactory.render(&statement, &IdAssignments::new()).unwrap_err();
    assert!(matches!(err, GraftError::UnresolvedReference(ref r) if r == "new-node#3"));
}

#[test]
fn test_render_deletes() {
    let plain = Statement::DeleteRelationships {
        relationship_type: "STUDENTS".into(),
        rows: vec![RelationshipRow {
            reference: None,
            start: NodeRef::Existing(1),
            end: NodeRef::Existing(2),
            properties: PropertyMap::new(),
        }],
    };
    let rendered = CypherStatementFactory.render(&plain, &IdAssignments::new()).unwrap();
    assert!(rendered.cypher.starts_with("UNWIND $rows AS row MATCH (startNode)-[rel:`STUDENTS`]->(endNode)"));
    assert!(rendered.cypher.ends_with("DELETE rel"));

    let by_id = Statement::DeleteRelationshipEntities {
        rows: vec![RelationshipRow {
            reference: Some(RelRef::Existing(30)),
            start: NodeRef::Existing(1),
            end: NodeRef::Existing(2),
            properties: PropertyMap::new(),
        }],
    };
    let rendered = CypherStatementFactory.render(&by_id, &IdAssignments::new()).unwrap();
    assert_eq!(rendered.cypher, "UNWIND $rows AS row MATCH ()-[rel]->() WHERE id(rel) = row.id DELETE rel");
    assert_eq!(rows_of(&rendered)[0].get("id"), Some(&BoltType::from(30_i64)));
}

#[test]
fn test_escape_quotes_backticks() {
    assert_eq!(escape("Student"), "`Student`");
    assert_eq!(escape("Odd`Label"), "`Odd``Label`");
    assert_eq!(escape("HAS TOPIC"), "`HAS TOPIC`");
}

#[test]
fn test_id_assignments_round_trip_references() {
    let mut ids = IdAssignments::new();
    ids.record_node(NodeRef::New(4).to_param(), 40).unwrap();
    ids.record_relationship(RelRef::New(2).to_param(), 20).unwrap();

    assert_eq!(ids.resolve_node(NodeRef::New(4)).unwrap(), 40);
    assert_eq!(ids.resolve_node(NodeRef::Existing(7)).unwrap(), 7);
    assert_eq!(ids.resolve_relationship(RelRef::New(2)).unwrap(), 20);
    assert!(ids.resolve_relationship(RelRef::New(0)).is_err());
    assert!(ids.record_node(5, 50).is_err());
    assert_eq!(NodeRef::from_param(-5), NodeRef::New(4));
}

#[test]
fn test_empty_context_compiles_to_nothing() {
    let compiled = graft_core::CompileContext::new();
    assert!(compiled.is_empty());
    assert!(Compiler::default().compile(&compiled).is_empty());
}

#[test]
fn test_deletion_statements() {
    let forum = Forum::new("Rust");
    forum.borrow_mut().id = Some(1);
    let topic = Topic::new("Traits");
    topic.borrow_mut().id = Some(2);
    let link = TopicLink::new(&forum, &topic, 1);
    link.borrow_mut().id = Some(30);

    let statements = deletion_statements(&metadata(), &[entity(&topic), entity(&link), entity(&forum)]).unwrap();
    assert_eq!(statements.iter().map(kind).collect::<Vec<_>>(), ["delete-relationship-entities", "delete-nodes"]);
    assert_eq!(statements[1].len(), 2);
    assert!(statements.iter().all(Statement::is_delete));

    let rendered = CypherStatementFactory.render(&statements[1], &IdAssignments::new()).unwrap();
    assert_eq!(rendered.cypher, "UNWIND $rows AS row MATCH (n) WHERE id(n) = row.id DETACH DELETE n");
    let ids: Vec<_> = rows_of(&rendered).iter().map(|r| r.get("id").cloned()).collect();
    assert_eq!(ids, [Some(BoltType::from(2_i64)), Some(BoltType::from(1_i64))]);
}

#[test]
fn test_deletion_statements_require_persisted_entities() {
    let err = deletion_statements(&metadata(), &[entity(&Student::new("Gary"))]).unwrap_err();
    assert!(matches!(err, GraftError::NotPersisted { ref type_name } if type_name == "Student"));

    let topic = Topic::new("Traits");
    topic.borrow_mut().id = Some(2);
    let link = TopicLink::new(&Forum::new("Rust"), &topic, 1);
    link.borrow_mut().id = Some(30);
    let err = deletion_statements(&metadata(), &[entity(&link)]).unwrap_err();
    assert!(matches!(err, GraftError::NotPersisted { ref type_name } if type_name == "Forum"));
}
