//! Hand-written entities shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use graft_core::compile::{CompileContext, NodeMutation, RelRef, RelationshipMutation};
use graft_core::metadata::{ClassInfo, Direction, MetaData, RelationshipField};
use graft_core::reconcile::IdAssignments;
use graft_core::{shared, EntityRef, EntityType, GraphEntity, MappingContext, Relatable, Shared};
use neo4rs::BoltType;

// --- Student / Course ---

#[derive(Default)]
pub struct Student {
    pub id: Option<i64>,
    pub name: String,
    pub nickname: Option<String>,
    pub tags: Vec<String>,
}

impl Student {
    pub fn new(name: &str) -> Shared<Student> {
        shared(Student { name: name.into(), ..Default::default() })
    }
}

impl GraphEntity for Student {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "name" => Some(self.name.clone().into()),
            "nickname" => self.nickname.clone().map(Into::into),
            _ => None,
        }
    }
    fn labels(&self) -> Vec<String> {
        self.tags.clone()
    }
}

impl EntityType for Student {
    const TYPE_NAME: &'static str = "Student";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Student")
            .label("Student")
            .label("DomainObject")
            .identity("id")
            .property("name", "name")
            .property("nickname", "nickname")
            .primary_index("name")
            .label_field("tags")
    }
}

#[derive(Default)]
pub struct Course {
    pub id: Option<i64>,
    pub name: String,
    pub students: Vec<Shared<Student>>,
}

impl Course {
    pub fn new(name: &str) -> Shared<Course> {
        shared(Course { name: name.into(), ..Default::default() })
    }
}

impl GraphEntity for Course {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
    fn related(&self, field: &str) -> Vec<EntityRef> {
        match field {
            "students" => self.students.refs(),
            _ => Vec::new(),
        }
    }
}

impl EntityType for Course {
    const TYPE_NAME: &'static str = "Course";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Course")
            .label("Course")
            .identity("id")
            .property("name", "name")
            .relationship(
                RelationshipField::new("students", Student::TYPE_NAME, true).relationship_type("STUDENTS"),
            )
    }
}

// --- Person: directed both ways plus an undirected field ---

#[derive(Default)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub knows: Vec<Shared<Person>>,
    pub known_by: Vec<Shared<Person>>,
    pub friends: Vec<Shared<Person>>,
    pub employer: Option<Shared<Company>>,
}

impl Person {
    pub fn new(name: &str) -> Shared<Person> {
        shared(Person { name: name.into(), ..Default::default() })
    }
}

impl GraphEntity for Person {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
    fn related(&self, field: &str) -> Vec<EntityRef> {
        match field {
            "knows" => self.knows.refs(),
            "known_by" => self.known_by.refs(),
            "friends" => self.friends.refs(),
            "employer" => self.employer.refs(),
            _ => Vec::new(),
        }
    }
}

impl EntityType for Person {
    const TYPE_NAME: &'static str = "Person";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Person")
            .label("Person")
            .identity("id")
            .property("name", "name")
            .relationship(RelationshipField::new("knows", "Person", true))
            .relationship(
                RelationshipField::new("known_by", "Person", true)
                    .relationship_type("KNOWS")
                    .direction(Direction::Incoming),
            )
            .relationship(
                RelationshipField::new("friends", "Person", true)
                    .relationship_type("FRIEND_OF")
                    .direction(Direction::Undirected),
            )
            .relationship(RelationshipField::new("employer", "Company", false).relationship_type("WORKS_AT"))
    }
}

#[derive(Default)]
pub struct Company {
    pub id: Option<i64>,
    pub name: String,
}

impl Company {
    pub fn new(name: &str) -> Shared<Company> {
        shared(Company { name: name.into(), ..Default::default() })
    }
}

impl GraphEntity for Company {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
}

impl EntityType for Company {
    const TYPE_NAME: &'static str = "Company";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Company").label("Company").identity("id").property("name", "name")
    }
}

// --- Forum -[HAS_TOPIC]-> Topic, with the edge as an entity ---

#[derive(Default)]
pub struct Forum {
    pub id: Option<i64>,
    pub name: String,
    pub topics: Vec<Shared<TopicLink>>,
    pub subforums: Vec<Shared<Forum>>,
}

impl Forum {
    pub fn new(name: &str) -> Shared<Forum> {
        shared(Forum { name: name.into(), ..Default::default() })
    }
}

impl GraphEntity for Forum {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
    fn related(&self, field: &str) -> Vec<EntityRef> {
        match field {
            "topics" => self.topics.refs(),
            "subforums" => self.subforums.refs(),
            _ => Vec::new(),
        }
    }
}

impl EntityType for Forum {
    const TYPE_NAME: &'static str = "Forum";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Forum")
            .label("Forum")
            .identity("id")
            .property("name", "name")
            .relationship(RelationshipField::new("topics", TopicLink::TYPE_NAME, true))
            .relationship(RelationshipField::new("subforums", Forum::TYPE_NAME, true).relationship_type("SUBFORUM"))
    }
}

#[derive(Default)]
pub struct Topic {
    pub id: Option<i64>,
    pub title: String,
    pub related: Vec<Shared<Topic>>,
}

impl Topic {
    pub fn new(title: &str) -> Shared<Topic> {
        shared(Topic { title: title.into(), ..Default::default() })
    }
}

impl GraphEntity for Topic {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "title" => Some(self.title.clone().into()),
            _ => None,
        }
    }
    fn related(&self, field: &str) -> Vec<EntityRef> {
        match field {
            "related" => self.related.refs(),
            _ => Vec::new(),
        }
    }
}

impl EntityType for Topic {
    const TYPE_NAME: &'static str = "Topic";

    fn class_info() -> ClassInfo {
        ClassInfo::node("Topic")
            .label("Topic")
            .identity("id")
            .property("title", "title")
            .relationship(RelationshipField::new("related", Topic::TYPE_NAME, true).relationship_type("RELATED_TO"))
    }
}

#[derive(Default)]
pub struct TopicLink {
    pub id: Option<i64>,
    pub forum: Option<Shared<Forum>>,
    pub topic: Option<Shared<Topic>>,
    pub weight: i64,
}

impl TopicLink {
    pub fn new(forum: &Shared<Forum>, topic: &Shared<Topic>, weight: i64) -> Shared<TopicLink> {
        shared(TopicLink { id: None, forum: Some(forum.clone()), topic: Some(topic.clone()), weight })
    }
}

impl GraphEntity for TopicLink {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
    fn native_id(&self) -> Option<i64> {
        self.id
    }
    fn set_native_id(&mut self, id: Option<i64>) {
        self.id = id;
    }
    fn property(&self, field: &str) -> Option<BoltType> {
        match field {
            "weight" => Some(self.weight.into()),
            _ => None,
        }
    }
    fn start_node(&self) -> Option<EntityRef> {
        self.forum.clone().map(|f| f as EntityRef)
    }
    fn end_node(&self) -> Option<EntityRef> {
        self.topic.clone().map(|t| t as EntityRef)
    }
}

impl EntityType for TopicLink {
    const TYPE_NAME: &'static str = "TopicLink";

    fn class_info() -> ClassInfo {
        ClassInfo::relationship_entity("TopicLink", "HAS_TOPIC")
            .identity("id")
            .property("weight", "weight")
            .start("forum", Forum::TYPE_NAME)
            .end("topic", Topic::TYPE_NAME)
    }
}

// --- Helpers ---

pub fn metadata() -> Arc<MetaData> {
    Arc::new(
        MetaData::builder()
            .register::<Student>()
            .register::<Course>()
            .register::<Person>()
            .register::<Company>()
            .register::<Forum>()
            .register::<Topic>()
            .register::<TopicLink>()
            .build()
            .unwrap(),
    )
}

pub fn context() -> MappingContext {
    MappingContext::new(metadata())
}

pub fn entity<T: GraphEntity + 'static>(handle: &Shared<T>) -> EntityRef {
    handle.clone()
}

/// Stand-in for the database: hands out ids for every new reference.
pub struct FakeStore {
    next_id: i64,
}

impl FakeStore {
    pub fn new() -> Self {
        FakeStore { next_id: 100 }
    }

    pub fn execute(&mut self, cx: &CompileContext) -> IdAssignments {
        let mut ids = IdAssignments::new();
        for node in cx.nodes() {
            if node.mutation() == NodeMutation::Create {
                ids.assign_node(node.reference(), self.next_id);
                self.next_id += 1;
            }
        }
        for rel in cx.relationships() {
            if let (RelationshipMutation::Create, Some(reference @ RelRef::New(_))) = (rel.mutation(), rel.reference()) {
                ids.assign_relationship(reference, self.next_id);
                self.next_id += 1;
            }
        }
        ids
    }

    /// Map, "execute" and fold the result back, like a session save.
    pub fn save(&mut self, context: &mut MappingContext, roots: &[EntityRef], depth: i32) -> CompileContext {
        let compiled = graft_core::EntityGraphMapper::new(context).map_all(roots, depth).unwrap();
        let ids = self.execute(&compiled);
        context.apply_save(&compiled, &ids).unwrap();
        compiled
    }
}

pub fn count_nodes(cx: &CompileContext, mutation: NodeMutation) -> usize {
    cx.nodes().iter().filter(|n| n.mutation() == mutation).count()
}

pub fn count_relationships(cx: &CompileContext, mutation: RelationshipMutation) -> usize {
    cx.relationships().iter().filter(|r| r.mutation() == mutation).count()
}
