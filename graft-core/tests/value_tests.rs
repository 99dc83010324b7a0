use std::collections::HashMap;
use graft_core::traits::{FromGraphValue, IntoGraphValue};
use graft_core::value::{self, Blob, PrimaryId, PropertyMap};
use graft_core::GraftError;
use neo4rs::BoltType;

#[test]
fn test_from_value_integer() {
    let val = BoltType::Integer(neo4rs::BoltInteger { value: 42 });
    let res = i64::from_value(val).unwrap();
    assert_eq!(res, 42);
}

#[test]
fn test_from_value_string() {
    let val = BoltType::String(neo4rs::BoltString { value: "Gary".to_string() });
    let res = String::from_value(val).unwrap();
    assert_eq!(res, "Gary");
}

#[test]
fn test_from_value_bool() {
    let val = BoltType::Boolean(neo4rs::BoltBoolean { value: true });
    let res = bool::from_value(val).unwrap();
    assert!(res);
}

#[test]
fn test_from_value_list() {
    let val = BoltType::List(neo4rs::BoltList {
        value: vec![
            BoltType::Integer(neo4rs::BoltInteger { value: 1 }),
            BoltType::Integer(neo4rs::BoltInteger { value: 2 }),
        ],
    });
    let res = Vec::<i64>::from_value(val).unwrap();
    assert_eq!(res, vec![1, 2]);
}

#[test]
fn test_from_value_option() {
    let val = BoltType::Null(neo4rs::BoltNull);
    let res = Option::<i64>::from_value(val).unwrap();
    assert_eq!(res, None);

    let val = BoltType::Integer(neo4rs::BoltInteger { value: 42 });
    let res = Option::<i64>::from_value(val).unwrap();
    assert_eq!(res, Some(42));
}

#[test]
fn test_from_value_u32() {
    let val = BoltType::Integer(neo4rs::BoltInteger { value: 100 });
    let res = u32::from_value(val).unwrap();
    assert_eq!(res, 100u32);
}

#[test]
fn test_from_value_float() {
    let val = BoltType::Float(neo4rs::BoltFloat { value: 2.5 });
    let res = f64::from_value(val).unwrap();
    assert_eq!(res, 2.5);
}

#[test]
fn test_type_mismatch_error() {
    let val = BoltType::String(neo4rs::BoltString { value: "oops".to_string() });
    let err = i64::from_value(val).unwrap_err();
    match &err {
        GraftError::TypeMismatch { expected, got, .. } => {
            assert_eq!(expected, "Integer");
            assert_eq!(got, "String");
        }
        other => panic!("expected TypeMismatch, got: {other}"),
    }
}

#[test]
fn test_missing_field_error() {
    let err = GraftError::missing_field("id", "CreatedRow");
    let msg = err.to_string();
    assert!(msg.contains("id"));
    assert!(msg.contains("CreatedRow"));
}

#[test]
fn test_missing_endpoint_message() {
    let err = GraftError::missing_endpoint("HAS_TOPIC", "end");
    assert_eq!(err.to_string(), "relationship entity HAS_TOPIC cannot have a missing end node");
    assert!(err.is_mapping_error());
}

#[test]
fn test_hashmap_from_value() {
    let mut map = neo4rs::BoltMap::new();
    map.put(
        neo4rs::BoltString { value: "a".to_string() },
        BoltType::Integer(neo4rs::BoltInteger { value: 1 }),
    );
    map.put(
        neo4rs::BoltString { value: "b".to_string() },
        BoltType::Integer(neo4rs::BoltInteger { value: 2 }),
    );

    let val = BoltType::Map(map);
    let res = HashMap::<String, i64>::from_value(val).unwrap();
    assert_eq!(res.get("a"), Some(&1));
    assert_eq!(res.get("b"), Some(&2));
}

#[test]
fn test_hashmap_type_mismatch() {
    let val = BoltType::Integer(neo4rs::BoltInteger { value: 42 });
    let err = HashMap::<String, i64>::from_value(val).unwrap_err();
    match &err {
        GraftError::TypeMismatch { expected, got, .. } => {
            assert_eq!(expected, "Map");
            assert_eq!(got, "Integer");
        }
        other => panic!("expected TypeMismatch, got: {other}"),
    }
}

// --- Blob ---

#[test]
fn test_blob_from_value() {
    let val = BoltType::Bytes(neo4rs::BoltBytes::new(bytes::Bytes::from_static(b"hello")));
    let b = Blob::from_value(val).unwrap();
    assert_eq!(b.0, b"hello");
}

#[test]
fn test_blob_type_mismatch() {
    let val = BoltType::Integer(neo4rs::BoltInteger { value: 1 });
    let err = Blob::from_value(val).unwrap_err();
    match &err {
        GraftError::TypeMismatch { expected, got, .. } => {
            assert_eq!(expected, "Bytes");
            assert_eq!(got, "Integer");
        }
        other => panic!("expected TypeMismatch, got: {other}"),
    }
}

#[test]
fn test_into_value_blob() {
    let val = Blob(vec![1, 2, 3]).into_value();
    match val {
        BoltType::Bytes(b) => assert_eq!(&b.value[..], &[1, 2, 3]),
        other => panic!("expected Bytes, got: {other:?}"),
    }
}

// --- Primary ids ---

#[test]
fn test_primary_id_from_value() {
    assert_eq!(PrimaryId::from_value(&BoltType::from(7_i64)), Some(PrimaryId::Int(7)));
    assert_eq!(PrimaryId::from_value(&BoltType::from("gary")), Some(PrimaryId::from("gary")));
    assert_eq!(PrimaryId::from_value(&BoltType::from(true)), None);
    assert_eq!(PrimaryId::from_value(&value::null()), None);
}

// --- Property maps ---

#[test]
fn test_to_bolt_map() {
    let mut props = PropertyMap::new();
    props.insert("name".into(), BoltType::from("Gary"));
    props.insert("age".into(), BoltType::from(21_i64));

    let res = HashMap::<String, BoltType>::from_value(value::to_bolt_map(&props)).unwrap();
    assert_eq!(res.len(), 2);
    assert_eq!(res.get("name"), Some(&BoltType::from("Gary")));
}

#[test]
fn test_type_name_and_null() {
    assert!(value::is_null(&value::null()));
    assert_eq!(value::type_name(&value::null()), "Null");
    assert_eq!(value::type_name(&BoltType::from(1.5_f64)), "Float");
}

// --- Error context chaining ---

#[test]
fn test_error_with_context() {
    let err = GraftError::type_mismatch("Integer", "String", "id");
    let ctx = err.with_context("CreatedRow::id");
    let msg = ctx.to_string();
    assert!(msg.contains("CreatedRow::id"));
    assert!(msg.contains("type mismatch"));
}

#[test]
fn test_error_context_variant() {
    let inner = GraftError::missing_field("reference", "CreatedRow");
    let outer = inner.with_context("decoding CreatedRow");
    match &outer {
        GraftError::Context { context, source } => {
            assert_eq!(context, "decoding CreatedRow");
            assert!(matches!(source.as_ref(), GraftError::MissingField { .. }));
        }
        other => panic!("expected Context, got: {other}"),
    }
}

// --- IntoGraphValue ---

#[test]
fn test_into_value_string() {
    let val = String::from("hello").into_value();
    match val {
        BoltType::String(s) => assert_eq!(s.value, "hello"),
        other => panic!("expected String, got: {other:?}"),
    }
}

#[test]
fn test_into_value_i64() {
    let val = 42_i64.into_value();
    match val {
        BoltType::Integer(i) => assert_eq!(i.value, 42),
        other => panic!("expected Integer, got: {other:?}"),
    }
}
