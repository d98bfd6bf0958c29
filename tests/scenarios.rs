//! Integration tests for the concrete scenarios and cross-module
//! invariants spelled out for this crate's design (value model + codec +
//! conversion + adapter registry + catalog working together).

use std::cell::RefCell;
use std::rc::Rc;

use tinydb_core::adapter::reflection::{FieldSpec, Reflectable, ReflectionAdapter};
use tinydb_core::adapter::{is_valid_id, Adapter, AdapterError, Registry};
use tinydb_core::bson::{self, Document, Value};
use tinydb_core::catalog::collection::MemoryCollection;
use tinydb_core::catalog::{CatalogError, Column, MetadataDocument, MetadataManager, ValidationMode};
use tinydb_core::bson::{Binary, BinarySubtype};
use tinydb_core::convert::{ConvertError, FromBson, Guid};

#[test]
fn scenario_1_basic_document_round_trip() {
    let mut doc = Document::new();
    doc.insert("name", "abc");
    doc.insert("n", 123i32);

    let bytes = bson::serialize_document(&doc).unwrap();
    let total_len = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
    assert_eq!(total_len, 21);
    assert_eq!(total_len as usize, bytes.len());
    assert_eq!(*bytes.last().unwrap(), 0);

    let decoded = bson::deserialize_document(&bytes).unwrap();
    let keys: Vec<&str> = decoded.keys().collect();
    assert_eq!(keys, vec!["name", "n"]);
}

struct Person {
    id: i32,
    name: String,
}

struct PersonAdapter;

impl Adapter<Person> for PersonAdapter {
    fn to_document(&self, entity: &Person) -> Document {
        let mut doc = Document::new();
        doc.insert("_id", entity.id);
        doc.insert("name", entity.name.clone());
        doc
    }

    fn from_document(&self, doc: &Document) -> Result<Person, AdapterError> {
        Ok(Person {
            id: doc.get("_id").and_then(Value::as_i32).unwrap_or(0),
            name: doc.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        })
    }

    fn get_id(&self, entity: &Person) -> Value {
        Value::Int32(entity.id)
    }

    fn set_id(&self, entity: &mut Person, id: Value) {
        entity.id = id.as_i32().unwrap_or_default();
    }

    fn has_valid_id(&self, entity: &Person) -> bool {
        is_valid_id(&Value::Int32(entity.id))
    }

    fn get_property(&self, entity: &Person, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(entity.name.clone())),
            _ => None,
        }
    }
}

#[test]
fn scenario_2_registered_adapter_marshals_entity() {
    Registry::register::<Person, _>(PersonAdapter);

    let doc = Registry::to_document(&Person { id: 7, name: "hi".into() }).unwrap();
    assert_eq!(doc.get("_id"), Some(&Value::Int32(7)));
    assert_eq!(doc.get("name"), Some(&Value::String("hi".into())));

    let id = Registry::get_id(&Person { id: 7, name: "hi".into() }).unwrap();
    assert_eq!(id, Value::Int32(7));

    let valid = Registry::has_valid_id(&Person { id: 0, name: String::new() }).unwrap();
    assert!(!valid);
}

#[test]
fn scenario_3_catalog_required_column_enforcement() {
    let mgr = MetadataManager::new(Box::new(MemoryCollection::default()));
    mgr.save(MetadataDocument::new("contacts", vec![Column::new("email", "string").required()])).unwrap();

    let mut missing = Document::new();
    missing.insert("_id", 1i32);
    assert!(matches!(
        mgr.validate_for_write("contacts", &missing, ValidationMode::Loose),
        Err(CatalogError::SchemaValidation { .. })
    ));

    let mut present = Document::new();
    present.insert("_id", 1i32);
    present.insert("email", "x@y");
    assert!(mgr.validate_for_write("contacts", &present, ValidationMode::Loose).is_ok());
}

#[test]
fn scenario_4_field_projection_reads_only_wanted_keys() {
    let mut doc = Document::new();
    doc.insert("keep", "v");
    let mut skip_doc = Document::new();
    skip_doc.insert("k", 1i32);
    doc.insert("skip_doc", skip_doc);
    doc.insert("skip_arr", vec![Value::Int32(1), Value::Int32(2)]);
    doc.insert("target", 42i32);

    let bytes = bson::serialize_document(&doc).unwrap();
    let wanted: std::collections::HashSet<String> = ["keep".to_string(), "target".to_string()].into_iter().collect();
    let projected = bson::deserialize_document_with_fields(&bytes, &wanted).unwrap();

    assert_eq!(projected.len(), 2);
    assert_eq!(projected.get("keep"), Some(&Value::String("v".into())));
    assert_eq!(projected.get("target"), Some(&Value::Int32(42)));
}

struct Node {
    id: i32,
    next: RefCell<Option<Rc<Node>>>,
}

impl Default for Node {
    fn default() -> Self {
        Node { id: 0, next: RefCell::new(None) }
    }
}

impl Reflectable for Node {
    fn fields() -> &'static [FieldSpec<Node>] {
        static FIELDS: &[FieldSpec<Node>] = &[
            FieldSpec {
                wire_key: "_id",
                is_id: true,
                get: |n| Value::Int32(n.id),
                set: |n, v| n.id = v.as_i32().unwrap_or_default(),
            },
            FieldSpec {
                wire_key: "next",
                is_id: false,
                get: |n| match n.next.borrow().as_ref() {
                    Some(rc) => Value::Document(ReflectionAdapter.to_document(rc.as_ref())),
                    None => Value::Null,
                },
                set: |_, _| {},
            },
        ];
        FIELDS
    }
}

#[test]
fn scenario_5_cyclic_reference_emits_id_stub_at_the_cycle_edge() {
    let a = Rc::new(Node { id: 1, next: RefCell::new(None) });
    let b = Rc::new(Node { id: 2, next: RefCell::new(Some(a.clone())) });
    *a.next.borrow_mut() = Some(b.clone());

    let doc = ReflectionAdapter.to_document(a.as_ref());
    assert_eq!(doc.get("_id"), Some(&Value::Int32(1)));

    let next = doc.get("next").and_then(Value::as_document).unwrap();
    assert_eq!(next.get("_id"), Some(&Value::Int32(2)));

    let cycle_edge = next.get("next").and_then(Value::as_document).unwrap();
    assert_eq!(cycle_edge.get("_id"), Some(&Value::Int32(1)));
    assert_eq!(cycle_edge.len(), 1);
}

#[test]
fn scenario_6_numeric_overflow_is_detected_both_directions() {
    let err = i32::from_bson(&Value::Int64(1i64 << 40));
    assert!(matches!(err, Err(ConvertError::Overflow { .. })));

    let err = u8::from_bson(&Value::Int32(1000));
    assert!(matches!(err, Err(ConvertError::Overflow { .. })));
}

#[test]
fn scenario_6b_in_range_integer_identities_do_not_overflow() {
    assert_eq!(i64::from_bson(&Value::Int64(i64::MAX)).unwrap(), i64::MAX);
    assert_eq!(i64::from_bson(&Value::Int64(i64::MIN)).unwrap(), i64::MIN);
    assert_eq!(u64::from_bson(&Value::Int64(i64::MAX)).unwrap(), i64::MAX as u64);
}

#[test]
fn fifteen_byte_uuid_binary_is_malformed_not_unsupported_kind() {
    let short = Value::Binary(Binary::new(BinarySubtype::Uuid, vec![9u8; 15]));
    assert!(matches!(Guid::from_bson(&short), Err(ConvertError::MalformedValue { .. })));
}
