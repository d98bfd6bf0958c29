//! Reflection fallback (spec §4.5), used when no [`Adapter`](super::Adapter)
//! is registered for a type. Rust has no runtime member discovery, so the
//! "discover public getter/setter pairs" rule becomes: the entity itself
//! declares a static [`FieldSpec`] table via [`Reflectable`] — typically
//! generated by a derive macro or the codegen emitter (`emit::codegen`),
//! never hand-maintained for real entities. [`ReflectionAdapter`] then
//! implements [`Adapter`](super::Adapter) purely in terms of that table,
//! so it plugs into the same registry path as a hand-written adapter.
//!
//! Cycle detection reuses the `thread_local` crate already in the
//! dependency tree (formerly backing the expression-evaluator arena,
//! dropped with that module) instead of adding a second thread-local
//! mechanism.

use crate::adapter::{is_valid_id, Adapter, AdapterError};
use crate::bson::{Document, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::OnceLock;
use thread_local::ThreadLocal;

/// One document field, described as a pair of function pointers over the
/// host type `T` (spec §4.5 "Discover members ... getter and setter").
pub struct FieldSpec<T> {
    /// Wire key. Camel-cased member name, except the id field which is
    /// always written under `_id` regardless of what's declared here.
    pub wire_key: &'static str,
    pub is_id: bool,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, Value),
}

pub trait Reflectable: Default + Sized {
    fn fields() -> &'static [FieldSpec<Self>];

    fn id_field() -> Option<&'static FieldSpec<Self>> {
        Self::fields().iter().find(|f| f.is_id)
    }
}

fn visited() -> &'static RefCell<HashSet<usize>> {
    static POOL: OnceLock<ThreadLocal<RefCell<HashSet<usize>>>> = OnceLock::new();
    POOL.get_or_init(ThreadLocal::new).get_or(|| RefCell::new(HashSet::new()))
}

/// Camel-cases a member name: lowercases the first letter, leaves the rest
/// untouched (spec §4.5 "camel-case of the member name (first letter
/// lowered)").
pub fn camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_document_reflective<T: Reflectable>(entity: &T) -> Document {
    let addr = entity as *const T as usize;
    let first_visit = visited().borrow_mut().insert(addr);
    if !first_visit {
        // Cycle: emit an id-only stub, or an empty document if the id
        // isn't valid (spec §4.5 "Cycle detection").
        let mut doc = Document::new();
        if let Some(field) = T::id_field() {
            let id = (field.get)(entity);
            if is_valid_id(&id) {
                doc.insert("_id", id);
            }
        }
        return doc;
    }

    let doc = (|| {
        let mut doc = Document::new();
        for field in T::fields() {
            let key = if field.is_id { "_id" } else { field.wire_key };
            doc.insert(key, (field.get)(entity));
        }
        doc
    })();

    visited().borrow_mut().remove(&addr);
    doc
}

fn from_document_reflective<T: Reflectable>(doc: &Document) -> Result<T, AdapterError> {
    let mut entity = T::default();
    for field in T::fields() {
        let key = if field.is_id { "_id" } else { field.wire_key };
        if let Some(value) = doc.get(key) {
            (field.set)(&mut entity, value.clone());
        }
    }
    Ok(entity)
}

/// [`Adapter`](super::Adapter) implementation backed entirely by a
/// type's [`Reflectable::fields`] table.
pub struct ReflectionAdapter;

impl<T: Reflectable> Adapter<T> for ReflectionAdapter {
    fn to_document(&self, entity: &T) -> Document {
        to_document_reflective(entity)
    }

    fn from_document(&self, doc: &Document) -> Result<T, AdapterError> {
        from_document_reflective(doc)
    }

    fn get_id(&self, entity: &T) -> Value {
        match T::id_field() {
            Some(field) => (field.get)(entity),
            None => Value::Null,
        }
    }

    fn set_id(&self, entity: &mut T, id: Value) {
        if let Some(field) = T::id_field() {
            (field.set)(entity, id);
        }
    }

    fn has_valid_id(&self, entity: &T) -> bool {
        match T::id_field() {
            Some(field) => is_valid_id(&(field.get)(entity)),
            None => false,
        }
    }

    fn get_property(&self, entity: &T, name: &str) -> Option<Value> {
        T::fields().iter().find(|f| f.wire_key == name).map(|f| (f.get)(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget {
        id: i32,
        label: String,
    }

    impl Reflectable for Widget {
        fn fields() -> &'static [FieldSpec<Widget>] {
            static FIELDS: &[FieldSpec<Widget>] = &[
                FieldSpec { wire_key: "_id", is_id: true, get: |w| Value::Int32(w.id), set: |w, v| w.id = v.as_i32().unwrap_or_default() },
                FieldSpec { wire_key: "label", is_id: false, get: |w| Value::String(w.label.clone()), set: |w, v| w.label = v.as_str().unwrap_or_default().to_string() },
            ];
            FIELDS
        }
    }

    #[test]
    fn round_trips_through_reflection() {
        let widget = Widget { id: 3, label: "lamp".into() };
        let doc = ReflectionAdapter.to_document(&widget);
        assert_eq!(doc.get("_id"), Some(&Value::Int32(3)));
        assert_eq!(doc.get("label"), Some(&Value::String("lamp".into())));

        let back: Widget = ReflectionAdapter.from_document(&doc).unwrap();
        assert_eq!(back.id, 3);
        assert_eq!(back.label, "lamp");
    }

    #[test]
    fn camel_case_lowers_first_letter_only() {
        assert_eq!(camel_case("Name"), "name");
        assert_eq!(camel_case("ID"), "iD");
        assert_eq!(camel_case(""), "");
    }

    struct Cyclic {
        id: i32,
        next: RefCell<Option<std::rc::Rc<Cyclic>>>,
    }

    impl Default for Cyclic {
        fn default() -> Self {
            Cyclic { id: 0, next: RefCell::new(None) }
        }
    }

    impl Reflectable for Cyclic {
        fn fields() -> &'static [FieldSpec<Cyclic>] {
            static FIELDS: &[FieldSpec<Cyclic>] =
                &[FieldSpec { wire_key: "_id", is_id: true, get: |c| Value::Int32(c.id), set: |c, v| c.id = v.as_i32().unwrap_or_default() }];
            FIELDS
        }
    }

    #[test]
    fn self_cycle_emits_id_stub_not_stack_overflow() {
        let node = Cyclic { id: 9, next: RefCell::new(None) };
        let addr = &node as *const Cyclic as usize;
        visited().borrow_mut().insert(addr);
        let doc = to_document_reflective(&node);
        visited().borrow_mut().remove(&addr);
        assert_eq!(doc.get("_id"), Some(&Value::Int32(9)));
    }
}
