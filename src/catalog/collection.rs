//! Storage-substrate-facing traits the catalog is built over (spec §6),
//! so `MetadataManager` never touches a page engine directly. Grounded on
//! the teacher's own layering: `engine/` never assumes a concrete byte
//! sink either, dispatching through `ByteSink`-like traits instead.

use crate::bson::Document;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("no document with id {0:?}")]
    NotFound(String),
    #[error("{0}")]
    Storage(String),
}

/// Minimal persistence surface the catalog needs (spec §6 "`Collection<T>`
/// ... minimal surface").
pub trait Collection<T> {
    fn find_by_id(&self, id: &str) -> Result<Option<T>, CollectionError>;
    fn insert(&self, doc: T) -> Result<(), CollectionError>;
    fn update(&self, doc: T) -> Result<(), CollectionError>;
    fn delete(&self, id: &str) -> Result<(), CollectionError>;
    fn find_all(&self) -> Result<Vec<T>, CollectionError>;
}

/// Provides named collections and the read-only flag (spec §6
/// "`DatabaseEngine` — provides `GetCollection<T>(name)` and
/// `Options.ReadOnly`").
pub trait DatabaseEngine {
    fn get_collection(&self, name: &str) -> Box<dyn Collection<Document>>;
    fn read_only(&self) -> bool;
}

/// In-memory `Collection<Document>`, keyed by the document's `_id`
/// rendered as a string. Used by the catalog's own tests and as the
/// reference `DatabaseEngine` implementation; not a real storage engine.
#[derive(Default)]
pub struct MemoryCollection {
    rows: RwLock<HashMap<String, Document>>,
}

fn id_key(doc: &Document) -> Result<String, CollectionError> {
    doc.get("_id")
        .map(|v| format!("{v:?}"))
        .ok_or_else(|| CollectionError::Storage("document has no _id".into()))
}

impl Collection<Document> for MemoryCollection {
    fn find_by_id(&self, id: &str) -> Result<Option<Document>, CollectionError> {
        Ok(self.rows.read().expect("collection lock poisoned").get(id).cloned())
    }

    fn insert(&self, doc: Document) -> Result<(), CollectionError> {
        let key = id_key(&doc)?;
        self.rows.write().expect("collection lock poisoned").insert(key, doc);
        Ok(())
    }

    fn update(&self, doc: Document) -> Result<(), CollectionError> {
        let key = id_key(&doc)?;
        let mut rows = self.rows.write().expect("collection lock poisoned");
        if !rows.contains_key(&key) {
            return Err(CollectionError::NotFound(key));
        }
        rows.insert(key, doc);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), CollectionError> {
        self.rows.write().expect("collection lock poisoned").remove(id);
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<Document>, CollectionError> {
        Ok(self.rows.read().expect("collection lock poisoned").values().cloned().collect())
    }
}

/// In-memory `DatabaseEngine`: one named `MemoryCollection` per name,
/// created lazily on first access.
pub struct MemoryEngine {
    collections: Mutex<HashMap<String, std::sync::Arc<MemoryCollection>>>,
    read_only: bool,
}

impl MemoryEngine {
    pub fn new(read_only: bool) -> Self {
        MemoryEngine { collections: Mutex::new(HashMap::new()), read_only }
    }
}

impl DatabaseEngine for MemoryEngine {
    fn get_collection(&self, name: &str) -> Box<dyn Collection<Document>> {
        let mut collections = self.collections.lock().expect("engine lock poisoned");
        let entry = collections.entry(name.to_string()).or_insert_with(|| std::sync::Arc::new(MemoryCollection::default()));
        Box::new(SharedCollection(entry.clone()))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

struct SharedCollection(std::sync::Arc<MemoryCollection>);

impl Collection<Document> for SharedCollection {
    fn find_by_id(&self, id: &str) -> Result<Option<Document>, CollectionError> {
        self.0.find_by_id(id)
    }

    fn insert(&self, doc: Document) -> Result<(), CollectionError> {
        self.0.insert(doc)
    }

    fn update(&self, doc: Document) -> Result<(), CollectionError> {
        self.0.update(doc)
    }

    fn delete(&self, id: &str) -> Result<(), CollectionError> {
        self.0.delete(id)
    }

    fn find_all(&self) -> Result<Vec<Document>, CollectionError> {
        self.0.find_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_collection_round_trips() {
        let col = MemoryCollection::default();
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        doc.insert("name", "a");
        col.insert(doc.clone()).unwrap();
        assert_eq!(col.find_by_id("Int32(1)").unwrap(), Some(doc));
    }

    #[test]
    fn memory_engine_shares_collection_instance_by_name() {
        let engine = MemoryEngine::new(false);
        let a = engine.get_collection("widgets");
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        a.insert(doc).unwrap();

        let b = engine.get_collection("widgets");
        assert_eq!(b.find_all().unwrap().len(), 1);
    }
}
