//! Schema catalog (spec §4.6): one `__sys_catalog` rowset of
//! [`MetadataDocument`]s, an in-memory row cache, and a derived
//! per-table **validation profile** cache.
//!
//! Built over [`Collection`](collection::Collection) rather than the page
//! engine directly, the way the teacher keeps its own higher layers
//! storage-agnostic behind small traits (`engine/` never calls into a
//! concrete file directly, always through an abstraction one layer down).

pub mod collection;

use crate::bson::date_time::DateTime;
use crate::bson::{Document, Value};
use crate::convert::ConvertError;
use collection::{Collection, CollectionError};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const CATALOG_TABLE: &str = "__sys_catalog";

/// System keys the write path reserves (spec §6).
pub const RESERVED_KEYS: &[&str] =
    &["_id", "_collection", "_isLargeDocument", "_largeDocumentIndex", "_largeDocumentSize"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("schema validation failed for table {table}: {reason}")]
    SchemaValidation { table: String, reason: String },
    #[error("no schema registered for table {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidOperation(String),
}

impl From<CollectionError> for CatalogError {
    fn from(e: CollectionError) -> Self {
        CatalogError::InvalidOperation(e.to_string())
    }
}

impl From<ConvertError> for CatalogError {
    fn from(e: ConvertError) -> Self {
        CatalogError::InvalidOperation(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    None,
    Loose,
    Strict,
}

/// The BSON-kind buckets a declared column type classifies into (spec
/// §4.6 "ExpectedBsonKind").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedBsonKind {
    String,
    Boolean,
    Numeric,
    DateTime,
    ObjectId,
    Binary,
    Array,
    Document,
}

impl ExpectedBsonKind {
    /// String-based classification of a normalized type name, stable
    /// across host languages (spec §4.6).
    pub fn classify(type_name: &str) -> Option<ExpectedBsonKind> {
        let normalized = type_name.trim().to_ascii_lowercase();
        Some(match normalized.as_str() {
            "string" | "str" | "char" => ExpectedBsonKind::String,
            "bool" | "boolean" => ExpectedBsonKind::Boolean,
            "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "int" | "int32" | "int64"
            | "long" | "short" | "byte" | "f32" | "f64" | "float" | "double" | "decimal" | "decimal128" => {
                ExpectedBsonKind::Numeric
            }
            "datetime" | "date" | "date_time" => ExpectedBsonKind::DateTime,
            "objectid" | "object_id" => ExpectedBsonKind::ObjectId,
            "binary" | "bytes" | "vec<u8>" | "guid" | "uuid" => ExpectedBsonKind::Binary,
            "array" | "list" | "vec" | "sequence" => ExpectedBsonKind::Array,
            "document" | "object" | "map" | "dictionary" => ExpectedBsonKind::Document,
            _ => return None,
        })
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ExpectedBsonKind::String => matches!(value, Value::String(_) | Value::Symbol(_)),
            ExpectedBsonKind::Boolean => matches!(value, Value::Boolean(_)),
            ExpectedBsonKind::Numeric => {
                matches!(value, Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_))
            }
            ExpectedBsonKind::DateTime => matches!(value, Value::DateTime(_)),
            ExpectedBsonKind::ObjectId => matches!(value, Value::ObjectId(_)),
            ExpectedBsonKind::Binary => matches!(value, Value::Binary(_)),
            ExpectedBsonKind::Array => matches!(value, Value::Array(_)),
            ExpectedBsonKind::Document => matches!(value, Value::Document(_)),
        }
    }
}

/// One declared column (spec §4.6/§4.7; the DDL emitter's `pk`, `required`,
/// `pn`, `order`, `dn`, `desc`, `fk`, `dv` map onto these fields).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
    pub primary_key: bool,
    pub required: bool,
    pub property_name: Option<String>,
    pub order: Option<i32>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub foreign_key: Option<String>,
    pub default_value: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            type_name: type_name.into(),
            primary_key: false,
            required: false,
            property_name: None,
            order: None,
            display_name: None,
            description: None,
            foreign_key: None,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    pub table_name: String,
    /// Host entity type name this table is bound to, if any (DDL `type`
    /// clause, spec §4.7).
    pub entity_type: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub columns: Vec<Column>,
}

impl MetadataDocument {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        let now = DateTime::now();
        MetadataDocument {
            table_name: table_name.into(),
            entity_type: None,
            display_name: None,
            description: None,
            created_at: now,
            updated_at: now,
            columns,
        }
    }
}

fn camel(name: &str) -> String {
    #[cfg(feature = "reflection")]
    {
        crate::adapter::reflection::camel_case(name)
    }
    #[cfg(not(feature = "reflection"))]
    {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

fn column_to_document(column: &Column) -> Document {
    let mut doc = Document::new();
    doc.insert("name", column.name.clone());
    doc.insert("type", column.type_name.clone());
    doc.insert("pk", column.primary_key);
    doc.insert("required", column.required);
    if let Some(pn) = &column.property_name {
        doc.insert("pn", pn.clone());
    }
    if let Some(order) = column.order {
        doc.insert("order", order);
    }
    if let Some(dn) = &column.display_name {
        doc.insert("dn", dn.clone());
    }
    if let Some(desc) = &column.description {
        doc.insert("desc", desc.clone());
    }
    if let Some(fk) = &column.foreign_key {
        doc.insert("fk", fk.clone());
    }
    if let Some(dv) = &column.default_value {
        doc.insert("dv", dv.clone());
    }
    doc
}

fn column_from_document(doc: &Document) -> Result<Column, CatalogError> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::InvalidOperation("column missing name".into()))?
        .to_string();
    let type_name = doc
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::InvalidOperation("column missing type".into()))?
        .to_string();
    Ok(Column {
        name,
        type_name,
        primary_key: doc.get("pk").and_then(Value::as_bool).unwrap_or(false),
        required: doc.get("required").and_then(Value::as_bool).unwrap_or(false),
        property_name: doc.get("pn").and_then(Value::as_str).map(str::to_string),
        order: doc.get("order").and_then(Value::as_i32),
        display_name: doc.get("dn").and_then(Value::as_str).map(str::to_string),
        description: doc.get("desc").and_then(Value::as_str).map(str::to_string),
        foreign_key: doc.get("fk").and_then(Value::as_str).map(str::to_string),
        default_value: doc.get("dv").cloned(),
    })
}

fn metadata_to_document(meta: &MetadataDocument) -> Document {
    let mut doc = Document::new();
    doc.insert("_id", meta.table_name.clone());
    doc.insert("table_name", meta.table_name.clone());
    if let Some(entity_type) = &meta.entity_type {
        doc.insert("entity_type", entity_type.clone());
    }
    if let Some(dn) = &meta.display_name {
        doc.insert("display_name", dn.clone());
    }
    if let Some(desc) = &meta.description {
        doc.insert("description", desc.clone());
    }
    doc.insert("created_at", meta.created_at);
    doc.insert("updated_at", meta.updated_at);
    doc.insert(
        "columns",
        meta.columns.iter().map(column_to_document).collect::<crate::bson::Array>(),
    );
    doc
}

fn metadata_from_document(doc: &Document) -> Result<MetadataDocument, CatalogError> {
    let table_name = doc
        .get("table_name")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::InvalidOperation("catalog row missing table_name".into()))?
        .to_string();
    let columns = doc
        .get("columns")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(|v| column_from_document(v.as_document().ok_or_else(|| {
            CatalogError::InvalidOperation("column entry must be a document".into())
        })?)).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();
    Ok(MetadataDocument {
        table_name,
        entity_type: doc.get("entity_type").and_then(Value::as_str).map(str::to_string),
        display_name: doc.get("display_name").and_then(Value::as_str).map(str::to_string),
        description: doc.get("description").and_then(Value::as_str).map(str::to_string),
        created_at: doc.get("created_at").and_then(Value::as_date_time).unwrap_or_else(DateTime::now),
        updated_at: doc.get("updated_at").and_then(Value::as_date_time).unwrap_or_else(DateTime::now),
        columns,
    })
}

/// One required column's accepted spellings (spec §4.6 camel-case-
/// tolerant name matching): the write path must satisfy at least one of
/// these, not all of them.
#[derive(Debug, Clone)]
struct RequiredField {
    /// Canonical column name, used in error messages.
    name: String,
    spellings: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
struct ValidationProfile {
    required_fields: Vec<RequiredField>,
    allowed_fields: HashSet<String>,
    expected_kind_by_field: HashMap<String, ExpectedBsonKind>,
}

fn build_profile(meta: &MetadataDocument) -> ValidationProfile {
    let mut profile = ValidationProfile::default();
    for column in &meta.columns {
        let camel_name = camel(&column.name);
        profile.allowed_fields.insert(column.name.clone());
        profile.allowed_fields.insert(camel_name.clone());
        if column.required && !column.primary_key {
            let mut spellings = HashSet::new();
            spellings.insert(column.name.clone());
            spellings.insert(camel_name.clone());
            profile.required_fields.push(RequiredField { name: column.name.clone(), spellings });
        }
        if let Some(kind) = ExpectedBsonKind::classify(&column.type_name) {
            profile.expected_kind_by_field.insert(column.name.clone(), kind);
            profile.expected_kind_by_field.insert(camel_name, kind);
        }
    }
    for key in RESERVED_KEYS {
        profile.allowed_fields.insert((*key).to_string());
    }
    profile
}

/// Table names beginning with `__` are system tables, exempt from schema
/// validation (spec §6).
pub fn is_system_table(table_name: &str) -> bool {
    table_name.starts_with("__")
}

pub struct MetadataManager {
    collection: Box<dyn Collection<Document>>,
    rows: RwLock<HashMap<String, MetadataDocument>>,
    profiles: RwLock<HashMap<String, ValidationProfile>>,
}

impl MetadataManager {
    pub fn new(collection: Box<dyn Collection<Document>>) -> Self {
        MetadataManager { collection, rows: RwLock::new(HashMap::new()), profiles: RwLock::new(HashMap::new()) }
    }

    /// Idempotent upsert; preserves the original `created_at`, refreshes
    /// `updated_at`, invalidates the cached validation profile.
    pub fn save(&self, metadata: MetadataDocument) -> Result<(), CatalogError> {
        let table_name = metadata.table_name.clone();
        let mut metadata = metadata;
        if let Some(existing) = self.get(&table_name).ok() {
            metadata.created_at = existing.created_at;
        }
        metadata.updated_at = DateTime::now();
        let doc = metadata_to_document(&metadata);
        if self.collection.find_by_id(&table_name)?.is_some() {
            self.collection.update(doc)?;
        } else {
            self.collection.insert(doc)?;
        }
        self.rows.write().expect("catalog lock poisoned").insert(table_name.clone(), metadata);
        self.profiles.write().expect("catalog lock poisoned").remove(&table_name);
        debug!(table = %table_name, "catalog schema saved");
        Ok(())
    }

    /// Cache lookup; on miss, reads from storage, caches, and builds the
    /// validation profile.
    pub fn get(&self, table_name: &str) -> Result<MetadataDocument, CatalogError> {
        if let Some(meta) = self.rows.read().expect("catalog lock poisoned").get(table_name) {
            debug!(table = %table_name, "catalog schema cache hit");
            return Ok(meta.clone());
        }
        let stored = self
            .collection
            .find_by_id(table_name)
            .map_err(CatalogError::from)?
            .ok_or_else(|| CatalogError::NotFound(table_name.to_string()))?;
        let meta = metadata_from_document(&stored)?;
        self.rows.write().expect("catalog lock poisoned").insert(table_name.to_string(), meta.clone());
        self.profiles.write().expect("catalog lock poisoned").insert(table_name.to_string(), build_profile(&meta));
        debug!(table = %table_name, "catalog schema loaded from storage");
        Ok(meta)
    }

    pub fn delete(&self, table_name: &str) -> Result<(), CatalogError> {
        self.collection.delete(table_name)?;
        self.rows.write().expect("catalog lock poisoned").remove(table_name);
        self.profiles.write().expect("catalog lock poisoned").remove(table_name);
        debug!(table = %table_name, "catalog schema deleted");
        Ok(())
    }

    pub fn get_all_table_names(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.collection.find_all()?.iter().filter_map(|doc| doc.get("table_name").and_then(Value::as_str)).map(str::to_string).collect())
    }

    /// If no schema is registered for `table_name`, saves `build()`'s
    /// result as the schema. In read-only mode, raises instead of
    /// building (spec §4.6/§6 "read_only ... ensure_schema raises").
    pub fn ensure_schema(
        &self,
        table_name: &str,
        read_only: bool,
        build: impl FnOnce() -> MetadataDocument,
    ) -> Result<MetadataDocument, CatalogError> {
        match self.get(table_name) {
            Ok(meta) => Ok(meta),
            Err(CatalogError::NotFound(_)) if read_only => {
                warn!(table = %table_name, "ensure_schema: no schema and database is read-only");
                Err(CatalogError::InvalidOperation(format!("table {table_name} has no schema and the database is read-only")))
            }
            Err(CatalogError::NotFound(_)) => {
                let meta = build();
                self.save(meta.clone())?;
                Ok(meta)
            }
            Err(other) => Err(other),
        }
    }

    fn profile(&self, table_name: &str) -> Result<ValidationProfile, CatalogError> {
        if let Some(profile) = self.profiles.read().expect("catalog lock poisoned").get(table_name) {
            return Ok(profile.clone());
        }
        let meta = self.get(table_name)?;
        let profile = build_profile(&meta);
        self.profiles.write().expect("catalog lock poisoned").insert(table_name.to_string(), profile.clone());
        Ok(profile)
    }

    pub fn validate_for_write(&self, table_name: &str, document: &Document, mode: ValidationMode) -> Result<(), CatalogError> {
        if mode == ValidationMode::None || is_system_table(table_name) {
            return Ok(());
        }
        let profile = self.profile(table_name)?;

        for required in &profile.required_fields {
            let present = required
                .spellings
                .iter()
                .any(|spelling| document.get(spelling).map(|v| !v.is_null()).unwrap_or(false));
            if !present {
                let reason = format!("required field {:?} missing or null", required.name);
                warn!(table = %table_name, %reason, "schema validation failed");
                return Err(CatalogError::SchemaValidation { table: table_name.to_string(), reason });
            }
        }

        if mode == ValidationMode::Strict {
            for key in document.keys() {
                if !profile.allowed_fields.contains(key) && !RESERVED_KEYS.contains(&key.as_str()) {
                    let reason = format!("field {key:?} is not declared in the schema");
                    warn!(table = %table_name, %reason, "schema validation failed");
                    return Err(CatalogError::SchemaValidation { table: table_name.to_string(), reason });
                }
                if let Some(expected) = profile.expected_kind_by_field.get(key) {
                    if let Some(value) = document.get(key) {
                        if !value.is_null() && !expected.accepts(value) {
                            let reason = format!("field {key:?} has kind {:?}, expected {:?}", value.kind(), expected);
                            warn!(table = %table_name, %reason, "schema validation failed");
                            return Err(CatalogError::SchemaValidation { table: table_name.to_string(), reason });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// For each non-primary-key column absent from `document`, sets its
    /// declared default (explicit, or type-derived when absent).
    pub fn apply_defaults(&self, table_name: &str, document: &mut Document) -> Result<(), CatalogError> {
        let meta = self.get(table_name)?;
        for column in &meta.columns {
            if column.primary_key || document.contains_key(&column.name) {
                continue;
            }
            let default = match &column.default_value {
                Some(v) => v.clone(),
                None => type_derived_default(&column.type_name),
            };
            document.insert(column.name.clone(), default);
        }
        Ok(())
    }
}

/// Heuristic default for a column with no explicit default, keyed off its
/// normalized type name (spec §9 "brittle ... add tests for every entry").
fn type_derived_default(type_name: &str) -> Value {
    match ExpectedBsonKind::classify(type_name) {
        Some(ExpectedBsonKind::String) => Value::String(String::new()),
        Some(ExpectedBsonKind::Boolean) => Value::Boolean(false),
        Some(ExpectedBsonKind::Numeric) => Value::Int32(0),
        Some(ExpectedBsonKind::Array) => Value::Array(crate::bson::Array::new()),
        Some(ExpectedBsonKind::Document) => Value::Document(Document::new()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection::MemoryCollection;

    fn manager() -> MetadataManager {
        MetadataManager::new(Box::new(MemoryCollection::default()))
    }

    #[test]
    fn save_then_get_round_trips() {
        let mgr = manager();
        let meta = MetadataDocument::new("widgets", vec![Column::new("name", "string").required()]);
        mgr.save(meta.clone()).unwrap();
        let fetched = mgr.get("widgets").unwrap();
        assert_eq!(fetched.table_name, "widgets");
        assert_eq!(fetched.columns.len(), 1);
    }

    #[test]
    fn save_preserves_created_at() {
        let mgr = manager();
        let mut meta = MetadataDocument::new("widgets", vec![]);
        meta.created_at = DateTime::from_unix_milliseconds(0).unwrap();
        mgr.save(meta).unwrap();
        let again = MetadataDocument::new("widgets", vec![Column::new("x", "int")]);
        mgr.save(again).unwrap();
        assert_eq!(mgr.get("widgets").unwrap().created_at.as_unix_milliseconds(), 0);
    }

    #[test]
    fn validate_required_field_missing() {
        let mgr = manager();
        mgr.save(MetadataDocument::new("widgets", vec![Column::new("email", "string").required()])).unwrap();
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        let err = mgr.validate_for_write("widgets", &doc, ValidationMode::Loose);
        assert!(matches!(err, Err(CatalogError::SchemaValidation { .. })));

        doc.insert("email", "x@y");
        assert!(mgr.validate_for_write("widgets", &doc, ValidationMode::Loose).is_ok());
    }

    #[test]
    fn required_field_accepts_either_declared_or_camel_case_spelling() {
        let mgr = manager();
        mgr.save(MetadataDocument::new("widgets", vec![Column::new("Email", "string").required()])).unwrap();

        let mut camel_only = Document::new();
        camel_only.insert("_id", 1i32);
        camel_only.insert("email", "x@y");
        assert!(mgr.validate_for_write("widgets", &camel_only, ValidationMode::Loose).is_ok());

        let mut declared_only = Document::new();
        declared_only.insert("_id", 1i32);
        declared_only.insert("Email", "x@y");
        assert!(mgr.validate_for_write("widgets", &declared_only, ValidationMode::Loose).is_ok());

        let mut neither = Document::new();
        neither.insert("_id", 1i32);
        assert!(matches!(
            mgr.validate_for_write("widgets", &neither, ValidationMode::Loose),
            Err(CatalogError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn strict_mode_rejects_unknown_field_loose_does_not() {
        let mgr = manager();
        mgr.save(MetadataDocument::new("widgets", vec![Column::new("name", "string")])).unwrap();
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        doc.insert("name", "a");
        doc.insert("mystery", 1i32);
        assert!(mgr.validate_for_write("widgets", &doc, ValidationMode::Loose).is_ok());
        assert!(matches!(
            mgr.validate_for_write("widgets", &doc, ValidationMode::Strict),
            Err(CatalogError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn validation_monotonicity_strict_implies_loose_and_none() {
        let mgr = manager();
        mgr.save(MetadataDocument::new("widgets", vec![Column::new("name", "string").required()])).unwrap();
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        doc.insert("name", "a");
        assert!(mgr.validate_for_write("widgets", &doc, ValidationMode::Strict).is_ok());
        assert!(mgr.validate_for_write("widgets", &doc, ValidationMode::Loose).is_ok());
        assert!(mgr.validate_for_write("widgets", &doc, ValidationMode::None).is_ok());
    }

    #[test]
    fn system_tables_are_exempt_from_validation() {
        let mgr = manager();
        let mut doc = Document::new();
        doc.insert("anything", 1i32);
        assert!(mgr.validate_for_write("__sys_catalog", &doc, ValidationMode::Strict).is_ok());
    }

    #[test]
    fn apply_defaults_fills_missing_non_pk_columns() {
        let mgr = manager();
        mgr.save(MetadataDocument::new(
            "widgets",
            vec![Column::new("_id", "int").primary_key(), Column::new("active", "bool")],
        ))
        .unwrap();
        let mut doc = Document::new();
        doc.insert("_id", 1i32);
        mgr.apply_defaults("widgets", &mut doc).unwrap();
        assert_eq!(doc.get("active"), Some(&Value::Boolean(false)));
    }

    #[test]
    fn ensure_schema_raises_in_read_only_mode_when_missing() {
        let mgr = manager();
        let err = mgr.ensure_schema("widgets", true, || MetadataDocument::new("widgets", vec![]));
        assert!(matches!(err, Err(CatalogError::InvalidOperation(_))));
    }
}
