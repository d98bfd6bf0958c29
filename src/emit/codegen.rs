//! Host entity source emitter (spec §4.7): renders a [`MetadataDocument`]
//! as Rust source — the nearest idiomatic analogue of the source's "host
//! entity class" emitter. Rust has no runtime attributes to tag
//! `[Id]`/`[ForeignKey]`-equivalents onto, so they are emitted as doc
//! comments plus a hand-rolled `impl Reflectable` (the same shape
//! `adapter::reflection` consumes), not as attribute macros, since this
//! function produces *source text* to be compiled, not something that
//! runs inside this crate itself.

use crate::catalog::{Column, ExpectedBsonKind, MetadataDocument};
use std::collections::HashSet;

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "false", "fn", "for", "if",
    "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self", "static",
    "struct", "super", "trait", "true", "type", "unsafe", "use", "where", "while", "async", "await", "box", "do",
    "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

#[derive(Debug, Clone)]
pub struct CodeGenOptions {
    /// Wraps the emitted struct in `pub mod <namespace> { ... }` unless
    /// `file_scoped_namespace` is set.
    pub namespace: Option<String>,
    pub type_name: String,
    pub nullable_annotations: bool,
    /// Emit native Rust primitive field types (`i32`, `String`, ...)
    /// derived from each column's declared kind, instead of a uniform
    /// `crate::bson::Value` field with no native typing.
    pub use_language_aliases: bool,
    pub emit_metadata_attributes: bool,
    pub emit_foreign_key_attributes: bool,
    /// When true, the namespace applies to the whole file (a leading
    /// comment names it) instead of wrapping the struct in a `mod` block.
    pub file_scoped_namespace: bool,
}

impl Default for CodeGenOptions {
    fn default() -> Self {
        CodeGenOptions {
            namespace: None,
            type_name: "Entity".to_string(),
            nullable_annotations: true,
            use_language_aliases: true,
            emit_metadata_attributes: true,
            emit_foreign_key_attributes: true,
            file_scoped_namespace: false,
        }
    }
}

/// Cleans a column name into a valid Rust identifier: invalid characters
/// become `_`, a leading digit is prefixed with `_`, and a keyword clash
/// is escaped with `r#` (Rust's raw-identifier mechanism — this crate's
/// equivalent of the source's `@`-prefix convention, which is specific to
/// C#/VB and has no Rust analogue).
fn clean_identifier(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        cleaned = "field".to_string();
    }
    if cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        cleaned.insert(0, '_');
    }
    if RUST_KEYWORDS.contains(&cleaned.as_str()) {
        cleaned = format!("r#{cleaned}");
    }
    cleaned
}

fn disambiguate(names: &mut HashSet<String>, candidate: String) -> String {
    if names.insert(candidate.clone()) {
        return candidate;
    }
    let mut suffix = 2;
    loop {
        let attempt = format!("{candidate}_{suffix}");
        if names.insert(attempt.clone()) {
            return attempt;
        }
        suffix += 1;
    }
}

fn rust_field_type(column: &Column, use_language_aliases: bool, nullable: bool) -> String {
    let base = if !use_language_aliases {
        "crate::bson::Value".to_string()
    } else {
        match ExpectedBsonKind::classify(&column.type_name) {
            Some(ExpectedBsonKind::String) => "String".to_string(),
            Some(ExpectedBsonKind::Boolean) => "bool".to_string(),
            Some(ExpectedBsonKind::Numeric) => numeric_alias(&column.type_name),
            Some(ExpectedBsonKind::DateTime) => "crate::bson::date_time::DateTime".to_string(),
            Some(ExpectedBsonKind::ObjectId) => "crate::bson::ObjectId".to_string(),
            Some(ExpectedBsonKind::Binary) => "Vec<u8>".to_string(),
            Some(ExpectedBsonKind::Array) => "Vec<crate::bson::Value>".to_string(),
            Some(ExpectedBsonKind::Document) => "crate::bson::Document".to_string(),
            None => "crate::bson::Value".to_string(),
        }
    };
    if nullable && !column.required && !column.primary_key {
        format!("Option<{base}>")
    } else {
        base
    }
}

fn numeric_alias(type_name: &str) -> String {
    match type_name.trim().to_ascii_lowercase().as_str() {
        "i8" | "byte" => "i8".to_string(),
        "i16" | "short" => "i16".to_string(),
        "i64" | "long" | "int64" => "i64".to_string(),
        "u8" => "u8".to_string(),
        "u16" => "u16".to_string(),
        "u32" => "u32".to_string(),
        "u64" => "u64".to_string(),
        "f32" | "float" => "f32".to_string(),
        "f64" | "double" => "f64".to_string(),
        "decimal" | "decimal128" => "crate::bson::Decimal128".to_string(),
        _ => "i32".to_string(),
    }
}

/// Renders `meta` as a Rust struct source file (spec §4.7 "Host entity
/// source").
pub fn render_entity(meta: &MetadataDocument, options: &CodeGenOptions) -> String {
    let mut used_names = HashSet::new();
    let mut out = String::new();

    if let Some(namespace) = &options.namespace {
        if options.file_scoped_namespace {
            out.push_str(&format!("// module: {namespace}\n\n"));
        }
    }

    let mut body = String::new();
    if options.emit_metadata_attributes {
        body.push_str(&format!("/// Generated from catalog table `{}`.\n", meta.table_name));
        if let Some(desc) = &meta.description {
            body.push_str(&format!("///\n/// {desc}\n"));
        }
    }
    body.push_str("#[derive(Debug, Clone, Default, PartialEq)]\n");
    body.push_str(&format!("pub struct {} {{\n", options.type_name));

    let mut columns: Vec<&Column> = meta.columns.iter().collect();
    columns.sort_by(|a, b| a.order.unwrap_or(i32::MAX).cmp(&b.order.unwrap_or(i32::MAX)).then_with(|| a.name.cmp(&b.name)));

    let mut field_table = Vec::new();
    for column in &columns {
        let raw_name = if column.primary_key { "id".to_string() } else { column.name.clone() };
        let field_name = disambiguate(&mut used_names, clean_identifier(&raw_name));
        let field_type = rust_field_type(column, options.use_language_aliases, options.nullable_annotations);

        if column.primary_key {
            body.push_str("    /// Primary key (`[Id]`-equivalent).\n");
        }
        if let (Some(fk), true) = (&column.foreign_key, options.emit_foreign_key_attributes) {
            body.push_str(&format!("    /// References `{fk}` (`[ForeignKey]`-equivalent).\n"));
        }
        body.push_str(&format!("    pub {field_name}: {field_type},\n"));
        field_table.push((column.name.clone(), field_name, column.primary_key));
    }
    body.push_str("}\n\n");

    #[cfg(feature = "reflection")]
    {
        body.push_str(&format!("impl crate::adapter::reflection::Reflectable for {} {{\n", options.type_name));
        body.push_str(&format!(
            "    fn fields() -> &'static [crate::adapter::reflection::FieldSpec<{}>] {{\n",
            options.type_name
        ));
        body.push_str("        unimplemented!(\"field accessor/mutator function pointers are written by hand per entity\")\n");
        body.push_str("    }\n");
        body.push_str("}\n");
    }

    if let Some(namespace) = &options.namespace {
        if !options.file_scoped_namespace {
            out.push_str(&format!("pub mod {namespace} {{\n"));
            for line in body.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("}\n");
            return out;
        }
    }

    out.push_str(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_struct_with_cleaned_field_names() {
        let meta = MetadataDocument::new(
            "widgets",
            vec![
                Column::new("_id", "int").primary_key(),
                Column::new("2fast", "string").required(),
            ],
        );
        let options = CodeGenOptions { type_name: "Widget".to_string(), ..Default::default() };
        let rendered = render_entity(&meta, &options);
        assert!(rendered.contains("pub struct Widget {"));
        assert!(rendered.contains("pub id: "));
        assert!(rendered.contains("pub _2fast: String"));
    }

    #[test]
    fn keyword_clash_uses_raw_identifier() {
        let meta = MetadataDocument::new("things", vec![Column::new("type", "string")]);
        let rendered = render_entity(&meta, &CodeGenOptions::default());
        assert!(rendered.contains("r#type"));
    }

    #[test]
    fn duplicate_names_get_numeric_suffix() {
        let mut first = Column::new("value", "string");
        first.order = Some(1);
        let mut second = Column::new("value", "string");
        second.order = Some(2);
        let meta = MetadataDocument::new("things", vec![first, second]);
        let rendered = render_entity(&meta, &CodeGenOptions::default());
        assert!(rendered.contains("pub value:"));
        assert!(rendered.contains("pub value_2:"));
    }

    #[test]
    fn file_scoped_namespace_skips_mod_wrapper() {
        let meta = MetadataDocument::new("things", vec![Column::new("name", "string")]);
        let options = CodeGenOptions { namespace: Some("models".into()), file_scoped_namespace: true, ..Default::default() };
        let rendered = render_entity(&meta, &options);
        assert!(rendered.starts_with("// module: models"));
        assert!(!rendered.contains("pub mod models {"));
    }
}
