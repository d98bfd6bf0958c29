//! DDL emitter (spec §4.7): renders a [`MetadataDocument`] as the
//! `TinyDbDDL` textual syntax. Deterministic: same input always renders
//! the same bytes, which is what makes this usable as a migration/diff
//! artifact instead of just a debugging dump.

use crate::bson::Value;
use crate::catalog::{Column, MetadataDocument};

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Renders a default value the way `dv` clauses expect (spec §4.7
/// "Default-value rendering").
fn render_default(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Int32(i) => i.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Double(d) => format!("{d}"),
        Value::Decimal128(d) => d.to_string(),
        Value::String(s) | Value::Symbol(s) => quote(s),
        Value::DateTime(dt) => format!("datetime({})", quote(&dt.to_rfc3339())),
        other => quote(&format!("{other:?}")),
    }
}

fn render_column(column: &Column) -> String {
    let mut clauses = vec![format!("{} \"{}\"", quote(&column.name), column.type_name)];
    if column.primary_key {
        clauses.push("pk".to_string());
    }
    if column.required {
        clauses.push("required".to_string());
    }
    if let Some(pn) = &column.property_name {
        clauses.push(format!("pn {}", quote(pn)));
    }
    if let Some(order) = column.order {
        clauses.push(format!("order {order}"));
    }
    if let Some(dn) = &column.display_name {
        clauses.push(format!("dn {}", quote(dn)));
    }
    if let Some(desc) = &column.description {
        clauses.push(format!("desc {}", quote(desc)));
    }
    if let Some(fk) = &column.foreign_key {
        clauses.push(format!("fk {}", quote(fk)));
    }
    if let Some(dv) = &column.default_value {
        clauses.push(format!("dv {}", render_default(dv)));
    }
    clauses.join(" ")
}

/// Renders `meta` as a complete `-- TinyDbDDL v1` statement block (spec
/// §4.7). Columns sorted by `(order asc, name asc)`.
pub fn render(meta: &MetadataDocument) -> String {
    let mut columns: Vec<&Column> = meta.columns.iter().collect();
    columns.sort_by(|a, b| a.order.unwrap_or(i32::MAX).cmp(&b.order.unwrap_or(i32::MAX)).then_with(|| a.name.cmp(&b.name)));

    let mut header = format!("create table {}", quote(&meta.table_name));
    if let Some(entity_type) = &meta.entity_type {
        header.push_str(&format!(" type {}", quote(entity_type)));
    }
    if let Some(display_name) = &meta.display_name {
        header.push_str(&format!(" display {}", quote(display_name)));
    }
    if let Some(description) = &meta.description {
        header.push_str(&format!(" desc {}", quote(description)));
    }

    let mut out = String::from("-- TinyDbDDL v1\n");
    out.push_str(&header);
    out.push_str(" (\n");
    for (i, column) in columns.iter().enumerate() {
        out.push_str("    ");
        out.push_str(&render_column(column));
        if i + 1 != columns.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(");\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_and_sorted_columns() {
        let meta = MetadataDocument::new(
            "widgets",
            vec![
                Column::new("name", "string").required(),
                Column::new("_id", "int").primary_key(),
            ],
        );
        let rendered = render(&meta);
        assert!(rendered.starts_with("-- TinyDbDDL v1\n"));
        // "_id" sorts before "name" with no explicit order (both MAX, tie broken by name).
        let id_pos = rendered.find("\"_id\"").unwrap();
        let name_pos = rendered.find("\"name\"").unwrap();
        assert!(id_pos < name_pos);
    }

    #[test]
    fn renders_default_value_variants() {
        assert_eq!(render_default(&Value::Null), "null");
        assert_eq!(render_default(&Value::Boolean(true)), "true");
        assert_eq!(render_default(&Value::Int32(5)), "5");
        assert_eq!(render_default(&Value::String("hi".into())), "\"hi\"");
    }

    #[test]
    fn order_overrides_alphabetical_sort() {
        let mut col_b = Column::new("b", "string");
        col_b.order = Some(1);
        let mut col_a = Column::new("a", "string");
        col_a.order = Some(2);
        let meta = MetadataDocument::new("t", vec![col_a, col_b]);
        let rendered = render(&meta);
        assert!(rendered.find("\"b\"").unwrap() < rendered.find("\"a\"").unwrap());
    }
}
