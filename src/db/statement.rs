//! SELECT/UPDATE construction for the accessor's single row.
//!
//! Values go through [`quote`]; table and column names are used verbatim.

use crate::db::quote::quote;
use crate::models::{DriverKind, FieldValue, Predicate};

/// `col=value` clauses joined with ` AND `, or `None` for an empty predicate.
pub fn where_clause(predicate: &Predicate, driver: DriverKind) -> Option<String> {
    if predicate.is_empty() {
        return None;
    }
    let clauses: Vec<String> = predicate
        .iter()
        .map(|(column, value)| format!("{column}={}", quote(value, driver)))
        .collect();
    Some(clauses.join(" AND "))
}

pub fn select_statement<S: AsRef<str>>(fields: &[S], table: &str, where_clause: &str) -> String {
    let fields: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
    format!("SELECT {} FROM {table} WHERE {where_clause}", fields.join(","))
}

pub fn update_statement(
    table: &str,
    assignments: &[(String, FieldValue)],
    driver: DriverKind,
    where_clause: &str,
) -> String {
    let sets: Vec<String> = assignments
        .iter()
        .map(|(field, value)| format!("{field}={}", quote(value, driver)))
        .collect();
    format!("UPDATE {table} SET {} WHERE {where_clause}", sets.join(","))
}
