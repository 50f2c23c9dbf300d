//! Transpiler test modules.
//!
//! - `core`: pipelines of scans, filters, projections, joins and groupings
//! - `operators`: precedence, negation and the two precedence regimes
//! - `functions`: canonical and backend function translation
//! - `dml`: DELETE, UPDATE and INSERT rewriting

mod core;
mod dml;
mod operators;

use crate::ast::builders::*;
use crate::ast::{Expr, PrimitiveKind, TableRef};
use crate::config::CompilerOptions;
use crate::error::CompileResult;

use super::{CompiledCommand, compile};

pub(super) fn posts() -> Expr {
    scan(TableRef::new("Posts").in_schema("dbo"))
}

pub(super) fn blogs() -> Expr {
    scan(TableRef::new("Blogs").in_schema("dbo"))
}

pub(super) fn sql(tree: &Expr) -> String {
    compile(tree, None, &CompilerOptions::default()).unwrap().sql
}

const PREDICATE_PREFIX: &str = r#"SELECT 1 AS "C1" FROM "dbo"."Posts" AS "Extent1" WHERE "#;
const VALUE_SUFFIX: &str = r#" AS "C1" FROM "dbo"."Posts" AS "Extent1""#;

fn filtered(predicate: Expr) -> Expr {
    project(
        "Filter1",
        filter("Extent1", posts(), predicate),
        vec![column("C1", int(1), PrimitiveKind::Int32)],
    )
}

/// Compile `SELECT 1 FROM Posts AS Extent1 WHERE <predicate>` and return the predicate.
pub(super) fn predicate_sql_with(predicate: Expr, options: &CompilerOptions) -> String {
    let sql = compile(&filtered(predicate), None, options).unwrap().sql;
    sql.strip_prefix(PREDICATE_PREFIX)
        .unwrap_or_else(|| panic!("unexpected statement: {}", sql))
        .to_string()
}

pub(super) fn predicate_sql(predicate: Expr) -> String {
    predicate_sql_with(predicate, &CompilerOptions::default())
}

fn valued(expr: Expr) -> Expr {
    project("Extent1", posts(), vec![column("C1", expr, PrimitiveKind::Int32)])
}

pub(super) fn try_value(expr: Expr) -> CompileResult<CompiledCommand> {
    compile(&valued(expr), None, &CompilerOptions::default())
}

/// Compile `SELECT <expr> AS "C1" FROM Posts AS Extent1` and return the expression.
pub(super) fn value_sql(expr: Expr) -> String {
    let sql = try_value(expr).unwrap().sql;
    let rest = sql
        .strip_prefix("SELECT ")
        .and_then(|s| s.strip_suffix(VALUE_SUFFIX))
        .unwrap_or_else(|| panic!("unexpected statement: {}", sql));
    rest.to_string()
}
