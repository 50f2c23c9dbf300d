//! Relational tree to PostgreSQL SQL.
//!
//! The select generator lowers the tree into a flat arena of SELECT stages
//! linked by id. DML operations then rewrite the outermost stage into
//! `DELETE`, `UPDATE` or `INSERT` text.

mod dml;
mod functions;
mod ir;
mod literals;
mod operators;
mod result;
mod scalar;
mod select;
mod stage;

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::ast::{DmlOperation, Expr, InsertFromStatement};
use crate::config::CompilerOptions;
use crate::error::CompileResult;

pub use result::{ParameterDecl, ResultColumn};

use ir::ToSql;
use select::SelectGenerator;

/// Double-quote an identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL text with the parameters it binds and the shape of its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledCommand {
    pub sql: String,
    pub parameters: Vec<ParameterDecl>,
    pub columns: Vec<ResultColumn>,
}

/// Compile a query tree, optionally rewritten into the given mutation.
///
/// The query must be a collection expression. With a DML operation it
/// selects the rows to mutate and the result is always a single `C1`
/// column.
pub fn compile(query: &Expr, dml: Option<&DmlOperation>, options: &CompilerOptions) -> CompileResult<CompiledCommand> {
    let mut generator = SelectGenerator::new(options, dml);
    let root = generator.visit_root(query)?;
    tracing::trace!(stages = generator.stages.len(), "query tree lowered");

    let (sql, columns) = match dml {
        None => {
            let stage = &generator.stages[root];
            let columns = stage
                .projection
                .as_deref()
                .map(ResultColumn::from_projection)
                .unwrap_or_default();
            (stage.to_sql(&generator.stages), columns)
        }
        Some(DmlOperation::Delete(op)) => (dml::delete::write_delete(&mut generator, root, op)?, ResultColumn::row_count()),
        Some(DmlOperation::Update(op)) => (dml::update::write_update(&mut generator, root, op)?, ResultColumn::row_count()),
        Some(DmlOperation::Insert(op)) => (dml::insert::write_insert(&mut generator, root, op)?, ResultColumn::row_count()),
    };

    tracing::debug!(bytes = sql.len(), parameters = generator.parameters.len(), "statement compiled");
    Ok(CompiledCommand {
        sql,
        parameters: generator.parameters,
        columns,
    })
}

/// Compile a bulk copy from an already compiled SELECT.
pub fn compile_insert_from_statement(statement: &InsertFromStatement) -> CompileResult<CompiledCommand> {
    Ok(CompiledCommand {
        sql: dml::insert::write_insert_from(statement)?,
        parameters: Vec::new(),
        columns: ResultColumn::row_count(),
    })
}
