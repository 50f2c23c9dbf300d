use crate::ast::{InsertFromStatement, InsertOp, TableRef};
use crate::error::{CompileError, CompileResult};

use crate::transpiler::ir::{ColumnExpr, ToSql};
use crate::transpiler::literals::{db_type, default_literal};
use crate::transpiler::quote_identifier;
use crate::transpiler::select::SelectGenerator;
use crate::transpiler::stage::StageId;

use super::with_row_count;

const CTE: &str = "__cte_insert__";

fn qualified_table(target: &TableRef) -> String {
    match target.schema.as_deref().filter(|s| !s.is_empty()) {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(target.table_name())),
        None => quote_identifier(target.table_name()),
    }
}

/// Render `INSERT INTO .. (..)` followed by the select at `root`.
pub(crate) fn write_insert(generator: &mut SelectGenerator<'_>, root: StageId, op: &InsertOp) -> CompileResult<String> {
    let mappings = &op.columns.mappings;
    if mappings.is_empty() {
        return Err(CompileError::dml("Column mapping is not set for Insert operation."));
    }
    for (i, mapping) in mappings.iter().enumerate() {
        if mappings[..i].iter().any(|m| m.source == mapping.source) {
            return Err(CompileError::AmbiguousMapping(mapping.target.clone()));
        }
    }

    let columns = generator.stages[root]
        .projection
        .take()
        .ok_or_else(|| CompileError::dml("Insert source has no projection."))?;

    let mut ordered: Vec<Option<ColumnExpr>> = vec![None; mappings.len()];
    for (i, column) in columns.into_iter().enumerate() {
        match mappings.iter().position(|m| m.source == i) {
            Some(slot) => ordered[slot] = Some(column),
            None if op.columns.null_sentinel == Some(i) => {}
            None => return Err(CompileError::dml(format!("Can't find map for column # {}.", i))),
        }
    }
    let mut projection = ordered
        .into_iter()
        .zip(mappings)
        .map(|(column, mapping)| {
            column.ok_or_else(|| CompileError::dml(format!("Can't find map for column {}.", mapping.target)))
        })
        .collect::<CompileResult<Vec<_>>>()?;

    // Discriminators are always inlined.
    let parameterize = std::mem::replace(&mut generator.parameterize, false);
    let discriminators = op
        .discriminators
        .iter()
        .map(|d| {
            let expr = generator.visit_constant(&d.value)?;
            Ok(ColumnExpr::new(expr, format!("__discriminator__{}", d.column), d.value.kind()))
        })
        .collect::<CompileResult<Vec<_>>>();
    generator.parameterize = parameterize;
    projection.extend(discriminators?);
    generator.stages[root].projection = Some(projection);

    let target_columns = mappings
        .iter()
        .map(|m| m.target.as_str())
        .chain(op.discriminators.iter().map(|d| d.column.as_str()))
        .map(quote_identifier)
        .collect::<Vec<_>>();

    tracing::debug!(
        target = %op.target.table_name(),
        columns = target_columns.len(),
        "rendering INSERT .. SELECT"
    );

    let stages = &generator.stages;
    let sql = format!(
        "INSERT INTO {} ({})\n{}",
        qualified_table(&op.target),
        target_columns.join(", "),
        stages[root].to_sql(stages)
    );
    Ok(if op.with_row_count {
        with_row_count(CTE, &sql)
    } else {
        sql
    })
}

/// Render a bulk copy from an already compiled statement. Target columns
/// without a source are filled with a typed default unless nullable.
pub(crate) fn write_insert_from(statement: &InsertFromStatement) -> CompileResult<String> {
    let mut insert_columns = Vec::new();
    let mut select_columns = Vec::new();

    for property in &statement.properties {
        let source = statement
            .mapping
            .iter()
            .find(|(_, target)| *target == property.name)
            .map(|(source, _)| source);
        let column = quote_identifier(&property.name);
        let value = match source {
            Some(source) => quote_identifier(source),
            None if property.nullable => continue,
            None => format!("CAST({} AS {})", default_literal(property.kind)?, db_type(property.kind)?),
        };
        select_columns.push(format!("{} AS {}", value, column));
        insert_columns.push(column);
    }

    let sql = format!(
        "INSERT INTO {}\n({})\nSELECT {} FROM (\n{}\n) AS x__subquery",
        qualified_table(&statement.target),
        insert_columns.join(", "),
        select_columns.join(", "),
        statement.sql
    );
    Ok(if statement.with_row_count {
        with_row_count(CTE, &sql)
    } else {
        sql
    })
}
