use crate::ast::UpdateOp;
use crate::error::{CompileError, CompileResult};

use crate::transpiler::ir::{CTID_ALIAS, ToSql};
use crate::transpiler::quote_identifier;
use crate::transpiler::select::SelectGenerator;
use crate::transpiler::stage::{InputExpr, StageId, Stages};

use super::{Aliases, TargetForm, resolve_target, with_row_count};

const ALIASES: Aliases = Aliases {
    target: "__UPDATE_TARGET__",
    source: "__UPDATE_SOURCE__",
};

/// Render `UPDATE .. SET .. [FROM ..] [WHERE ..]`. Projected columns are
/// assigned to the target columns they are mapped to.
pub(crate) fn write_update(generator: &mut SelectGenerator<'_>, root: StageId, op: &UpdateOp) -> CompileResult<String> {
    let np = generator.new_precedence;
    let form = resolve_target(&mut generator.stages, root, &op.target, op.limit, "Updatable queries", &ALIASES, np)?;
    let stages = &generator.stages;
    let stage = &stages[root];

    let mut sql = String::from("UPDATE ");
    let (target, simple) = match &form {
        TargetForm::Simple(target) => (target, true),
        TargetForm::General(target) => (target, false),
    };
    target.write_sql(stages, &mut sql);
    write_set_clause(stages, stage, op, simple, &mut sql)?;

    if simple {
        if let Some(from) = &stage.from {
            sql.push_str("\nFROM ");
            from.write_sql(stages, &mut sql);
        }
        if let Some(predicate) = &stage.where_ {
            sql.push_str("\nWHERE ");
            predicate.write_sql(stages, &mut sql);
        }
    } else {
        sql.push_str("\nFROM (\n");
        stage.write_sql(stages, &mut sql);
        sql.push_str("\nFOR UPDATE\n) AS ");
        sql.push_str(&quote_identifier(ALIASES.source));
        sql.push('\n');
        sql.push_str(&ALIASES.row_id_predicate());
    }

    Ok(if op.with_row_count {
        with_row_count("__cte_update__", &sql)
    } else {
        sql
    })
}

fn write_set_clause(stages: &Stages, stage: &InputExpr, op: &UpdateOp, simple: bool, sql: &mut String) -> CompileResult<()> {
    sql.push_str("\nSET");
    let columns = stage.projection.as_deref().unwrap_or_default();
    let mut any = false;
    for (i, column) in columns.iter().enumerate() {
        let Some(target) = op.columns.target_of(i) else {
            if op.columns.null_sentinel == Some(i) || column.name == CTID_ALIAS {
                continue;
            }
            return Err(CompileError::dml(format!("Can't find map for column # {}.", i)));
        };

        if any {
            sql.push(',');
        }
        sql.push_str("\n    ");
        sql.push_str(&quote_identifier(target));
        sql.push_str(" = ");
        if simple {
            column.expr.write_sql(stages, sql);
        } else {
            sql.push_str(&quote_identifier(ALIASES.source));
            sql.push('.');
            sql.push_str(&quote_identifier(&column.name));
        }
        any = true;
    }

    if !any {
        return Err(CompileError::dml("No columns in Update."));
    }
    Ok(())
}
