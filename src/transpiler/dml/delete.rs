use crate::ast::DeleteOp;
use crate::error::CompileResult;

use crate::transpiler::ir::ToSql;
use crate::transpiler::quote_identifier;
use crate::transpiler::select::SelectGenerator;
use crate::transpiler::stage::StageId;

use super::{Aliases, TargetForm, resolve_target, with_row_count};

const ALIASES: Aliases = Aliases {
    target: "__DELETE_TARGET__",
    source: "__DELETE_SOURCE__",
};

/// Render `DELETE FROM .. [USING ..] [WHERE ..]` for the rows selected by `root`.
pub(crate) fn write_delete(generator: &mut SelectGenerator<'_>, root: StageId, op: &DeleteOp) -> CompileResult<String> {
    let np = generator.new_precedence;
    let stages = &mut generator.stages;
    let form = resolve_target(stages, root, &op.target, op.limit, "Delete queries", &ALIASES, np)?;
    let stages = &generator.stages;
    let stage = &stages[root];

    let mut lines = Vec::new();
    match form {
        TargetForm::Simple(target) => {
            lines.push(format!("DELETE FROM {}", target.to_sql(stages)));
            if let Some(from) = &stage.from {
                lines.push(format!("USING {}", from.to_sql(stages)));
            }
            if let Some(predicate) = &stage.where_ {
                lines.push(format!("WHERE {}", predicate.to_sql(stages)));
            }
        }
        TargetForm::General(target) => {
            lines.push(format!("DELETE FROM {}", target.to_sql(stages)));
            lines.push("USING (".to_string());
            lines.push(stage.to_sql(stages));
            lines.push("FOR UPDATE".to_string());
            lines.push(format!(") AS {}", quote_identifier(ALIASES.source)));
            lines.push(ALIASES.row_id_predicate());
        }
    }

    let sql = lines.join("\n");
    Ok(if op.with_row_count {
        with_row_count("__cte_delete__", &sql)
    } else {
        sql
    })
}
