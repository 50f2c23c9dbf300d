//! Rewriting a row-selecting pipeline into UPDATE, DELETE or INSERT.
//!
//! UPDATE and DELETE name the target directly when the outermost stage
//! reads it straight from a scan, or from one bare leg of an inner join.
//! Otherwise the whole select becomes a locked derived table and rows are
//! matched back to the target through their physical row identifier.

pub(crate) mod delete;
pub(crate) mod insert;
pub(crate) mod target;
pub(crate) mod update;

use crate::ast::{JoinKind, TableRef};
use crate::error::{CompileError, CompileResult};

use super::ir::{CTID_ALIAS, CTID_COLUMN, SqlExpr};
use super::operators::{Operator, OperatorExpr};
use super::quote_identifier;
use super::stage::{FromClause, FromExpr, FromSource, InputExpr, LimitClause, StageId, Stages};
use target::pull_up_row_id;

/// Wrap a statement so that it returns the number of affected rows.
pub(crate) fn with_row_count(cte: &str, dml: &str) -> String {
    format!("WITH {cte} AS (\n{dml}\n    RETURNING 1\n)\nSELECT count(1) FROM {cte}")
}

/// How the mutation reaches its target.
#[derive(Debug)]
pub(crate) enum TargetForm {
    /// The target is named directly. The stage's remaining FROM and WHERE
    /// complete the statement.
    Simple(FromExpr),
    /// The target is matched against the row identifiers of the select.
    General(FromExpr),
}

/// Names used by the general form.
pub(crate) struct Aliases {
    pub target: &'static str,
    pub source: &'static str,
}

impl Aliases {
    /// `WHERE "target".CTID = "source"."__internal_row_id__"`
    pub fn row_id_predicate(&self) -> String {
        format!(
            "WHERE {}.{} = {}.{}",
            quote_identifier(self.target),
            CTID_COLUMN,
            quote_identifier(self.source),
            quote_identifier(CTID_ALIAS)
        )
    }
}

/// Validate the outermost stage of an UPDATE or DELETE and choose its form.
pub(crate) fn resolve_target(
    stages: &mut Stages,
    root: StageId,
    target: &TableRef,
    limit: Option<u64>,
    noun: &str,
    aliases: &Aliases,
    new_precedence: bool,
) -> CompileResult<TargetForm> {
    let stage = &mut stages[root];
    if stage.order_by.is_some() {
        return Err(CompileError::dml(format!("OrderBy is not supported in {}.", noun)));
    }
    if stage.group_by.is_some() {
        return Err(CompileError::dml(format!("GroupBy is not supported in {}.", noun)));
    }
    if stage.distinct {
        return Err(CompileError::dml(format!("Distinct is not supported in {}.", noun)));
    }
    if let Some(limit) = limit {
        if stage.limit.is_some() || stage.skip.is_some() {
            return Err(CompileError::dml("Take / Skip is not supported in Updatable queries."));
        }
        stage.limit = Some(LimitClause {
            arg: SqlExpr::literal(limit.to_string()),
            with_ties: false,
        });
    }

    if let Some((direct, from, condition)) = analyze_from(stages, root, target) {
        let stage = &mut stages[root];
        stage.from = from;
        if let Some(condition) = condition {
            stage.where_ = Some(match stage.where_.take() {
                Some(existing) => OperatorExpr::binary(Operator::And, new_precedence, condition, existing),
                None => condition,
            });
        }
        tracing::debug!(target = %target.table_name(), "DML target referenced directly");
        return Ok(TargetForm::Simple(direct));
    }

    let found = pull_up_row_id(target, stages, root, true)
        .and_then(|source| source.target_from)
        .ok_or_else(|| CompileError::dml("Can't project CTID column for query."))?;
    tracing::debug!(target = %target.table_name(), "DML target matched by row identifier");
    Ok(TargetForm::General(FromExpr::new(found.source, aliases.target)))
}

/// The target's FROM entry, the FROM left over once it is removed, and
/// the join condition to move into WHERE.
fn analyze_from(
    stages: &Stages,
    root: StageId,
    target: &TableRef,
) -> Option<(FromExpr, Option<FromClause>, Option<SqlExpr>)> {
    let stage = &stages[root];
    if stage.limit.is_some() || stage.skip.is_some() {
        return None;
    }
    match stage.from.as_ref()? {
        FromClause::Table(fe) if fe.scan().is_some_and(|scan| scan.table.is_same_table(target)) => {
            Some((fe.clone(), None, None))
        }
        FromClause::Join(join) if join.kind == JoinKind::Inner => {
            if let Some(fe) = bare_target(stages, &join.left, target) {
                Some((fe.clone(), Some(join.right.clone()), join.condition.clone()))
            } else {
                bare_target(stages, &join.right, target)
                    .map(|fe| (fe.clone(), Some(join.left.clone()), join.condition.clone()))
            }
        }
        _ => None,
    }
}

/// A join leg that is nothing but a scan of the target.
fn bare_target<'s>(stages: &Stages, leg: &'s FromClause, target: &TableRef) -> Option<&'s FromExpr> {
    let FromClause::Table(fe) = leg else {
        return None;
    };
    let FromSource::Stage(id) = fe.source else {
        return None;
    };
    let InputExpr {
        from: Some(FromClause::Table(inner)),
        where_: None,
        distinct: false,
        limit: None,
        projection: None,
        skip: None,
        group_by: None,
        order_by: None,
        ..
    } = &stages[id]
    else {
        return None;
    };
    inner
        .scan()
        .filter(|scan| scan.table.is_same_table(target))
        .map(|_| fe)
}
