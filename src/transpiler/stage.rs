//! SELECT-shaped pipeline stages and their FROM clauses.

use std::collections::HashSet;
use std::ops::{Index, IndexMut};

use crate::ast::{SetOpKind, SortOrder, TableRef};
use crate::ast::JoinKind;

use super::ir::{ColumnExpr, CTID_ALIAS, CTID_COLUMN, SqlExpr, ToSql, write_comma_list, write_sort_list};
use super::operators::{Operator, OperatorExpr};
use super::quote_identifier;

/// Index of a stage in the [`Stages`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StageId(usize);

/// Arena owning every stage created during one compilation.
#[derive(Debug, Default)]
pub(crate) struct Stages {
    stages: Vec<InputExpr>,
}

impl Stages {
    pub fn push(&mut self, stage: InputExpr) -> StageId {
        self.stages.push(stage);
        StageId(self.stages.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

impl Index<StageId> for Stages {
    type Output = InputExpr;

    fn index(&self, id: StageId) -> &InputExpr {
        &self.stages[id.0]
    }
}

impl IndexMut<StageId> for Stages {
    fn index_mut(&mut self, id: StageId) -> &mut InputExpr {
        &mut self.stages[id.0]
    }
}

/// A column pulled through a stage that has no explicit projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PulledColumn {
    pub source: String,
    pub column: String,
    pub alias: String,
}

/// `(source, column) -> alias` in insertion order, plus the aliases in use.
#[derive(Debug, Clone, Default)]
pub(crate) struct PulledColumns {
    entries: Vec<PulledColumn>,
    names: HashSet<String>,
}

impl PulledColumns {
    pub fn get(&self, source: &str, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|c| c.source == source && c.column == column)
            .map(|c| c.alias.as_str())
    }

    /// Register a column unless `(source, column)` is already present.
    pub fn insert(&mut self, source: impl Into<String>, column: impl Into<String>, alias: impl Into<String>) {
        let (source, column, alias) = (source.into(), column.into(), alias.into());
        if self.get(&source, &column).is_some() {
            return;
        }
        self.names.insert(alias.clone());
        self.entries.push(PulledColumn { source, column, alias });
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.names.contains(alias)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PulledColumn> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LimitClause {
    pub arg: SqlExpr,
    pub with_ties: bool,
}

/// One SELECT: projection, FROM and the clauses layered on it.
#[derive(Debug, Clone, Default)]
pub(crate) struct InputExpr {
    pub distinct: bool,
    /// Must stay a derived table even when otherwise bare.
    pub is_subquery: bool,
    pub projection: Option<Vec<ColumnExpr>>,
    pub pulled: PulledColumns,
    pub from: Option<FromClause>,
    pub where_: Option<SqlExpr>,
    pub group_by: Option<Vec<SqlExpr>>,
    pub order_by: Option<Vec<(SqlExpr, SortOrder)>>,
    pub skip: Option<SqlExpr>,
    pub limit: Option<LimitClause>,
}

impl InputExpr {
    /// `SELECT ... FROM <source> AS "name"`.
    pub fn from_source(source: FromSource, name: impl Into<String>) -> Self {
        Self {
            from: Some(FromClause::Table(FromExpr::new(source, name))),
            ..Self::default()
        }
    }

    /// Conjoin a predicate onto the WHERE clause.
    pub fn and_where(&mut self, predicate: SqlExpr) {
        self.where_ = Some(match self.where_.take() {
            Some(existing) => OperatorExpr::binary(Operator::And, true, existing, predicate),
            None => predicate,
        });
    }

    /// Alias the stage's FROM table is bound to.
    pub fn from_name(&self) -> Option<&str> {
        match &self.from {
            Some(FromClause::Table(fe)) => Some(&fe.name),
            _ => None,
        }
    }

    /// Whether the stage renders as nothing but its FROM source.
    pub fn is_bare(&self) -> bool {
        self.projection.is_none()
            && self.where_.is_none()
            && !self.distinct
            && self.order_by.is_none()
            && self.skip.is_none()
            && self.limit.is_none()
            && !self.is_subquery
    }
}

impl ToSql for InputExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        match &self.projection {
            Some(columns) => write_comma_list(columns, stages, sql),
            None if self.pulled.is_empty() => sql.push('1'),
            None => {
                for (i, c) in self.pulled.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push_str(&quote_identifier(&c.source));
                    sql.push('.');
                    if c.column == CTID_COLUMN && c.alias == CTID_ALIAS {
                        sql.push_str(&c.column);
                    } else {
                        sql.push_str(&quote_identifier(&c.column));
                    }
                    if c.column != c.alias {
                        sql.push_str(" AS ");
                        sql.push_str(&quote_identifier(&c.alias));
                    }
                }
            }
        }
        if let Some(from) = &self.from {
            sql.push_str(" FROM ");
            from.write_sql(stages, sql);
        }
        if let Some(predicate) = &self.where_ {
            sql.push_str(" WHERE ");
            predicate.write_sql(stages, sql);
        }
        if let Some(keys) = self.group_by.as_ref().filter(|k| !k.is_empty()) {
            sql.push_str(" GROUP BY ");
            write_comma_list(keys, stages, sql);
        }
        if let Some(keys) = &self.order_by {
            sql.push_str(" ORDER BY ");
            write_sort_list(keys, stages, sql);
        }
        if let Some(skip) = &self.skip {
            sql.push_str(" OFFSET ");
            skip.write_sql(stages, sql);
        }
        if let Some(limit) = &self.limit {
            if limit.with_ties {
                sql.push_str(" FETCH FIRST ");
                limit.arg.write_sql(stages, sql);
                sql.push_str(" ROWS WITH TIES");
            } else {
                sql.push_str(" LIMIT ");
                limit.arg.write_sql(stages, sql);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FromClause {
    Table(FromExpr),
    Join(Box<JoinExpr>),
}

impl ToSql for FromClause {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        match self {
            FromClause::Table(fe) => fe.write_sql(stages, sql),
            FromClause::Join(join) => join.write_sql(stages, sql),
        }
    }
}

/// Scanned table: its rendered name and identity.
#[derive(Debug, Clone)]
pub(crate) struct ScanExpr {
    pub text: String,
    pub table: TableRef,
}

#[derive(Debug, Clone)]
pub(crate) enum FromSource {
    Stage(StageId),
    Scan(ScanExpr),
    /// Table-valued function call.
    Function(SqlExpr),
    /// Raw text such as an inline row constructor or a defining query.
    Literal(SqlExpr),
    /// Set operation over several stages.
    Combined(SetOpKind, Vec<StageId>),
}

/// `<source> AS "name"`.
#[derive(Debug, Clone)]
pub(crate) struct FromExpr {
    pub source: FromSource,
    pub name: String,
    pub column_spec: Option<String>,
    /// The right leg of a lateral join must stay a derived table.
    pub force_subquery: bool,
}

impl FromExpr {
    pub fn new(source: FromSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            column_spec: None,
            force_subquery: false,
        }
    }

    pub fn with_column_spec(mut self, spec: impl Into<String>) -> Self {
        self.column_spec = Some(spec.into());
        self
    }

    /// Whether the wrapped stage can be written as its own FROM source.
    pub fn can_skip_subquery(&self, stages: &Stages) -> bool {
        match self.source {
            FromSource::Stage(id) => !self.force_subquery && stages[id].is_bare(),
            _ => false,
        }
    }

    pub fn scan(&self) -> Option<&ScanExpr> {
        match &self.source {
            FromSource::Scan(scan) => Some(scan),
            _ => None,
        }
    }

    fn write_alias(&self, sql: &mut String) {
        sql.push_str(" AS ");
        sql.push_str(&quote_identifier(&self.name));
        if let Some(spec) = &self.column_spec {
            sql.push_str(spec);
        }
    }
}

impl ToSql for FromExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        match &self.source {
            FromSource::Stage(id) => {
                let input = &stages[*id];
                // A bare stage is `SELECT .. FROM <x> AS "name"` under the same
                // name, so its own FROM stands in for it.
                let inner = match &input.from {
                    Some(FromClause::Table(inner)) if inner.name == self.name => Some(inner),
                    _ => None,
                };
                match inner {
                    Some(inner) if self.can_skip_subquery(stages) => inner.write_sql(stages, sql),
                    _ => {
                        sql.push('(');
                        input.write_sql(stages, sql);
                        sql.push(')');
                        self.write_alias(sql);
                    }
                }
            }
            FromSource::Scan(scan) => {
                sql.push_str(&scan.text);
                self.write_alias(sql);
            }
            FromSource::Function(expr) | FromSource::Literal(expr) => {
                expr.write_sql(stages, sql);
                self.write_alias(sql);
            }
            FromSource::Combined(op, branches) => {
                sql.push('(');
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        sql.push(' ');
                        sql.push_str(&op.to_string());
                        sql.push(' ');
                    }
                    sql.push('(');
                    stages[*branch].write_sql(stages, sql);
                    sql.push(')');
                }
                sql.push(')');
                self.write_alias(sql);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct JoinExpr {
    pub left: FromClause,
    pub kind: JoinKind,
    pub right: FromClause,
    pub condition: Option<SqlExpr>,
}

impl ToSql for JoinExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        self.left.write_sql(stages, sql);
        sql.push(' ');
        sql.push_str(&self.kind.to_string());
        sql.push(' ');
        self.right.write_sql(stages, sql);
        if self.kind == JoinKind::OuterApply {
            sql.push_str(" ON TRUE");
        } else if let Some(condition) = self.condition.as_ref().filter(|_| self.kind.has_condition()) {
            sql.push_str(" ON ");
            condition.write_sql(stages, sql);
        }
    }
}
