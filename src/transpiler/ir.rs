//! Intermediate representation of generated SQL.
//!
//! Nodes are uniquely owned by their parent. Pipeline stages live in the
//! `Stages` arena and are referenced by id, since a stage is shared between
//! the projection chains that pull columns through it.

use crate::ast::{SortOrder, Value};

use super::literals::write_literal;
use super::operators::OperatorExpr;
use super::quote_identifier;
use super::stage::{StageId, Stages};

/// Physical row identifier pseudo-column.
pub const CTID_COLUMN: &str = "CTID";
/// Output alias of the row identifier when pulled through a stage.
pub const CTID_ALIAS: &str = "__internal_row_id__";

/// Rendering of IR nodes into a SQL buffer.
pub(crate) trait ToSql {
    fn write_sql(&self, stages: &Stages, sql: &mut String);

    fn to_sql(&self, stages: &Stages) -> String {
        let mut sql = String::new();
        self.write_sql(stages, &mut sql);
        sql
    }
}

/// A scalar SQL expression.
#[derive(Debug, Clone)]
pub(crate) enum SqlExpr {
    /// Raw text, emitted as is.
    Literal(String),
    /// Fragments emitted back to back.
    Seq(Vec<SqlExpr>),
    Constant(Value),
    Column(ColumnRef),
    Function(FunctionExpr),
    Cast {
        value: Box<SqlExpr>,
        ty: String,
    },
    Operator(OperatorExpr),
    /// `(a) AND (b)`, right operand of BETWEEN.
    BetweenBounds(Box<SqlExpr>, Box<SqlExpr>),
    /// `(a,b,c)`, right operand of IN.
    List(Vec<SqlExpr>),
    Exists(Box<SqlExpr>),
    /// A nested pipeline stage rendered as a SELECT.
    Select(StageId),
    TruncateTime {
        unit: &'static str,
        arg: Box<SqlExpr>,
    },
    Case {
        whens: Vec<(SqlExpr, SqlExpr)>,
        otherwise: Option<Box<SqlExpr>>,
    },
}

impl SqlExpr {
    pub fn literal(text: impl Into<String>) -> Self {
        SqlExpr::Literal(text.into())
    }

    pub fn cast(value: SqlExpr, ty: impl Into<String>) -> Self {
        SqlExpr::Cast {
            value: Box::new(value),
            ty: ty.into(),
        }
    }

    /// `self` followed by a raw suffix such as `::int4`.
    pub fn suffixed(self, suffix: &str) -> Self {
        SqlExpr::Seq(vec![self, SqlExpr::literal(suffix)])
    }

    pub fn as_operator(&self) -> Option<&OperatorExpr> {
        match self {
            SqlExpr::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_literal(&self, text: &str) -> bool {
        matches!(self, SqlExpr::Literal(l) if l == text)
    }
}

impl ToSql for SqlExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        match self {
            SqlExpr::Literal(text) => sql.push_str(text),
            SqlExpr::Seq(parts) => {
                for part in parts {
                    part.write_sql(stages, sql);
                }
            }
            SqlExpr::Constant(value) => write_literal(value, sql),
            SqlExpr::Column(column) => column.write_sql(stages, sql),
            SqlExpr::Function(function) => function.write_sql(stages, sql),
            SqlExpr::Cast { value, ty } => {
                sql.push_str("CAST (");
                value.write_sql(stages, sql);
                sql.push_str(" AS ");
                sql.push_str(ty);
                sql.push(')');
            }
            SqlExpr::Operator(op) => op.write_sql(stages, sql),
            SqlExpr::BetweenBounds(begin, end) => {
                sql.push('(');
                begin.write_sql(stages, sql);
                sql.push_str(") AND (");
                end.write_sql(stages, sql);
                sql.push(')');
            }
            SqlExpr::List(items) => {
                sql.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        sql.push(',');
                    }
                    item.write_sql(stages, sql);
                }
                sql.push(')');
            }
            SqlExpr::Exists(arg) => {
                sql.push_str("EXISTS (");
                arg.write_sql(stages, sql);
                sql.push(')');
            }
            SqlExpr::Select(id) => stages[*id].write_sql(stages, sql),
            SqlExpr::TruncateTime { unit, arg } => {
                sql.push_str("date_trunc('");
                sql.push_str(unit);
                sql.push_str("',");
                arg.write_sql(stages, sql);
                sql.push(')');
            }
            SqlExpr::Case { whens, otherwise } => {
                sql.push_str("CASE");
                for (when, then) in whens {
                    sql.push_str(" WHEN (");
                    when.write_sql(stages, sql);
                    sql.push_str(") THEN (");
                    then.write_sql(stages, sql);
                    sql.push(')');
                }
                if let Some(otherwise) = otherwise {
                    sql.push_str(" ELSE (");
                    otherwise.write_sql(stages, sql);
                    sql.push(')');
                }
                sql.push_str(" END");
            }
        }
    }
}

/// `"var"."name"`, optionally with a `::cast` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnRef {
    pub var: Option<String>,
    pub name: String,
    pub quote: bool,
}

impl ColumnRef {
    pub fn new(var: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
            name: name.into(),
            quote: true,
        }
    }

    /// Reference whose name is emitted quoted unless it is the row identifier.
    pub fn row_id_aware(var: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let quote = name != CTID_COLUMN;
        Self {
            var: Some(var.into()),
            name,
            quote,
        }
    }
}

impl ToSql for ColumnRef {
    fn write_sql(&self, _stages: &Stages, sql: &mut String) {
        if let Some(var) = &self.var {
            sql.push_str(&quote_identifier(var));
            sql.push('.');
        }
        if self.quote {
            sql.push_str(&quote_identifier(&self.name));
        } else {
            sql.push_str(&self.name);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WindowClause {
    pub partition_by: Vec<SqlExpr>,
    pub order_by: Vec<(SqlExpr, SortOrder)>,
}

/// `name(arg,arg)` with an optional `OVER (...)` clause.
#[derive(Debug, Clone)]
pub(crate) struct FunctionExpr {
    pub name: String,
    pub args: Vec<SqlExpr>,
    pub window: Option<WindowClause>,
}

impl FunctionExpr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            window: None,
        }
    }

    pub fn arg(mut self, arg: SqlExpr) -> Self {
        self.args.push(arg);
        self
    }

    pub fn literal_arg(self, text: &str) -> Self {
        self.arg(SqlExpr::literal(text))
    }

    pub fn into_expr(self) -> SqlExpr {
        SqlExpr::Function(self)
    }
}

impl ToSql for FunctionExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        sql.push_str(&self.name);
        sql.push('(');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            arg.write_sql(stages, sql);
        }
        sql.push(')');

        if let Some(window) = &self.window {
            sql.push_str(" OVER (");
            if !window.partition_by.is_empty() {
                sql.push_str("PARTITION BY ");
                write_comma_list(&window.partition_by, stages, sql);
            }
            if !window.order_by.is_empty() {
                if !window.partition_by.is_empty() {
                    sql.push(' ');
                }
                sql.push_str("ORDER BY ");
                write_sort_list(&window.order_by, stages, sql);
            }
            sql.push(')');
        }
    }
}

/// A projected output column: `expr AS "name"`.
#[derive(Debug, Clone)]
pub(crate) struct ColumnExpr {
    pub expr: SqlExpr,
    pub name: String,
    pub kind: crate::ast::PrimitiveKind,
}

impl ColumnExpr {
    pub fn new(expr: SqlExpr, name: impl Into<String>, kind: crate::ast::PrimitiveKind) -> Self {
        Self {
            expr,
            name: name.into(),
            kind,
        }
    }
}

impl ToSql for ColumnExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        self.expr.write_sql(stages, sql);
        let same_name = matches!(&self.expr, SqlExpr::Column(c) if c.name == self.name);
        if !same_name {
            sql.push_str(" AS ");
            sql.push_str(&quote_identifier(&self.name));
        }
    }
}

pub(crate) fn write_comma_list<T: ToSql>(items: &[T], stages: &Stages, sql: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        item.write_sql(stages, sql);
    }
}

pub(crate) fn write_sort_list(keys: &[(SqlExpr, SortOrder)], stages: &Stages, sql: &mut String) {
    for (i, (key, order)) in keys.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        key.write_sql(stages, sql);
        sql.push_str(match order {
            SortOrder::Asc => " ASC",
            SortOrder::Desc => " DESC",
        });
    }
}
