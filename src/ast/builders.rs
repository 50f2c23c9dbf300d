//! Free-function builders for relational trees.
//!
//! ```
//! use relsql::ast::builders::*;
//! use relsql::ast::{PrimitiveKind, TableRef};
//!
//! let posts = scan(TableRef::new("Posts").in_schema("dbo"));
//! let query = project(
//!     "Filter1",
//!     filter("Extent1", posts, eq(col("Extent1", "BlogId"), int(5))),
//!     vec![column("Title", col("Filter1", "Title"), PrimitiveKind::String)],
//! );
//! assert!(matches!(query, relsql::ast::Expr::Project { .. }));
//! ```

use super::expr::{Binding, CaseWhen, Expr, FunctionCall, ProjectColumn, SortKey, TableRef};
use super::operators::{ArithOp, CompareOp, JoinKind, SetOpKind};
use super::values::{ParamType, PrimitiveKind, Value};

pub fn scan(table: TableRef) -> Expr {
    Expr::Scan { table }
}

pub fn filter(var: &str, input: Expr, predicate: Expr) -> Expr {
    Expr::Filter {
        input: Binding::new(var, input),
        predicate: Box::new(predicate),
    }
}

pub fn project(var: &str, input: Expr, columns: Vec<ProjectColumn>) -> Expr {
    Expr::Project {
        input: Binding::new(var, input),
        columns,
    }
}

pub fn sort(var: &str, input: Expr, keys: Vec<SortKey>) -> Expr {
    Expr::Sort {
        input: Binding::new(var, input),
        keys,
    }
}

pub fn skip(var: &str, input: Expr, keys: Vec<SortKey>, count: Expr) -> Expr {
    Expr::Skip {
        input: Binding::new(var, input),
        keys,
        count: Box::new(count),
    }
}

pub fn limit(input: Expr, count: Expr) -> Expr {
    Expr::Limit {
        input: Box::new(input),
        count: Box::new(count),
        with_ties: false,
    }
}

pub fn distinct(input: Expr) -> Expr {
    Expr::Distinct {
        input: Box::new(input),
    }
}

pub fn join(kind: JoinKind, left: (&str, Expr), right: (&str, Expr), condition: Option<Expr>) -> Expr {
    Expr::Join {
        join: kind,
        left: Binding::new(left.0, left.1),
        right: Binding::new(right.0, right.1),
        condition: condition.map(Box::new),
    }
}

pub fn set_op(op: SetOpKind, left: Expr, right: Expr) -> Expr {
    Expr::SetOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn column(name: &str, expr: Expr, kind: PrimitiveKind) -> ProjectColumn {
    ProjectColumn::new(name, expr, kind)
}

pub fn var(name: &str) -> Expr {
    Expr::Variable {
        name: name.to_string(),
    }
}

pub fn prop(instance: Expr, name: &str) -> Expr {
    Expr::Property {
        instance: Box::new(instance),
        name: name.to_string(),
    }
}

/// `var.name`
pub fn col(var_name: &str, name: &str) -> Expr {
    prop(var(var_name), name)
}

/// `var.member.name`, a column reached through a join tuple.
pub fn path(var_name: &str, member: &str, name: &str) -> Expr {
    prop(col(var_name, member), name)
}

pub fn constant(value: impl Into<Value>) -> Expr {
    Expr::Constant {
        value: value.into(),
    }
}

pub fn int(n: i32) -> Expr {
    constant(Value::Int32(n))
}

pub fn text(s: &str) -> Expr {
    constant(Value::String(s.to_string()))
}

pub fn null(ty: PrimitiveKind) -> Expr {
    Expr::Null { ty }
}

pub fn param(name: &str, kind: PrimitiveKind) -> Expr {
    Expr::Parameter {
        name: name.to_string(),
        ty: ParamType::Scalar(kind),
    }
}

pub fn vector_param(name: &str, kind: PrimitiveKind) -> Expr {
    Expr::Parameter {
        name: name.to_string(),
        ty: ParamType::Vector(kind),
    }
}

pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
    Expr::Compare {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    compare(CompareOp::Eq, left, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    Expr::And {
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn or(left: Expr, right: Expr) -> Expr {
    Expr::Or {
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn not(arg: Expr) -> Expr {
    Expr::Not { arg: Box::new(arg) }
}

pub fn is_null(arg: Expr) -> Expr {
    Expr::IsNull { arg: Box::new(arg) }
}

pub fn like(arg: Expr, pattern: Expr) -> Expr {
    Expr::Like {
        arg: Box::new(arg),
        pattern: Box::new(pattern),
    }
}

pub fn is_empty(input: Expr) -> Expr {
    Expr::IsEmpty {
        input: Box::new(input),
    }
}

pub fn exists(input: Expr) -> Expr {
    not(is_empty(input))
}

pub fn element(input: Expr) -> Expr {
    Expr::Element {
        input: Box::new(input),
    }
}

pub fn arith(op: ArithOp, args: Vec<Expr>) -> Expr {
    Expr::Arithmetic { op, args }
}

pub fn case(whens: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Expr {
    Expr::Case {
        whens: whens
            .into_iter()
            .map(|(when, then)| CaseWhen { when, then })
            .collect(),
        otherwise: otherwise.map(Box::new),
    }
}

pub fn cast(arg: Expr, to: PrimitiveKind) -> Expr {
    Expr::Cast {
        arg: Box::new(arg),
        to,
    }
}

/// Canonical function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(FunctionCall::canonical(name, args))
}

/// Backend function call.
pub fn store_func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(FunctionCall::store(name, args))
}
