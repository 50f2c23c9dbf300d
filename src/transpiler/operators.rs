//! Operator table and precedence-aware printing.
//!
//! Precedences follow the PostgreSQL operator table. Up to 9.4, `NOT IN`,
//! `NOT LIKE`, `NOT SIMILAR TO` and `NOT BETWEEN` bind differently depending
//! on the side the neighbouring operator sits on, so the legacy regime keeps
//! separate left and right precedences. From 9.5 a single precedence applies.

use super::ir::{SqlExpr, ToSql};
use super::stage::Stages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Binary,
    Prefix,
    Postfix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    UnaryMinus,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    IsNull,
    IsNotNull,
    LessThanOrEquals,
    GreaterThanOrEquals,
    NotEquals,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    Concat,
    In,
    NotIn,
    Like,
    NotLike,
    SimilarTo,
    NotSimilarTo,
    Between,
    NotBetween,
    LessThan,
    GreaterThan,
    Equals,
    EqualsAny,
    Not,
    And,
    Or,
    QueryMatch,
    QueryAnd,
    QueryNegate,
    QueryContains,
    QueryIsContained,
    RegexMatch,
}

/// One row of the operator table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpInfo {
    pub token: &'static str,
    pub left: u8,
    pub right: u8,
    pub new: u8,
    pub arity: Arity,
    pub right_assoc: bool,
}

const fn binary(token: &'static str, precedence: u8, new: u8) -> OpInfo {
    OpInfo {
        token,
        left: precedence,
        right: precedence,
        new,
        arity: Arity::Binary,
        right_assoc: false,
    }
}

const fn split(token: &'static str, left: u8, right: u8, new: u8) -> OpInfo {
    OpInfo {
        token,
        left,
        right,
        new,
        arity: Arity::Binary,
        right_assoc: false,
    }
}

const fn with(token: &'static str, precedence: u8, new: u8, arity: Arity, right_assoc: bool) -> OpInfo {
    OpInfo {
        token,
        left: precedence,
        right: precedence,
        new,
        arity,
        right_assoc,
    }
}

impl Operator {
    /// The `||` operator doubles as tsquery OR.
    pub const QUERY_OR: Operator = Operator::Concat;

    pub(crate) const fn info(self) -> OpInfo {
        use Arity::*;
        match self {
            Operator::UnaryMinus => with("-", 17, 12, Prefix, true),
            Operator::Mul => binary("*", 15, 10),
            Operator::Div => binary("/", 15, 10),
            Operator::Mod => binary("%", 15, 10),
            Operator::Add => binary("+", 14, 9),
            Operator::Sub => binary("-", 14, 9),
            Operator::IsNull => with("IS NULL", 13, 4, Postfix, false),
            Operator::IsNotNull => with("IS NOT NULL", 13, 4, Postfix, false),
            Operator::LessThanOrEquals => binary("<=", 10, 5),
            Operator::GreaterThanOrEquals => binary(">=", 10, 5),
            Operator::NotEquals => binary("!=", 10, 5),
            Operator::BitwiseAnd => binary("&", 10, 8),
            Operator::BitwiseOr => binary("|", 10, 8),
            Operator::BitwiseXor => binary("#", 10, 8),
            Operator::BitwiseNot => with("~", 10, 8, Prefix, false),
            Operator::Concat => binary("||", 10, 8),
            Operator::In => binary("IN", 9, 6),
            Operator::NotIn => split("NOT IN", 3, 9, 6),
            Operator::Like => binary("LIKE", 6, 6),
            Operator::NotLike => split("NOT LIKE", 3, 6, 6),
            Operator::SimilarTo => binary("SIMILAR TO", 6, 6),
            Operator::NotSimilarTo => split("NOT SIMILAR TO", 3, 6, 6),
            Operator::Between => binary("BETWEEN", 6, 6),
            Operator::NotBetween => split("NOT BETWEEN", 3, 6, 6),
            Operator::LessThan => binary("<", 5, 5),
            Operator::GreaterThan => binary(">", 5, 5),
            Operator::Equals => with("=", 4, 5, Binary, true),
            Operator::EqualsAny => with("= ANY", 4, 5, Binary, true),
            Operator::Not => with("NOT", 3, 3, Prefix, true),
            Operator::And => binary("AND", 2, 2),
            Operator::Or => binary("OR", 1, 1),
            Operator::QueryMatch => binary("@@", 10, 8),
            Operator::QueryAnd => binary("&&", 10, 8),
            Operator::QueryNegate => with("!!", 10, 8, Prefix, true),
            Operator::QueryContains => binary("@>", 10, 8),
            Operator::QueryIsContained => binary("<@", 10, 8),
            Operator::RegexMatch => binary("~", 10, 8),
        }
    }

    /// The registered logical dual, if any.
    pub fn negated(self) -> Option<Operator> {
        let dual = match self {
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
            Operator::LessThanOrEquals => Operator::GreaterThan,
            Operator::GreaterThan => Operator::LessThanOrEquals,
            Operator::GreaterThanOrEquals => Operator::LessThan,
            Operator::LessThan => Operator::GreaterThanOrEquals,
            Operator::NotEquals => Operator::Equals,
            Operator::Equals => Operator::NotEquals,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::SimilarTo => Operator::NotSimilarTo,
            Operator::NotSimilarTo => Operator::SimilarTo,
            Operator::Between => Operator::NotBetween,
            Operator::NotBetween => Operator::Between,
            _ => return None,
        };
        Some(dual)
    }

    pub(crate) fn arity(self) -> Arity {
        self.info().arity
    }
}

/// An operator applied to one or two operands.
///
/// Prefix operators keep their operand on the right, postfix on the left.
#[derive(Debug, Clone)]
pub(crate) struct OperatorExpr {
    pub op: Operator,
    pub new_precedence: bool,
    pub left: Option<Box<SqlExpr>>,
    pub right: Option<Box<SqlExpr>>,
}

impl OperatorExpr {
    pub fn binary(op: Operator, new_precedence: bool, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        SqlExpr::Operator(Self {
            op,
            new_precedence,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        })
    }

    pub fn unary(op: Operator, new_precedence: bool, operand: SqlExpr) -> SqlExpr {
        let operand = Some(Box::new(operand));
        let (left, right) = match op.arity() {
            Arity::Postfix => (operand, None),
            _ => (None, operand),
        };
        SqlExpr::Operator(Self {
            op,
            new_precedence,
            left,
            right,
        })
    }

    fn write_with_parent(&self, stages: &Stages, sql: &mut String, right_parent: Option<&OperatorExpr>) {
        let me = self.op.info();
        let left_op = self.left.as_deref().and_then(SqlExpr::as_operator);
        let right_op = self.right.as_deref().and_then(SqlExpr::as_operator);

        let (wrap_left, mut wrap_right) = if matches!(self.op, Operator::Between | Operator::NotBetween) {
            (true, false)
        } else {
            let (wrap_left, mut wrap_right) = if self.new_precedence {
                (
                    left_op.is_some_and(|l| {
                        let l = l.op.info();
                        if me.right_assoc { l.new <= me.new } else { l.new < me.new }
                    }),
                    right_op.is_some_and(|r| {
                        let r = r.op.info();
                        if !me.right_assoc { r.new <= me.new } else { r.new < me.new }
                    }),
                )
            } else {
                (
                    left_op.is_some_and(|l| {
                        let l = l.op.info();
                        if me.right_assoc { l.right <= me.left } else { l.right < me.left }
                    }),
                    right_op.is_some_and(|r| {
                        let r = r.op.info();
                        if !me.right_assoc { r.left <= me.right } else { r.left < me.right }
                    }),
                )
            };

            // A prefix operand such as `~ b` in `a & ~ b & c` needs no parentheses
            // unless the enclosing operator binds tighter than it.
            if let Some(r) = right_op {
                if wrap_right && r.left.is_none() {
                    let ri = r.op.info();
                    let fits = right_parent.is_none_or(|parent| {
                        let p = parent.op.info();
                        let (mine, theirs) = if self.new_precedence {
                            (ri.new, p.new)
                        } else {
                            (ri.right, p.left)
                        };
                        if !p.right_assoc { mine >= theirs } else { mine > theirs }
                    });
                    if fits {
                        wrap_right = false;
                    }
                }
            }
            (wrap_left, wrap_right)
        };

        if self.op == Operator::EqualsAny {
            wrap_right = true;
        }

        if let Some(left) = &self.left {
            if wrap_left {
                sql.push('(');
            }
            match left_op {
                Some(l) if !wrap_left => l.write_with_parent(stages, sql, Some(self)),
                _ => left.write_sql(stages, sql),
            }
            if wrap_left {
                sql.push(')');
            }
        }

        match me.arity {
            Arity::Binary => {
                sql.push(' ');
                sql.push_str(me.token);
                sql.push(' ');
            }
            Arity::Prefix => {
                sql.push_str(me.token);
                sql.push(' ');
            }
            Arity::Postfix => {
                sql.push(' ');
                sql.push_str(me.token);
            }
        }

        if let Some(right) = &self.right {
            if wrap_right {
                sql.push('(');
            }
            match right_op {
                Some(r) if !wrap_right => r.write_with_parent(stages, sql, right_parent),
                _ => right.write_sql(stages, sql),
            }
            if wrap_right {
                sql.push(')');
            }
        }
    }
}

impl ToSql for OperatorExpr {
    fn write_sql(&self, stages: &Stages, sql: &mut String) {
        self.write_with_parent(stages, sql, None);
    }
}

/// Logical negation of an expression.
///
/// Operators with a registered dual are flipped, a `NOT` is unwrapped, and
/// anything else is wrapped in `NOT`.
pub(crate) fn negate(expr: SqlExpr, new_precedence: bool) -> SqlExpr {
    match expr {
        SqlExpr::Operator(OperatorExpr {
            op: Operator::Not,
            right: Some(operand),
            ..
        }) => *operand,
        SqlExpr::Operator(mut node) => match node.op.negated() {
            Some(dual) => {
                node.op = dual;
                SqlExpr::Operator(node)
            }
            None => OperatorExpr::unary(Operator::Not, new_precedence, SqlExpr::Operator(node)),
        },
        other => OperatorExpr::unary(Operator::Not, new_precedence, other),
    }
}
