use serde::{Deserialize, Serialize};

/// Join kinds of the relational algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Cross,
    Inner,
    LeftOuter,
    FullOuter,
    /// Right side evaluated per left row, rows without a match dropped.
    CrossApply,
    /// Right side evaluated per left row, left rows kept.
    OuterApply,
}

impl JoinKind {
    pub fn is_apply(&self) -> bool {
        matches!(self, JoinKind::CrossApply | JoinKind::OuterApply)
    }

    /// Whether the join carries an `ON` condition.
    pub fn has_condition(&self) -> bool {
        matches!(
            self,
            JoinKind::Inner | JoinKind::LeftOuter | JoinKind::FullOuter
        )
    }
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Cross => write!(f, "CROSS JOIN"),
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::LeftOuter => write!(f, "LEFT OUTER JOIN"),
            JoinKind::FullOuter => write!(f, "FULL OUTER JOIN"),
            JoinKind::CrossApply => write!(f, "CROSS JOIN LATERAL"),
            JoinKind::OuterApply => write!(f, "LEFT OUTER JOIN LATERAL"),
        }
    }
}

/// Set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOpKind {
    UnionAll,
    Intersect,
    Except,
}

impl std::fmt::Display for SetOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetOpKind::UnionAll => write!(f, "UNION ALL"),
            SetOpKind::Intersect => write!(f, "INTERSECT"),
            SetOpKind::Except => write!(f, "EXCEPT"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Arithmetic operators. `Negate` is unary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}
