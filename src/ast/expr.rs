//! Relational expression tree.
//!
//! Collection-valued kinds (`Scan` through `Rows`) form query pipelines;
//! the remaining kinds are scalar. A single enum keeps the visitor's
//! dispatch exhaustive: adding a kind fails to compile until both the
//! collection and the scalar translation handle it.

use serde::{Deserialize, Serialize};

use super::operators::{ArithOp, CompareOp, JoinKind, SetOpKind, SortOrder};
use super::values::{ParamType, PrimitiveKind, Value};

/// A table (or defining query) scanned by the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Entity set name, used when no table name is given.
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    /// Raw SQL standing in for the table.
    #[serde(default)]
    pub defining_query: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            table: None,
            defining_query: None,
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Whether both refer to the same physical table.
    pub fn is_same_table(&self, other: &TableRef) -> bool {
        let schema = |t: &TableRef| t.schema.clone().filter(|s| !s.is_empty());
        schema(self) == schema(other)
            && self.table_name() == other.table_name()
            && self.defining_query == other.defining_query
    }
}

/// An input expression bound to a variable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub var: String,
    pub expr: Box<Expr>,
}

impl Binding {
    pub fn new(var: impl Into<String>, expr: Expr) -> Self {
        Self {
            var: var.into(),
            expr: Box::new(expr),
        }
    }
}

/// Input of a group-by: the row variable and the group variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub var: String,
    pub group_var: String,
    pub expr: Box<Expr>,
}

/// A named, typed output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectColumn {
    pub name: String,
    pub expr: Expr,
    pub kind: PrimitiveKind,
}

impl ProjectColumn {
    pub fn new(name: impl Into<String>, expr: Expr, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            expr,
            kind,
        }
    }
}

/// An aggregate computed per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    /// Output column name.
    pub name: String,
    /// Function name, e.g. `Count` or `Sum`.
    pub function: String,
    #[serde(default)]
    pub namespace: FunctionNamespace,
    pub args: Vec<Expr>,
    #[serde(default)]
    pub distinct: bool,
    pub kind: PrimitiveKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Desc,
        }
    }
}

/// Where a function name is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FunctionNamespace {
    /// Backend-independent builtins (`Concat`, `AddDays`, ...).
    #[default]
    Canonical,
    /// Backend builtins (`ts_rank`, `match_regex`, ...).
    Store,
    /// User-defined function, optionally schema-qualified.
    User { schema: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(default)]
    pub partition_by: Vec<Expr>,
    #[serde(default)]
    pub order_by: Vec<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub namespace: FunctionNamespace,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
    /// Declared result kind, used by functions that cast their result.
    #[serde(default)]
    pub result: Option<PrimitiveKind>,
    #[serde(default)]
    pub window: Option<WindowSpec>,
}

impl FunctionCall {
    pub fn canonical(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            namespace: FunctionNamespace::Canonical,
            name: name.into(),
            args,
            result: None,
            window: None,
        }
    }

    pub fn store(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            namespace: FunctionNamespace::Store,
            ..Self::canonical(name, args)
        }
    }

    pub fn returning(mut self, kind: PrimitiveKind) -> Self {
        self.result = Some(kind);
        self
    }

    pub fn over(mut self, window: WindowSpec) -> Self {
        self.window = Some(window);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseWhen {
    pub when: Expr,
    pub then: Expr,
}

/// A node of the relational expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    // Collections
    Scan {
        table: TableRef,
    },
    Filter {
        input: Binding,
        predicate: Box<Expr>,
    },
    Project {
        input: Binding,
        columns: Vec<ProjectColumn>,
    },
    Sort {
        input: Binding,
        keys: Vec<SortKey>,
    },
    /// OFFSET, ordered by `keys`.
    Skip {
        input: Binding,
        #[serde(default)]
        keys: Vec<SortKey>,
        count: Box<Expr>,
    },
    Limit {
        input: Box<Expr>,
        count: Box<Expr>,
        #[serde(default)]
        with_ties: bool,
    },
    Distinct {
        input: Box<Expr>,
    },
    /// Forces the input into its own subquery.
    AsSubquery {
        input: Box<Expr>,
    },
    GroupBy {
        input: GroupBinding,
        keys: Vec<ProjectColumn>,
        aggregates: Vec<GroupAggregate>,
    },
    Join {
        join: JoinKind,
        left: Binding,
        right: Binding,
        #[serde(default)]
        condition: Option<Box<Expr>>,
    },
    SetOp {
        op: SetOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Inline collection of scalar values.
    Rows {
        values: Vec<Expr>,
        element: PrimitiveKind,
    },

    // Scalars
    Function(FunctionCall),
    Constant {
        value: Value,
    },
    Null {
        ty: PrimitiveKind,
    },
    Parameter {
        name: String,
        ty: ParamType,
    },
    Variable {
        name: String,
    },
    Property {
        instance: Box<Expr>,
        name: String,
    },
    /// Physical row identifier of the scanned target.
    RowId,
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not {
        arg: Box<Expr>,
    },
    IsNull {
        arg: Box<Expr>,
    },
    /// Single-row scalar subquery.
    Element {
        input: Box<Expr>,
    },
    IsEmpty {
        input: Box<Expr>,
    },
    Like {
        arg: Box<Expr>,
        pattern: Box<Expr>,
    },
    In {
        item: Box<Expr>,
        list: Vec<Expr>,
    },
    Arithmetic {
        op: ArithOp,
        args: Vec<Expr>,
    },
    Case {
        whens: Vec<CaseWhen>,
        #[serde(default)]
        otherwise: Option<Box<Expr>>,
    },
    Cast {
        arg: Box<Expr>,
        to: PrimitiveKind,
    },

    // Kinds with no translation
    Navigate {
        relationship: String,
    },
    Deref {
        arg: Box<Expr>,
    },
    IsOf {
        arg: Box<Expr>,
        type_name: String,
    },
    Treat {
        arg: Box<Expr>,
        type_name: String,
    },
    OfType {
        input: Box<Expr>,
        type_name: String,
    },
}

impl Expr {
    /// Name of the node kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Scan { .. } => "Scan",
            Expr::Filter { .. } => "Filter",
            Expr::Project { .. } => "Project",
            Expr::Sort { .. } => "Sort",
            Expr::Skip { .. } => "Skip",
            Expr::Limit { .. } => "Limit",
            Expr::Distinct { .. } => "Distinct",
            Expr::AsSubquery { .. } => "AsSubquery",
            Expr::GroupBy { .. } => "GroupBy",
            Expr::Join { .. } => "Join",
            Expr::SetOp { .. } => "SetOp",
            Expr::Rows { .. } => "Rows",
            Expr::Function(_) => "Function",
            Expr::Constant { .. } => "Constant",
            Expr::Null { .. } => "Null",
            Expr::Parameter { .. } => "Parameter",
            Expr::Variable { .. } => "Variable",
            Expr::Property { .. } => "Property",
            Expr::RowId => "RowId",
            Expr::Compare { .. } => "Compare",
            Expr::And { .. } => "And",
            Expr::Or { .. } => "Or",
            Expr::Not { .. } => "Not",
            Expr::IsNull { .. } => "IsNull",
            Expr::Element { .. } => "Element",
            Expr::IsEmpty { .. } => "IsEmpty",
            Expr::Like { .. } => "Like",
            Expr::In { .. } => "In",
            Expr::Arithmetic { .. } => "Arithmetic",
            Expr::Case { .. } => "Case",
            Expr::Cast { .. } => "Cast",
            Expr::Navigate { .. } => "Navigate",
            Expr::Deref { .. } => "Deref",
            Expr::IsOf { .. } => "IsOf",
            Expr::Treat { .. } => "Treat",
            Expr::OfType { .. } => "OfType",
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant { .. })
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expr::Constant { value } => Some(value),
            _ => None,
        }
    }
}
