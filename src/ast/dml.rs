//! DML operation descriptors attached to a relational tree.
//!
//! The tree selects the rows to mutate; the descriptor names the target
//! and maps projected columns onto target columns.

use serde::{Deserialize, Serialize};

use super::expr::TableRef;
use super::values::{PrimitiveKind, Value};

/// Projection ordinal to target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: usize,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub mappings: Vec<ColumnMapping>,
    /// Ordinal of a shape-only column that is never written.
    #[serde(default)]
    pub null_sentinel: Option<usize>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, source: usize, target: impl Into<String>) -> Self {
        self.mappings.push(ColumnMapping {
            source,
            target: target.into(),
        });
        self
    }

    pub fn with_null_sentinel(mut self, ordinal: usize) -> Self {
        self.null_sentinel = Some(ordinal);
        self
    }

    /// Target column for a projection ordinal.
    pub fn target_of(&self, source: usize) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub target: TableRef,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub with_row_count: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOp {
    pub target: TableRef,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub with_row_count: bool,
    pub columns: ColumnMap,
}

/// Constant written to a discriminator column on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOp {
    pub target: TableRef,
    #[serde(default)]
    pub with_row_count: bool,
    pub columns: ColumnMap,
    #[serde(default)]
    pub discriminators: Vec<Discriminator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DmlOperation {
    Delete(DeleteOp),
    Update(UpdateOp),
    Insert(InsertOp),
}

impl DmlOperation {
    pub fn target(&self) -> &TableRef {
        match self {
            DmlOperation::Delete(op) => &op.target,
            DmlOperation::Update(op) => &op.target,
            DmlOperation::Insert(op) => &op.target,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, DmlOperation::Delete(_))
    }
}

/// A column of the insert target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProperty {
    pub name: String,
    pub kind: PrimitiveKind,
    #[serde(default)]
    pub nullable: bool,
}

/// Bulk copy from an already compiled SELECT into a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertFromStatement {
    pub target: TableRef,
    pub properties: Vec<TargetProperty>,
    /// Source column name to target property name.
    pub mapping: Vec<(String, String)>,
    pub sql: String,
    #[serde(default)]
    pub with_row_count: bool,
}
