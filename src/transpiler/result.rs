//! Metadata returned alongside compiled SQL.

use serde::Serialize;

use crate::ast::{ParamType, PrimitiveKind};
use crate::error::CompileResult;

use super::ir::ColumnExpr;
use super::literals::{db_type, param_db_type};

/// Decoding hints for one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultColumn {
    pub name: String,
    pub kind: PrimitiveKind,
    /// The driver should read the column without assuming a type.
    pub unknown_result_type: bool,
    /// Host type to decode into when the driver has no stable mapping.
    pub override_type: Option<&'static str>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        let override_type = match kind {
            PrimitiveKind::SByte => Some("sbyte"),
            PrimitiveKind::DateTimeOffset => Some("DateTimeOffset"),
            _ => None,
        };
        Self {
            name: name.into(),
            kind,
            unknown_result_type: kind == PrimitiveKind::String,
            override_type,
        }
    }

    /// Shape of every row-count or DML result: one `C1` int4 column.
    pub(crate) fn row_count() -> Vec<ResultColumn> {
        vec![ResultColumn::new("C1", PrimitiveKind::Int32)]
    }

    pub(crate) fn from_projection(columns: &[ColumnExpr]) -> Vec<ResultColumn> {
        columns
            .iter()
            .map(|c| ResultColumn::new(c.name.clone(), c.kind))
            .collect()
    }
}

/// A bound parameter referenced by the statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDecl {
    /// Name without the `@` prefix.
    pub name: String,
    /// Backend type tag, e.g. `int4` or `text[]`.
    pub db_type: String,
    /// Value for parameters created from constants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<crate::ast::Value>,
}

impl ParameterDecl {
    pub(crate) fn declared(name: impl Into<String>, ty: ParamType) -> CompileResult<Self> {
        Ok(Self {
            name: name.into(),
            db_type: param_db_type(ty)?,
            value: None,
        })
    }

    pub(crate) fn constant(name: impl Into<String>, value: crate::ast::Value) -> CompileResult<Self> {
        Ok(Self {
            name: name.into(),
            db_type: db_type(value.kind())?.to_string(),
            value: Some(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_column_hints() {
        let title = ResultColumn::new("Title", PrimitiveKind::String);
        assert!(title.unknown_result_type);
        assert_eq!(title.override_type, None);

        let stamp = ResultColumn::new("At", PrimitiveKind::DateTimeOffset);
        assert!(!stamp.unknown_result_type);
        assert_eq!(stamp.override_type, Some("DateTimeOffset"));
    }

    #[test]
    fn test_vector_parameter_tag() {
        let p = ParameterDecl::declared("ids", ParamType::Vector(PrimitiveKind::Int32)).unwrap();
        assert_eq!(p.db_type, "int4[]");
    }
}
