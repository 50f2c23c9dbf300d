//! # relsql
//!
//! Compiles canonical relational expression trees into PostgreSQL SQL.
//!
//! A tree of scans, filters, projections, joins, groupings, sorts and set
//! operations becomes a single `SELECT`. Attaching a DML operation turns
//! the selected rows into the target of an `UPDATE`, `DELETE` or
//! `INSERT .. SELECT`.
//!
//! ## Quick Example
//!
//! ```rust
//! use relsql::ast::builders::*;
//! use relsql::prelude::*;
//!
//! let posts = filter("p", scan(TableRef::new("Posts")), eq(col("p", "Id"), int(7)));
//! let tree = project("p", posts, vec![column("Title", col("p", "Title"), PrimitiveKind::String)]);
//! let cmd = relsql::compile(&tree, None, &CompilerOptions::default()).unwrap();
//! assert!(cmd.sql.starts_with("SELECT"));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod transpiler;

use serde::{Deserialize, Serialize};

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{CompilerOptions, ServerVersion};
    pub use crate::error::*;
    pub use crate::transpiler::{CompiledCommand, ParameterDecl, ResultColumn};
    pub use crate::CompileRequest;
}

pub use transpiler::{CompiledCommand, compile, compile_insert_from_statement};

use ast::{DmlOperation, Expr, InsertFromStatement};
use config::CompilerOptions;
use error::{CompileError, CompileResult};

/// A serialized compilation request, as read by the command line tool.
///
/// Either `query` (optionally with `dml`) or `insert_from` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileRequest {
    #[serde(default)]
    pub query: Option<Expr>,
    #[serde(default)]
    pub dml: Option<DmlOperation>,
    #[serde(default)]
    pub insert_from: Option<InsertFromStatement>,
    /// Overrides the caller's defaults when present.
    #[serde(default)]
    pub options: Option<CompilerOptions>,
}

impl CompileRequest {
    pub fn compile(&self, defaults: &CompilerOptions) -> CompileResult<CompiledCommand> {
        let options = self.options.as_ref().unwrap_or(defaults);
        match (&self.query, &self.insert_from) {
            (Some(query), None) => compile(query, self.dml.as_ref(), options),
            (None, Some(statement)) if self.dml.is_none() => compile_insert_from_statement(statement),
            _ => Err(CompileError::Unsupported(
                "a request needs exactly one of `query` or `insert_from`".to_string(),
            )),
        }
    }
}
