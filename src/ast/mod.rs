//! Input model: relational trees, values and DML descriptors.

pub mod builders;
pub mod dml;
pub mod expr;
pub mod operators;
pub mod values;

pub use dml::*;
pub use expr::*;
pub use operators::*;
pub use values::*;
