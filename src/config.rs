//! Compiler configuration.
//!
//! Options are read from `relsql.toml` in the working directory, then from
//! `<config dir>/relsql/config.toml`, falling back to defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::PrimitiveKind;
use crate::error::{CompileError, CompileResult};

const LOCAL_CONFIG: &str = "relsql.toml";
const DEFAULT_VECTOR_COLUMN: &str = "Value";

/// Backend server version, `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    /// First release with the reworked operator precedence.
    pub const NEW_PRECEDENCE: ServerVersion = ServerVersion::new(9, 5);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn uses_new_precedence(&self) -> bool {
        *self >= Self::NEW_PRECEDENCE
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(9, 6)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ServerVersion {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CompileError::Config(format!("invalid server version '{}'", s));
        let mut parts = s.trim().splitn(3, '.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for ServerVersion {
    type Error = CompileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ServerVersion> for String {
    fn from(v: ServerVersion) -> Self {
        v.to_string()
    }
}

/// Options for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Selects the operator precedence regime.
    pub server_version: ServerVersion,

    /// Emit constants as `@p_N` parameters instead of literals.
    pub parameterize_constants: bool,

    /// Column name of an unnested vector parameter, keyed by element kind.
    pub vector_columns: BTreeMap<String, String>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = version;
        self
    }

    pub fn parameterize_constants(mut self, enabled: bool) -> Self {
        self.parameterize_constants = enabled;
        self
    }

    pub fn with_vector_column(mut self, kind: PrimitiveKind, column: impl Into<String>) -> Self {
        self.vector_columns.insert(kind.to_string(), column.into());
        self
    }

    pub fn vector_column(&self, kind: PrimitiveKind) -> &str {
        self.vector_columns
            .get(&kind.to_string())
            .map(String::as_str)
            .unwrap_or(DEFAULT_VECTOR_COLUMN)
    }

    /// Read options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the first config file found, or defaults.
    pub fn discover() -> CompileResult<Self> {
        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading compiler options");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("relsql").join("config.toml"));
        }
        paths
    }

    pub fn to_toml(&self) -> CompileResult<String> {
        toml::to_string_pretty(self).map_err(|e| CompileError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("9.4".parse::<ServerVersion>().unwrap(), ServerVersion::new(9, 4));
        assert_eq!("12".parse::<ServerVersion>().unwrap(), ServerVersion::new(12, 0));
        assert_eq!("16.2.1".parse::<ServerVersion>().unwrap(), ServerVersion::new(16, 2));
        assert!("x.1".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn test_precedence_threshold() {
        assert!(!ServerVersion::new(9, 4).uses_new_precedence());
        assert!(ServerVersion::new(9, 5).uses_new_precedence());
        assert!(ServerVersion::new(10, 0).uses_new_precedence());
        assert!(ServerVersion::default().uses_new_precedence());
    }

    #[test]
    fn test_options_from_toml() {
        let options: CompilerOptions = toml::from_str(
            r#"
            server_version = "9.3"
            parameterize_constants = true

            [vector_columns]
            Int32 = "Id"
            "#,
        )
        .unwrap();
        assert_eq!(options.server_version, ServerVersion::new(9, 3));
        assert!(options.parameterize_constants);
        assert_eq!(options.vector_column(PrimitiveKind::Int32), "Id");
        assert_eq!(options.vector_column(PrimitiveKind::String), "Value");
    }

    #[test]
    fn test_options_round_trip_through_toml() {
        let options = CompilerOptions::new()
            .with_server_version(ServerVersion::new(13, 1))
            .with_vector_column(PrimitiveKind::String, "Name");
        let text = options.to_toml().unwrap();
        let back: CompilerOptions = toml::from_str(&text).unwrap();
        assert_eq!(back, options);
    }
}
