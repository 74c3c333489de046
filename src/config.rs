//! Runtime configuration, usually read from `tessera.toml`.
//!
//! ```toml
//! dialect = "sqlite"
//! log_statements = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_core::{Dialect, TesseraError};

/// Runtime settings for a [`Db`](crate::Db).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// SQL dialect (postgresql, sqlite, mysql)
    #[serde(default)]
    pub dialect: Dialect,
    /// Emit a tracing event for every executed statement
    #[serde(default = "default_log_statements")]
    pub log_statements: bool,
}

fn default_log_statements() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            log_statements: default_log_statements(),
        }
    }
}

impl Config {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TesseraError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, TesseraError> {
        toml::from_str(s).map_err(|e| TesseraError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
dialect = "sqlite"
log_statements = false
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.dialect, Dialect::SQLite);
        assert!(!config.log_statements);
    }

    #[test]
    fn test_defaults_and_aliases() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(Config::parse(r#"dialect = "pg""#).unwrap().dialect, Dialect::PostgreSQL);
    }

    #[test]
    fn test_invalid_dialect() {
        let err = Config::parse(r#"dialect = "oracle""#).unwrap_err();
        assert!(matches!(err, TesseraError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        std::fs::write(&path, "dialect = \"mysql\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dialect, Dialect::MySQL);
        assert!(config.log_statements);

        let missing = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, TesseraError::Config(_)));
    }
}
