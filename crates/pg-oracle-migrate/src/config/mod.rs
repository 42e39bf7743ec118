//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

const JDBC_POSTGRES_PREFIX: &str = "jdbc:postgresql:";
const JDBC_ORACLE_PREFIX: &str = "jdbc:oracle:thin:@";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Destination config, required for the migrate operation.
    pub fn require_target(&self) -> Result<&ConnectionConfig> {
        self.target
            .as_ref()
            .ok_or_else(|| MigrateError::Config("target is required for migrate".into()))
    }
}

/// Database family behind a [`ConnectionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Postgres,
    Oracle,
}

impl ConnectionConfig {
    /// Resolve the driver from the explicit identifier or the URI shape.
    pub fn driver_kind(&self) -> Result<DriverKind> {
        if let Some(driver) = &self.driver {
            return match driver.to_lowercase().as_str() {
                "postgres" | "postgresql" | "org.postgresql.driver" => Ok(DriverKind::Postgres),
                "oracle" | "oracle.jdbc.oracledriver" | "oracle.jdbc.driver.oracledriver" => {
                    Ok(DriverKind::Oracle)
                }
                other => Err(MigrateError::Config(format!("unsupported driver '{}'", other))),
            };
        }

        let uri = self.uri.trim().to_lowercase();
        if uri.starts_with("jdbc:oracle:") {
            Ok(DriverKind::Oracle)
        } else if uri.starts_with(JDBC_POSTGRES_PREFIX)
            || uri.starts_with("postgres://")
            || uri.starts_with("postgresql://")
            || uri.contains("host=")
        {
            Ok(DriverKind::Postgres)
        } else {
            // Easy Connect and TNS aliases carry no scheme
            Ok(DriverKind::Oracle)
        }
    }

    /// Build a tokio-postgres config from the URI and credentials.
    pub fn pg_config(&self) -> Result<tokio_postgres::Config> {
        let uri = normalize_postgres_uri(&self.uri);
        let mut config: tokio_postgres::Config = uri
            .parse()
            .map_err(|e| MigrateError::Config(format!("invalid PostgreSQL URI: {}", e)))?;
        if !self.username.is_empty() {
            config.user(&self.username);
        }
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config.application_name("pg-oracle-migrate");
        Ok(config)
    }

    /// Connect string for the Oracle client.
    pub fn oracle_connect_string(&self) -> String {
        normalize_oracle_uri(&self.uri)
    }
}

/// Strip a JDBC prefix (and its driver-specific query options) from a
/// PostgreSQL URI.
pub fn normalize_postgres_uri(uri: &str) -> String {
    let uri = uri.trim();
    match uri.strip_prefix(JDBC_POSTGRES_PREFIX) {
        Some(rest) => {
            let rest = rest.split('?').next().unwrap_or(rest);
            format!("postgresql:{}", rest)
        }
        None => uri.to_string(),
    }
}

/// Convert JDBC thin URLs into something the Oracle client accepts.
///
/// `jdbc:oracle:thin:@//host:1521/SVC` becomes `//host:1521/SVC`; the legacy
/// `host:port:SID` form becomes a full connect descriptor.
pub fn normalize_oracle_uri(uri: &str) -> String {
    let uri = uri.trim();
    let Some(rest) = uri.strip_prefix(JDBC_ORACLE_PREFIX) else {
        return uri.to_string();
    };

    if rest.starts_with("//") || rest.starts_with('(') {
        return rest.to_string();
    }

    let parts: Vec<&str> = rest.split(':').collect();
    if let [host, port, sid] = parts.as_slice() {
        return format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST={})(PORT={}))(CONNECT_DATA=(SID={})))",
            host, port, sid
        );
    }

    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(uri: &str) -> ConnectionConfig {
        ConnectionConfig {
            uri: uri.to_string(),
            username: "app".to_string(),
            password: "secret".to_string(),
            schema: "public".to_string(),
            driver: None,
            ssl_mode: "disable".to_string(),
        }
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
source:
  uri: postgresql://localhost:5432/app
  username: app
  password: secret
  schema: public
target:
  uri: //localhost:1521/XEPDB1
  username: mb_oracle_schema
  password: secret
  schema: MB_ORACLE_SCHEMA
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.migration.workers, DEFAULT_WORKERS);
        assert_eq!(config.migration.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.migration.query_timeout_secs, 600);
        assert_eq!(config.migration.progress_interval_secs, 30);
        assert_eq!(config.migration.lock_key, DEFAULT_LOCK_KEY);
        assert_eq!(config.source.ssl_mode, "disable");
        assert!(config.scripts.edit_role.is_none());
        assert_eq!(config.require_target().unwrap().schema, "MB_ORACLE_SCHEMA");
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source:\n  uri: jdbc:postgresql://db:5432/app\n  username: app\n  schema: public\nmigration:\n  workers: 4\n  exclude_tables: [audit_log]"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.migration.workers, 4);
        assert_eq!(config.migration.source_pool_size(), 6);
        assert_eq!(config.migration.exclude_tables, vec!["audit_log".to_string()]);

        assert!(matches!(
            Config::load(file.path().with_extension("missing")),
            Err(MigrateError::Io(_))
        ));
    }

    #[test]
    fn test_missing_target_only_fails_for_migrate() {
        let yaml = r#"
source:
  uri: postgresql://localhost/app
  username: app
  schema: public
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.require_target().is_err());
    }

    #[test]
    fn test_driver_kind_detection() {
        assert_eq!(
            conn("postgresql://h/db").driver_kind().unwrap(),
            DriverKind::Postgres
        );
        assert_eq!(
            conn("jdbc:postgresql://h:5432/db").driver_kind().unwrap(),
            DriverKind::Postgres
        );
        assert_eq!(
            conn("host=localhost dbname=app").driver_kind().unwrap(),
            DriverKind::Postgres
        );
        assert_eq!(
            conn("jdbc:oracle:thin:@//h:1521/SVC").driver_kind().unwrap(),
            DriverKind::Oracle
        );
        assert_eq!(conn("//h:1521/SVC").driver_kind().unwrap(), DriverKind::Oracle);

        let mut explicit = conn("//h:1521/SVC");
        explicit.driver = Some("postgresql".into());
        assert_eq!(explicit.driver_kind().unwrap(), DriverKind::Postgres);
        explicit.driver = Some("mysql".into());
        assert!(explicit.driver_kind().is_err());
    }

    #[test]
    fn test_normalize_postgres_uri() {
        assert_eq!(
            normalize_postgres_uri("jdbc:postgresql://db:5432/app?currentSchema=x"),
            "postgresql://db:5432/app"
        );
        assert_eq!(
            normalize_postgres_uri("postgresql://db/app"),
            "postgresql://db/app"
        );
    }

    #[test]
    fn test_normalize_oracle_uri() {
        assert_eq!(
            normalize_oracle_uri("jdbc:oracle:thin:@//db:1521/ORCLPDB1"),
            "//db:1521/ORCLPDB1"
        );
        assert_eq!(
            normalize_oracle_uri("jdbc:oracle:thin:@db:1521:ORCL"),
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=db)(PORT=1521))(CONNECT_DATA=(SID=ORCL)))"
        );
        assert_eq!(normalize_oracle_uri("PRODTNS"), "PRODTNS");
    }

    #[test]
    fn test_pg_config_applies_credentials() {
        let config = conn("jdbc:postgresql://db:5433/app").pg_config().unwrap();
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_dbname(), Some("app"));
        assert_eq!(config.get_ports(), &[5433]);
    }

    #[test]
    fn test_debug_hides_password() {
        let text = format!("{:?}", conn("postgresql://h/db"));
        assert!(!text.contains("secret"));
        assert!(text.contains("***"));
    }
}
