//! Configuration validation.

use super::{Config, ConnectionConfig, DriverKind};
use crate::error::{MigrateError, Result};
use crate::source::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;
    if config.source.driver_kind()? != DriverKind::Postgres {
        return Err(MigrateError::Config(
            "source must be a PostgreSQL connection".into(),
        ));
    }
    SslMode::parse(&config.source.ssl_mode)?;

    if let Some(target) = &config.target {
        validate_connection("target", target)?;
        if target.driver_kind()? != DriverKind::Oracle {
            return Err(MigrateError::Config(
                "target must be an Oracle connection".into(),
            ));
        }
    }

    if config.migration.workers == 0 {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.query_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.query_timeout_secs must be at least 1".into(),
        ));
    }
    if config.migration.progress_interval_secs == 0 {
        return Err(MigrateError::Config(
            "migration.progress_interval_secs must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_connection(label: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.uri.trim().is_empty() {
        return Err(MigrateError::Config(format!("{}.uri is required", label)));
    }
    if conn.username.trim().is_empty() {
        return Err(MigrateError::Config(format!("{}.username is required", label)));
    }
    if conn.schema.trim().is_empty() {
        return Err(MigrateError::Config(format!("{}.schema is required", label)));
    }
    Ok(())
}
