use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::link_store::sql::{Dialect, SWEEP_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sharing: SharingBackend,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Path prefix every route is nested under, e.g. `/lens`. Empty for none.
    pub route_prefix: String,
    /// Handed to the UI through the page config endpoint.
    pub default_prometheus_url: String,
}

/// Where shared links live. At most one backend can be configured.
#[derive(Debug, Clone)]
pub enum SharingBackend {
    Disabled,
    Gcs {
        bucket: String,
        /// Service account JSON key; the metadata server is used when absent.
        credentials_file: Option<String>,
    },
    Local {
        path: String,
    },
    Sql(SqlConfig),
}

#[derive(Clone)]
pub struct SqlConfig {
    pub dialect: Dialect,
    pub dsn: String,
    pub create_tables: bool,
    /// `None` keeps links forever.
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
}

// The DSN usually carries a password.
impl fmt::Debug for SqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlConfig")
            .field("dialect", &self.dialect)
            .field("dsn", &"<redacted>")
            .field("create_tables", &self.create_tables)
            .field("retention", &self.retention)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            route_prefix: String::new(),
            default_prometheus_url: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let route_prefix = normalize_route_prefix(&var("ROUTE_PREFIX").unwrap_or_default());
        let default_prometheus_url = var("DEFAULT_PROMETHEUS_URL").unwrap_or_default();

        let gcs_bucket = var("SHARED_LINKS_GCS_BUCKET");
        let gcs_credentials_file = var("SHARED_LINKS_GCS_CREDENTIALS_FILE")
            .or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS"));
        let local_dir = var("SHARED_LINKS_LOCAL_DIR");
        let sql_dsn = var("SHARED_LINKS_SQL_DSN").or_else(|| var("PROMLENS_SHARED_LINKS_DSN"));
        let sql_driver = var("SHARED_LINKS_SQL_DRIVER");

        let create_tables = match var("SHARED_LINKS_SQL_CREATE_TABLES") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "SHARED_LINKS_SQL_CREATE_TABLES must be true or false, got {v:?}"
                ))
            })?,
            None => true,
        };

        let retention = match var("SHARED_LINKS_SQL_RETENTION") {
            Some(v) => parse_duration(&v).map_err(|e| {
                ConfigError::ValidationError(format!("SHARED_LINKS_SQL_RETENTION: {e}"))
            })?,
            None => Duration::ZERO,
        };

        let configured = [gcs_bucket.is_some(), local_dir.is_some(), sql_dsn.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count();
        if configured > 1 {
            return Err(ConfigError::ValidationError(
                "multiple link sharing backends are configured - please specify only one"
                    .to_string(),
            ));
        }

        let sharing = if let Some(dsn) = sql_dsn {
            let dialect = resolve_dialect(sql_driver.as_deref(), &dsn)?;
            SharingBackend::Sql(SqlConfig {
                dialect,
                dsn,
                create_tables,
                retention: (!retention.is_zero()).then_some(retention),
                sweep_interval: SWEEP_INTERVAL,
            })
        } else if let Some(bucket) = gcs_bucket {
            SharingBackend::Gcs {
                bucket,
                credentials_file: gcs_credentials_file,
            }
        } else if let Some(path) = local_dir {
            SharingBackend::Local { path }
        } else {
            SharingBackend::Disabled
        };

        let config = Config {
            server: ServerConfig {
                bind_address,
                route_prefix,
                default_prometheus_url,
            },
            sharing,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let SharingBackend::Sql(ref sql) = self.sharing {
            sql.dialect
                .connection_url(&sql.dsn)
                .map_err(ConfigError::ValidationError)?;

            if let Some(retention) = sql.retention {
                if chrono::Duration::from_std(retention).is_err() {
                    return Err(ConfigError::ValidationError(
                        "SHARED_LINKS_SQL_RETENTION is too large".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check if link sharing is turned on.
    pub fn sharing_enabled(&self) -> bool {
        !matches!(self.sharing, SharingBackend::Disabled)
    }
}

fn resolve_dialect(driver: Option<&str>, dsn: &str) -> Result<Dialect, ConfigError> {
    match driver {
        Some(driver) if driver.eq_ignore_ascii_case("sqlite3") => {
            tracing::warn!("The 'sqlite3' driver is deprecated, using 'sqlite' as a replacement.");
            Ok(Dialect::Sqlite)
        }
        Some(driver) => driver
            .parse::<Dialect>()
            .map_err(ConfigError::ValidationError),
        None => Dialect::from_dsn(dsn).ok_or_else(|| {
            ConfigError::ValidationError(
                "SHARED_LINKS_SQL_DRIVER is required when the DSN has no mysql://, postgres:// or sqlite: scheme"
                    .to_string(),
            )
        }),
    }
}

/// `/lens/` and `lens` both become `/lens`; `/` becomes empty.
fn normalize_route_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse durations such as `90d`, `12h`, `1h30m` or `500ms`. A bare `0` is
/// accepted and means zero.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    let invalid = || format!("invalid duration {value:?}");
    let mut total = Duration::ZERO;
    let mut rest = value;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(60 * 60).map(Duration::from_secs),
            "d" => amount.checked_mul(24 * 60 * 60).map(Duration::from_secs),
            "w" => amount.checked_mul(7 * 24 * 60 * 60).map(Duration::from_secs),
            "y" => amount.checked_mul(365 * 24 * 60 * 60).map(Duration::from_secs),
            "" => return Err(format!("missing unit in duration {value:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {value:?}")),
        }
        .ok_or_else(invalid)?;

        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_disable_sharing() {
        let config = load(&[]).unwrap();
        assert!(matches!(config.sharing, SharingBackend::Disabled));
        assert!(!config.sharing_enabled());
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.route_prefix, "");
    }

    #[test]
    fn test_multiple_backends_rejected() {
        let err = load(&[
            ("SHARED_LINKS_GCS_BUCKET", "links"),
            ("SHARED_LINKS_SQL_DSN", "postgres://db/links"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("multiple link sharing backends"));

        assert!(load(&[
            ("SHARED_LINKS_LOCAL_DIR", "/tmp/links"),
            ("SHARED_LINKS_GCS_BUCKET", "links"),
        ])
        .is_err());
    }

    #[test]
    fn test_sql_backend_infers_dialect() {
        let config = load(&[
            ("SHARED_LINKS_SQL_DSN", "postgres://user:secret@db/links"),
            ("SHARED_LINKS_SQL_RETENTION", "30d"),
        ])
        .unwrap();
        let SharingBackend::Sql(sql) = config.sharing else {
            panic!("expected SQL backend");
        };
        assert_eq!(sql.dialect, Dialect::Postgres);
        assert!(sql.create_tables);
        assert_eq!(sql.retention, Some(Duration::from_secs(30 * 24 * 3600)));
        assert_eq!(sql.sweep_interval, SWEEP_INTERVAL);
        assert!(!format!("{sql:?}").contains("secret"));
    }

    #[test]
    fn test_zero_retention_is_infinite() {
        let config = load(&[
            ("SHARED_LINKS_SQL_DRIVER", "sqlite"),
            ("SHARED_LINKS_SQL_DSN", "/var/lib/links.db"),
            ("SHARED_LINKS_SQL_RETENTION", "0"),
            ("SHARED_LINKS_SQL_CREATE_TABLES", "false"),
        ])
        .unwrap();
        let SharingBackend::Sql(sql) = config.sharing else {
            panic!("expected SQL backend");
        };
        assert_eq!(sql.retention, None);
        assert!(!sql.create_tables);
    }

    #[test]
    fn test_sqlite3_alias() {
        let config = load(&[
            ("SHARED_LINKS_SQL_DRIVER", "sqlite3"),
            ("SHARED_LINKS_SQL_DSN", "links.db"),
        ])
        .unwrap();
        assert!(matches!(
            config.sharing,
            SharingBackend::Sql(SqlConfig {
                dialect: Dialect::Sqlite,
                ..
            })
        ));
    }

    #[test]
    fn test_legacy_dsn_variable() {
        let config = load(&[("PROMLENS_SHARED_LINKS_DSN", "mysql://u:p@db/links")]).unwrap();
        assert!(matches!(
            config.sharing,
            SharingBackend::Sql(SqlConfig {
                dialect: Dialect::MySql,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_sql_settings_rejected() {
        assert!(load(&[
            ("SHARED_LINKS_SQL_DRIVER", "oracle"),
            ("SHARED_LINKS_SQL_DSN", "oracle://db"),
        ])
        .is_err());
        assert!(load(&[("SHARED_LINKS_SQL_DSN", "user:pw@tcp(db)/links")]).is_err());
        assert!(load(&[
            ("SHARED_LINKS_SQL_DRIVER", "mysql"),
            ("SHARED_LINKS_SQL_DSN", "postgres://db/links"),
        ])
        .is_err());
        assert!(load(&[
            ("SHARED_LINKS_SQL_DSN", "sqlite:links.db"),
            ("SHARED_LINKS_SQL_RETENTION", "soon"),
        ])
        .is_err());
        assert!(load(&[
            ("SHARED_LINKS_SQL_DSN", "sqlite:links.db"),
            ("SHARED_LINKS_SQL_CREATE_TABLES", "maybe"),
        ])
        .is_err());
    }

    #[test]
    fn test_gcs_credentials_fallback() {
        let config = load(&[
            ("SHARED_LINKS_GCS_BUCKET", "links"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/etc/gcs.json"),
        ])
        .unwrap();
        match config.sharing {
            SharingBackend::Gcs {
                bucket,
                credentials_file,
            } => {
                assert_eq!(bucket, "links");
                assert_eq!(credentials_file.as_deref(), Some("/etc/gcs.json"));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
    }

    #[test]
    fn test_route_prefix_normalized() {
        assert_eq!(normalize_route_prefix("/lens/"), "/lens");
        assert_eq!(normalize_route_prefix("lens"), "/lens");
        assert_eq!(normalize_route_prefix("/"), "");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1500ms").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("5x").is_err());
    }
}
