use clipper_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Events older than this many days are pruned at startup. `None` keeps everything.
    pub log_retention_days: Option<u32>,
}

impl DatabaseConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    /// - `CLIPPER_LOG_RETENTION_DAYS` (optional, unset keeps all events)
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::from_vars(
            std::env::var("DATABASE_URL").ok(),
            std::env::var("DATABASE_MAX_CONNECTIONS").ok(),
        )?;
        config.log_retention_days =
            parse_retention(std::env::var("CLIPPER_LOG_RETENTION_DAYS").ok())?;
        Ok(config)
    }

    /// Build from raw variable values; `None` means unset.
    pub fn from_vars(url: Option<String>, max_connections: Option<String>) -> Result<Self, AppError> {
        let url = url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            AppError::ConfigError("DATABASE_URL not set. Required for clip history and event logs.".into())
        })?;

        let max_connections = match max_connections {
            None => 5,
            Some(raw) => {
                let parsed: u32 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?;
                if parsed == 0 {
                    return Err(AppError::ConfigError(
                        "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
                    ));
                }
                parsed
            }
        };

        Ok(Self {
            url,
            max_connections,
            log_retention_days: None,
        })
    }
}

fn parse_retention(raw: Option<String>) -> Result<Option<u32>, AppError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(days) if days > 0 => Ok(Some(days)),
        _ => Err(AppError::ConfigError(format!(
            "Invalid CLIPPER_LOG_RETENTION_DAYS '{raw}': must be a positive number of days"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_max_connections() {
        let config = DatabaseConfig::from_vars(Some("postgres://localhost/clipper".into()), None).unwrap();
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_missing_url() {
        let err = DatabaseConfig::from_vars(None, None).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        let err = DatabaseConfig::from_vars(Some("  ".into()), None).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_bad_pool_size() {
        let url = Some("postgres://localhost/clipper".to_string());
        assert!(DatabaseConfig::from_vars(url.clone(), Some("0".into())).is_err());
        assert!(DatabaseConfig::from_vars(url.clone(), Some("many".into())).is_err());
        let config = DatabaseConfig::from_vars(url, Some("12".into())).unwrap();
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn test_log_retention() {
        assert_eq!(parse_retention(None).unwrap(), None);
        assert_eq!(parse_retention(Some("".into())).unwrap(), None);
        assert_eq!(parse_retention(Some("30".into())).unwrap(), Some(30));
        assert!(parse_retention(Some("0".into())).is_err());
        assert!(parse_retention(Some("a month".into())).is_err());

        let config = DatabaseConfig::from_vars(Some("postgres://localhost/clipper".into()), None).unwrap();
        assert_eq!(config.log_retention_days, None);
    }
}
