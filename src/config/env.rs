//! Secrets and connection parameters read from the process environment
//!
//! `.env` in the working directory is loaded first; variables already set in
//! the process take precedence over it.

use crate::error::{QueryError, Result};
use std::path::PathBuf;

const ENV_HINT: &str = "set it in your environment or .env file";

/// Load `.env` if present. Safe to call more than once.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("Failed to read .env file: {}", e),
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(QueryError::MissingEnv {
            name: name.to_string(),
            hint: ENV_HINT.to_string(),
        }),
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// API credentials for the hosted model provider
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    /// Read the API key from the variable named in `llm.api_key_env`
    pub fn from_env(var_name: &str) -> Result<Self> {
        Self::from_lookup(var_name, process_env)
    }

    pub fn from_lookup<F>(var_name: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_key: required(&lookup, var_name)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Where the inventory database lives
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseLocation {
    /// Fresh in-memory copy of the demo inventory
    Memory,
    File(PathBuf),
}

/// Database connection parameters
///
/// `DATABASE_URL` wins when set; otherwise the URL is built from `DB_HOST`
/// (a directory, defaulting to the working directory) and `DB_NAME`.
#[derive(Clone)]
pub struct DatabaseSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub name: String,
    pub url: String,
}

impl DatabaseSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = optional(&lookup, "DB_USER");
        let password = optional(&lookup, "DB_PASSWORD");
        let host = optional(&lookup, "DB_HOST");

        if let Some(url) = optional(&lookup, "DATABASE_URL") {
            let name = optional(&lookup, "DB_NAME").unwrap_or_default();
            return Ok(Self {
                user,
                password,
                host,
                name,
                url,
            });
        }

        let name = required(&lookup, "DB_NAME")?;
        let url = match &host {
            Some(host) => format!(
                "sqlite://{}/{}",
                host.trim_end_matches('/'),
                name.trim_start_matches('/')
            ),
            None => format!("sqlite://{}", name),
        };

        if user.is_some() || password.is_some() {
            tracing::debug!("DB_USER/DB_PASSWORD are not used by the SQLite backend");
        }

        Ok(Self {
            user,
            password,
            host,
            name,
            url,
        })
    }

    /// Resolve the connection URL into a database location
    pub fn location(&self) -> Result<DatabaseLocation> {
        parse_database_url(&self.url)
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

/// Accepts `sqlite::memory:`, `sqlite://<path>` and `sqlite:<path>`
pub fn parse_database_url(url: &str) -> Result<DatabaseLocation> {
    let url = url.trim();
    if url == "sqlite::memory:" || url == "sqlite://:memory:" {
        return Ok(DatabaseLocation::Memory);
    }

    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| QueryError::InvalidConfigValue {
            path: "DATABASE_URL".to_string(),
            message: format!("Only sqlite:// URLs are supported, got '{}'", url),
        })?;

    if path.is_empty() {
        return Err(QueryError::InvalidConfigValue {
            path: "DATABASE_URL".to_string(),
            message: "Database path is empty".to_string(),
        });
    }

    Ok(DatabaseLocation::File(PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key() {
        let err = Credentials::from_lookup("GOOGLE_API_KEY", lookup(&[])).unwrap_err();
        assert!(matches!(err, QueryError::MissingEnv { ref name, .. } if name == "GOOGLE_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let result = Credentials::from_lookup("GOOGLE_API_KEY", lookup(&[("GOOGLE_API_KEY", " ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let creds =
            Credentials::from_lookup("KEY", lookup(&[("KEY", "secret-value")])).unwrap();
        assert!(!format!("{:?}", creds).contains("secret-value"));
    }

    #[test]
    fn test_db_name_required() {
        let err = DatabaseSettings::from_lookup(lookup(&[("DB_HOST", "/data")])).unwrap_err();
        assert!(matches!(err, QueryError::MissingEnv { ref name, .. } if name == "DB_NAME"));
    }

    #[test]
    fn test_url_built_from_parts() {
        let settings = DatabaseSettings::from_lookup(lookup(&[
            ("DB_HOST", "/data/"),
            ("DB_NAME", "atliq_tshirts.db"),
            ("DB_USER", "root"),
        ]))
        .unwrap();
        assert_eq!(settings.url, "sqlite:///data/atliq_tshirts.db");
        assert_eq!(
            settings.location().unwrap(),
            DatabaseLocation::File(PathBuf::from("/data/atliq_tshirts.db"))
        );
    }

    #[test]
    fn test_database_url_overrides_parts() {
        let settings = DatabaseSettings::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_NAME", "ignored.db"),
        ]))
        .unwrap();
        assert_eq!(settings.location().unwrap(), DatabaseLocation::Memory);
    }

    #[test]
    fn test_non_sqlite_url_rejected() {
        assert!(parse_database_url("mysql://root@localhost/atliq").is_err());
        assert!(parse_database_url("sqlite://").is_err());
    }
}
