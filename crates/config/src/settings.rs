// Application settings
// Loaded from ~/.config/lotledger/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "lotledger";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file. `None` = `<data dir>/lotledger/lotledger.db`.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Deferred attempts before the exclusive fallback.
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 1000,
            retry_attempts: 5,
            retry_backoff_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebay.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            user_agent: format!("lotledger/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Where downloaded images go. `None` = the location stored in the
    /// database, else `<data dir>/lotledger/images`.
    pub location: Option<PathBuf>,
    pub download: bool,
    /// Prefix of saved image file names.
    pub prefix: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            location: None,
            download: true,
            prefix: "ebay".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "lotledger=info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub fetch: FetchSettings,
    pub images: ImageSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.toml")
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Load settings. An explicit path must exist; the default path may be
    /// missing, in which case defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents).map_err(|source| ConfigError::Parse { path, source }),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("lotledger.db"))
    }

    pub fn default_image_location() -> PathBuf {
        Self::data_dir().join("images")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_toml(
            r#"
[database]
retry_attempts = 8

[log]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(settings.database.retry_attempts, 8);
        assert_eq!(settings.database.busy_timeout_ms, 1000);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.log.filter, "lotledger=info");
        assert_eq!(settings.fetch.base_url, "https://www.ebay.com");
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = Settings::load(Some(Path::new("/nonexistent/settings.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[database]\nretry_attempts = \"many\"").unwrap();
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn configured_database_path_wins() {
        let settings = Settings::from_toml("[database]\npath = \"/srv/lots.db\"").unwrap();
        assert_eq!(settings.database_path(), PathBuf::from("/srv/lots.db"));
    }
}
