//! Application-level configuration loading.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FEUD_BACK_CONFIG_PATH";
/// Comma-separated list of origins overriding the configured ones.
const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";
const DEFAULT_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_ANSWERS_DIR: &str = "answers";
const DEFAULT_SESSION_TTL_HOURS: u32 = 24;
/// Upper bound on `session_ttl_hours` (ten years).
const MAX_SESSION_TTL_HOURS: u32 = 24 * 365 * 10;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Origins allowed by CORS; empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Directory holding the answer-set CSV files.
    pub answers_dir: PathBuf,
    /// Advisory lifetime stamped into `expiryTime`.
    pub session_ttl_hours: u32,
    /// Run mutations of one session one at a time, in arrival order.
    pub serialize_session_mutations: bool,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply env overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = Self::from_file(&path);
        if let Ok(origins) = env::var(ALLOWED_ORIGINS_ENV) {
            config.allowed_origins = parse_origins(&origins);
            info!(
                count = config.allowed_origins.len(),
                "allowed origins overridden from environment"
            );
        }
        config
    }

    fn from_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        origins = app_config.allowed_origins.len(),
                        answers_dir = %app_config.answers_dir.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Session lifetime as a `time` duration.
    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::hours(i64::from(self.session_ttl_hours))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ORIGIN.to_owned()],
            answers_dir: PathBuf::from(DEFAULT_ANSWERS_DIR),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            serialize_session_mutations: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    allowed_origins: Vec<String>,
    answers_dir: String,
    session_ttl_hours: u32,
    serialize_session_mutations: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = AppConfig::default();
        Self {
            allowed_origins: defaults.allowed_origins,
            answers_dir: DEFAULT_ANSWERS_DIR.to_owned(),
            session_ttl_hours: defaults.session_ttl_hours,
            serialize_session_mutations: defaults.serialize_session_mutations,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let session_ttl_hours = value.session_ttl_hours.min(MAX_SESSION_TTL_HOURS);
        if session_ttl_hours != value.session_ttl_hours {
            warn!(
                configured = value.session_ttl_hours,
                max = MAX_SESSION_TTL_HOURS,
                "session_ttl_hours too large; clamping"
            );
        }
        Self {
            allowed_origins: value.allowed_origins,
            answers_dir: PathBuf::from(value.answers_dir),
            session_ttl_hours,
            serialize_session_mutations: value.serialize_session_mutations,
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "answers_dir": "data/answers" }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.answers_dir, PathBuf::from("data/answers"));
        assert_eq!(config.allowed_origins, vec![DEFAULT_ORIGIN.to_owned()]);
        assert_eq!(config.session_ttl_hours, 24);
        assert!(config.serialize_session_mutations);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::from_file(Path::new("does/not/exist.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,"),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "session_ttl_hours": 4000000000 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);
    }

    #[test]
    fn ttl_is_expressed_in_hours() {
        let config = AppConfig {
            session_ttl_hours: 2,
            ..AppConfig::default()
        };
        assert_eq!(config.session_ttl(), time::Duration::hours(2));
    }
}
