use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_HOST_ORIGIN: &str = "http://localhost";
const DEFAULT_ENTRY_POINT: &str = "render";

/// Environment variable pointing at an optional YAML config file.
pub const CONFIG_ENV: &str = "WIDGET_BRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse host origin: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("entry point name must not be empty")]
    EmptyEntryPoint,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    host_origin: Option<String>,
    entry_point: Option<String>,
    import_timeout_ms: Option<u64>,
    stylesheet_timeout_ms: Option<u64>,
}

/// Runtime settings for a bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    host_origin: Url,
    entry_point: String,
    import_timeout: Option<Duration>,
    stylesheet_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_origin: Url::parse(DEFAULT_HOST_ORIGIN).expect("default host origin"),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            import_timeout: None,
            stylesheet_timeout: None,
        }
    }
}

impl BridgeConfig {
    /// Load the config from `config_path`, falling back to defaults when the
    /// path is absent or does not exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let raw = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str::<Option<RawConfig>>(&contents)?.unwrap_or_default()
            }
            _ => RawConfig::default(),
        };

        let host_origin = match raw.host_origin {
            Some(origin) => Url::parse(&origin)?,
            None => Url::parse(DEFAULT_HOST_ORIGIN)?,
        };
        let entry_point = raw
            .entry_point
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string());
        if entry_point.trim().is_empty() {
            return Err(ConfigError::EmptyEntryPoint);
        }

        Ok(Self {
            host_origin,
            entry_point,
            import_timeout: raw.import_timeout_ms.map(Duration::from_millis),
            stylesheet_timeout: raw.stylesheet_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Load using the path named by [`CONFIG_ENV`], if set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
    }

    pub fn with_host_origin(mut self, origin: Url) -> Self {
        self.host_origin = origin;
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = Some(timeout);
        self
    }

    pub fn with_stylesheet_timeout(mut self, timeout: Duration) -> Self {
        self.stylesheet_timeout = Some(timeout);
        self
    }

    /// Serialized origin (`scheme://host[:port]`) inbound frames must carry.
    pub fn expected_origin(&self) -> String {
        self.host_origin.origin().ascii_serialization()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn import_timeout(&self) -> Option<Duration> {
        self.import_timeout
    }

    pub fn stylesheet_timeout(&self) -> Option<Duration> {
        self.stylesheet_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config.entry_point(), "render");
        assert_eq!(config.expected_origin(), "http://localhost");
        assert!(config.import_timeout().is_none());
        assert!(config.stylesheet_timeout().is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = BridgeConfig::load(Some(PathBuf::from("/nonexistent/bridge.yaml"))).unwrap();
        assert_eq!(config.entry_point(), "render");
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "host_origin: https://notebook.example:8443/app/\nentry_point: mount\nimport_timeout_ms: 2500\nstylesheet_timeout_ms: 500"
        )
        .unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.expected_origin(), "https://notebook.example:8443");
        assert_eq!(config.entry_point(), "mount");
        assert_eq!(config.import_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.stylesheet_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.entry_point(), "render");
    }

    #[test]
    fn rejects_blank_entry_point() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "entry_point: \"  \"").unwrap();
        let err = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyEntryPoint));
    }

    #[test]
    fn rejects_bad_origin() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "host_origin: not a url").unwrap();
        let err = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }
}
