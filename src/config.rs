use crate::nws::GridPoint;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Io(#[from] io::Error),
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub root: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            root: "https://api.weather.gov".to_string(),
            user_agent: concat!("nws-forecast/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
    /// Location served by `GET /`.
    pub default_location: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            bind: "127.0.0.1:8000".to_string(),
            default_location: "work".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api: ApiConfig,
    pub web: WebConfig,
    pub locations: BTreeMap<String, GridPoint>,
}

impl Default for Config {
    fn default() -> Self {
        let gsp = |x, y| GridPoint {
            office: "GSP".to_string(),
            x,
            y,
        };
        Config {
            data_dir: PathBuf::from("data"),
            api: ApiConfig::default(),
            web: WebConfig::default(),
            locations: BTreeMap::from([
                ("home".to_string(), gsp(40, 68)),
                ("work".to_string(), gsp(56, 70)),
                ("church".to_string(), gsp(34, 60)),
                ("ehhs".to_string(), gsp(61, 62)),
            ]),
        }
    }
}

impl Config {
    pub fn location(&self, name: &str) -> Option<&GridPoint> {
        self.locations.get(name)
    }

    pub fn location_names(&self) -> Vec<&str> {
        self.locations.keys().map(String::as_str).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::Invalid("no locations configured".to_string()));
        }
        for (name, point) in &self.locations {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!("bad location name {:?}", name)));
            }
            if point.office.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("location {} has no office", name)));
            }
        }
        if !self.locations.contains_key(&self.web.default_location) {
            return Err(ConfigError::Invalid(format!(
                "web.default_location {:?} is not a configured location",
                self.web.default_location
            )));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("api.user_agent is empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Loads the configuration file, or the built-in defaults when `config_path`
/// is `None`.
///
/// # Arguments
///
/// * 'config_path' - path to a TOML configuration file
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match config_path {
        Some(path) => {
            let toml = fs::read_to_string(path)?;
            toml::from_str(&toml)?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_know_the_four_locations() {
        let config = load_config(None).unwrap();
        assert_eq!(config.location_names(), vec!["church", "ehhs", "home", "work"]);
        assert_eq!(
            config.location("home"),
            Some(&GridPoint {
                office: "GSP".to_string(),
                x: 40,
                y: 68
            })
        );
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn file_overrides_sections_it_names() {
        let file = write_config(
            r#"
            data_dir = "/var/cache/nws"

            [web]
            default_location = "cabin"

            [locations.cabin]
            office = "RAH"
            x = 1
            y = 2
            "#,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/cache/nws"));
        assert_eq!(config.location_names(), vec!["cabin"]);
        assert_eq!(config.web.bind, "127.0.0.1:8000");
        assert_eq!(config.api.root, "https://api.weather.gov");
    }

    #[test]
    fn default_location_must_be_configured() {
        let file = write_config(
            r#"
            [locations.cabin]
            office = "RAH"
            x = 1
            y = 2
            "#,
        );
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("locations = 3");
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Parse(_))
        ));
    }
}
