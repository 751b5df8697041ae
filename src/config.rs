//! Per-user settings persisted in the data directory.

use crate::template::Template;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

pub const DATA_DIR_ENV: &str = "MOZREPORT_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_HOST: &str = "https://dbc-caf9527b-e073.cloud.databricks.com";
pub const SCHEMA_VERSION: &str = "v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} does not exist")]
    Missing(PathBuf),
    #[error("invalid template {name}; choices are: {}", .known.join(", "))]
    InvalidTemplate { name: String, known: Vec<String> },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("no data directory could be determined; set {}", DATA_DIR_ENV)]
    NoDataDir,
}

/// Where `config.toml` and user templates live.
///
/// `$MOZREPORT_CONFIG` wins over the platform's per-user data directory.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("mozreport"))
        .ok_or(ConfigError::NoDataDir)
}

/// Credentials for the remote platform.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub token: String,
    pub host: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    pub default_template: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub remote: RemoteConfig,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl CliConfig {
    /// Builds a config whose default template is one of `templates`.
    pub fn new(default_template: impl Into<String>, remote: RemoteConfig, templates: &[Template]) -> Result<Self, ConfigError> {
        let config = CliConfig {
            default_template: default_template.into(),
            schema_version: default_schema_version(),
            remote,
        };
        config.validate(templates)?;
        Ok(config)
    }

    pub fn validate(&self, templates: &[Template]) -> Result<(), ConfigError> {
        validate_template(&self.default_template, templates)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path, templates: &[Template]) -> Result<Self, ConfigError> {
        let config = Self::from_file_unchecked(path)?;
        config.validate(templates)?;
        Ok(config)
    }

    /// Loads the config without checking its default template, for callers
    /// that only need the remote settings or are about to replace it.
    pub fn from_file_unchecked(path: &Path) -> Result<Self, ConfigError> {
        load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save(self, path)
    }
}

/// Checks that `name` is among the discovered `templates`.
pub fn validate_template(name: &str, templates: &[Template]) -> Result<(), ConfigError> {
    if templates.iter().any(|template| template.name == name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTemplate {
            name: name.to_string(),
            known: templates.iter().map(|t| t.name.clone()).collect(),
        })
    }
}

pub(crate) fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::Missing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn save<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let text = toml::to_string(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "saved configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Vec<Template> {
        vec![
            Template::new("rmarkdown", "/nowhere/rmarkdown"),
            Template::new("jupyter", "/nowhere/jupyter"),
        ]
    }

    fn remote() -> RemoteConfig {
        RemoteConfig {
            token: "dapi123".to_string(),
            host: DEFAULT_HOST.to_string(),
        }
    }

    #[test]
    fn writes_and_rehydrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(!path.exists());

        let config = CliConfig::new("rmarkdown", remote(), &templates()).unwrap();
        config.save(&path).unwrap();
        assert!(path.exists());

        let rehydrated = CliConfig::from_file(&path, &templates()).unwrap();
        assert_eq!(rehydrated, config);
        assert_eq!(rehydrated.schema_version, "v1");
    }

    #[test]
    fn creates_intermediate_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo").join("bar").join("config.toml");
        let config = CliConfig::new("rmarkdown", remote(), &templates()).unwrap();
        config.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn rejects_unknown_template() {
        let error = CliConfig::new("latex", remote(), &templates()).unwrap_err();
        match error {
            ConfigError::InvalidTemplate { name, known } => {
                assert_eq!(name, "latex");
                assert_eq!(known, vec!["rmarkdown", "jupyter"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn loading_validates_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        CliConfig::new("jupyter", remote(), &templates())
            .unwrap()
            .save(&path)
            .unwrap();
        let only_rmarkdown = vec![Template::new("rmarkdown", "/nowhere/rmarkdown")];
        let error = CliConfig::from_file(&path, &only_rmarkdown).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidTemplate { .. }));

        let unchecked = CliConfig::from_file_unchecked(&path).unwrap();
        assert_eq!(unchecked.default_template, "jupyter");
        assert_eq!(unchecked.remote, remote());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let error = CliConfig::from_file(&path, &templates()).unwrap_err();
        assert!(matches!(error, ConfigError::Missing(missing) if missing == path));
    }

    #[test]
    fn parses_documented_layout() {
        let text = r#"
            default_template = "rmarkdown"

            [remote]
            token = "dapi123"
            host = "https://example.cloud.databricks.com"
        "#;
        let config: CliConfig = toml::from_str(text).unwrap();
        assert_eq!(config.schema_version, "v1");
        assert_eq!(config.remote.host, "https://example.cloud.databricks.com");
    }

    #[test]
    fn debug_output_hides_token() {
        let output = format!("{:?}", remote());
        assert!(!output.contains("dapi123"));
        assert!(output.contains(DEFAULT_HOST));
    }
}
