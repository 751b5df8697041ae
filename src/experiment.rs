use crate::config::{self, ConfigError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const EXPERIMENT_FILE_NAME: &str = "mozreport.toml";
pub const SCRIPT_FILE_NAME: &str = "mozreport_etl_script.py";
pub const SUMMARY_FILE_NAME: &str = "summary.sqlite3";

const ETL_SCRIPT: &str = include_str!("../etl_template/etl_script.py");

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("stub pattern is valid"));

/// Makes a lowercase, underscore-delimited stub out of an arbitrary title.
///
/// `"My Life (and Hard Times)"` becomes `"my_life_and_hard_times"`.
pub fn name_to_stub(name: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(name, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// An experiment being analysed from the current directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub branches: Vec<String>,
}

impl ExperimentConfig {
    pub fn new(slug: impl Into<String>, branches: Vec<String>) -> Self {
        ExperimentConfig {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slug.into(),
            branches,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        config::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        config::save(self, path)
    }

    /// The remote directory holding this experiment's script and results.
    pub fn working_path(&self) -> String {
        format!("/mozreport/{}-{}", name_to_stub(&self.slug), self.id)
    }

    pub fn remote_script_path(&self) -> String {
        format!("{}/{}", self.working_path(), SCRIPT_FILE_NAME)
    }

    pub fn remote_summary_path(&self) -> String {
        format!("{}/{}", self.working_path(), SUMMARY_FILE_NAME)
    }

    pub fn run_name(&self) -> String {
        format!("mozreport: {}", self.slug)
    }

    /// Command line understood by the analysis script.
    pub fn script_parameters(&self) -> Vec<String> {
        let mut parameters = vec![
            "--slug".to_string(),
            self.slug.clone(),
            "--uuid".to_string(),
            self.id.clone(),
        ];
        for branch in &self.branches {
            parameters.push("--branch".to_string());
            parameters.push(branch.clone());
        }
        parameters
    }
}

/// The default analysis script.
///
/// The script takes everything experiment specific from its command line
/// (see [`ExperimentConfig::script_parameters`]), so every experiment
/// starts from the same text.
pub fn etl_script() -> &'static str {
    ETL_SCRIPT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            id: "experiment-uuid".to_string(),
            slug: "Experiment Slug".to_string(),
            branches: vec!["control".to_string(), "treatment".to_string()],
        }
    }

    #[test]
    fn stubs() {
        assert_eq!(name_to_stub("My Life (and Hard Times)"), "my_life_and_hard_times");
        assert_eq!(name_to_stub("#123: Foo"), "123_foo");
        assert_eq!(name_to_stub("already_fine"), "already_fine");
        assert_eq!(name_to_stub("__trim me__"), "trim_me");
        assert_eq!(name_to_stub("!!!"), "");
    }

    #[test]
    fn writes_and_rehydrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mozreport.toml");
        assert!(!path.exists());
        config().save(&path).unwrap();
        assert!(path.exists());

        let rehydrated = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(rehydrated, config());
    }

    #[test]
    fn creates_intermediate_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo").join("bar").join("mozreport.toml");
        config().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let error = ExperimentConfig::from_file(&dir.path().join(EXPERIMENT_FILE_NAME)).unwrap_err();
        assert!(matches!(error, ConfigError::Missing(_)));
    }

    #[test]
    fn new_experiments_get_fresh_ids() {
        let a = ExperimentConfig::new("slug", vec![]);
        let b = ExperimentConfig::new("slug", vec![]);
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn remote_paths() {
        let config = config();
        assert_eq!(config.working_path(), "/mozreport/experiment_slug-experiment-uuid");
        assert_eq!(
            config.remote_summary_path(),
            "/mozreport/experiment_slug-experiment-uuid/summary.sqlite3"
        );
        assert_eq!(
            config.remote_script_path(),
            "/mozreport/experiment_slug-experiment-uuid/mozreport_etl_script.py"
        );
    }

    #[test]
    fn parameters_list_every_branch() {
        assert_eq!(
            config().script_parameters(),
            vec![
                "--slug",
                "Experiment Slug",
                "--uuid",
                "experiment-uuid",
                "--branch",
                "control",
                "--branch",
                "treatment"
            ]
        );
    }

    #[test]
    fn generated_script_reads_its_arguments() {
        let script = etl_script();
        for option in &["--slug", "--uuid", "--branch"] {
            assert!(script.contains(option), "script does not accept {}", option);
        }
    }
}
