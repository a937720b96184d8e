use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::composer::ReportOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). Usually supplied through `SLACK_API_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Channel id, or a user id (`U...`) to send as a DM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default = "default_slack_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Fully qualified billing export table, `project.dataset.table`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    #[serde(default = "default_bigquery_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportToggles {
    #[serde(default)]
    pub project_breakdown: bool,
    #[serde(default)]
    pub thread_details: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_slack_url() -> String {
    crate::core::sink::slack::DEFAULT_BASE_URL.to_string()
}
fn default_bigquery_url() -> String {
    crate::core::source::bigquery::DEFAULT_BASE_URL.to_string()
}
fn default_credentials_file() -> PathBuf {
    PathBuf::from("/var/secrets/billing-sa")
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel: None,
            base_url: default_slack_url(),
        }
    }
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            table: None,
            credentials_file: default_credentials_file(),
            base_url: default_bigquery_url(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub bigquery: BigQueryConfig,
    #[serde(default)]
    pub report: ReportToggles,
    #[serde(default)]
    pub settings: Settings,
}

/// `true`, `1` or `yes`, case-insensitive. Anything else is off.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl ReportConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("costreport").join("config.toml")
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: ReportConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay environment variables onto file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SLACK_API_TOKEN") {
            self.slack.token = Some(v);
        }
        if let Some(v) = lookup("SLACK_CHANNEL_ID") {
            self.slack.channel = Some(v);
        }
        if let Some(v) = lookup("BQ_TABLE") {
            self.bigquery.table = Some(v);
        }
        if let Some(v) = lookup("GCP_CREDENTIALS_FILE") {
            self.bigquery.credentials_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("SEND_PROJECT_BREAKDOWN") {
            self.report.project_breakdown = parse_flag(&v);
        }
        if let Some(v) = lookup("SEND_THREAD_DETAILS") {
            self.report.thread_details = parse_flag(&v);
        }
    }

    /// Load and overlay the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Serialize and write this config to `path`.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            include_project_breakdown: self.report.project_breakdown,
            include_thread_details: self.report.thread_details,
            channel: self.slack.channel.clone().unwrap_or_default(),
        }
    }

    /// Validate the config. `needs_slack` is false for previews.
    pub fn validate(&self, needs_slack: bool) -> Vec<String> {
        let mut issues = Vec::new();
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        if needs_slack {
            if blank(&self.slack.token) {
                issues.push("Missing Slack token (slack.token or SLACK_API_TOKEN)".to_string());
            }
            if blank(&self.slack.channel) {
                issues.push(
                    "Missing Slack channel (slack.channel or SLACK_CHANNEL_ID)".to_string(),
                );
            }
        }
        if blank(&self.bigquery.table) {
            issues.push("Missing billing table (bigquery.table or BQ_TABLE)".to_string());
        }
        if self.bigquery.credentials_file.as_os_str().is_empty() {
            issues.push("Empty bigquery.credentials_file".to_string());
        }
        if self.settings.timeout_secs == 0 {
            issues.push("settings.timeout_secs must be greater than 0".to_string());
        }
        for (name, url) in [
            ("slack.base_url", &self.slack.base_url),
            ("bigquery.base_url", &self.bigquery.base_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                issues.push(format!("Invalid {}: '{}'", name, url));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> ReportConfig {
        let mut config = ReportConfig::default();
        config.slack.token = Some("xoxb-1".to_string());
        config.slack.channel = Some("C123".to_string());
        config.bigquery.table = Some("proj.billing.export".to_string());
        config
    }

    #[test]
    fn defaults_match_deployment() {
        let config = ReportConfig::default();
        assert_eq!(
            config.bigquery.credentials_file,
            PathBuf::from("/var/secrets/billing-sa")
        );
        assert!(!config.report.project_breakdown);
        assert!(!config.report.thread_details);
        assert_eq!(config.settings.timeout_secs, 30);
        assert_eq!(config.slack.base_url, "https://slack.com/api");
    }

    #[test]
    fn complete_config_is_valid() {
        assert!(complete().validate(true).is_empty());
    }

    #[test]
    fn validate_reports_missing_values() {
        let issues = ReportConfig::default().validate(true);
        assert!(issues.iter().any(|i| i.contains("Slack token")));
        assert!(issues.iter().any(|i| i.contains("Slack channel")));
        assert!(issues.iter().any(|i| i.contains("billing table")));
    }

    #[test]
    fn preview_does_not_need_slack() {
        let mut config = complete();
        config.slack.token = None;
        config.slack.channel = Some("  ".to_string());
        assert!(config.validate(false).is_empty());
        assert_eq!(config.validate(true).len(), 2);
    }

    #[test]
    fn validate_catches_bad_url_and_timeout() {
        let mut config = complete();
        config.slack.base_url = "slack.com/api".to_string();
        config.settings.timeout_secs = 0;
        let issues = config.validate(true);
        assert!(issues.iter().any(|i| i.contains("slack.base_url")));
        assert!(issues.iter().any(|i| i.contains("timeout_secs")));
    }

    #[test]
    fn parse_flag_values() {
        for on in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(parse_flag(on), "{on} should be on");
        }
        for off in ["false", "0", "no", "", "on"] {
            assert!(!parse_flag(off), "{off} should be off");
        }
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = complete();
        config.report.thread_details = true;
        let env: HashMap<&str, &str> = HashMap::from([
            ("SLACK_CHANNEL_ID", "U42"),
            ("BQ_TABLE", "other.billing.export"),
            ("GCP_CREDENTIALS_FILE", "/tmp/sa.json"),
            ("SEND_PROJECT_BREAKDOWN", "yes"),
            ("SEND_THREAD_DETAILS", "false"),
        ]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.slack.token.as_deref(), Some("xoxb-1"));
        assert_eq!(config.slack.channel.as_deref(), Some("U42"));
        assert_eq!(config.bigquery.table.as_deref(), Some("other.billing.export"));
        assert_eq!(config.bigquery.credentials_file, PathBuf::from("/tmp/sa.json"));

        let options = config.report_options();
        assert!(options.include_project_breakdown);
        assert!(!options.include_thread_details);
        assert_eq!(options.channel, "U42");
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[slack]
channel = "C999"

[report]
thread_details = true
"#;
        let config: ReportConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.slack.channel.as_deref(), Some("C999"));
        assert_eq!(config.slack.base_url, "https://slack.com/api");
        assert!(config.report.thread_details);
        assert!(!config.report.project_breakdown);
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: ReportConfig = toml::from_str("").unwrap();
        assert_eq!(config, ReportConfig::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = complete();
        config.save(&path).unwrap();
        let loaded = ReportConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let err = ReportConfig::load(Some(Path::new("/nonexistent/costreport.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[slack\nchannel = 1").unwrap();
        let err = ReportConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_path_uses_xdg_when_set() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test_xdg_config");
        let path = ReportConfig::config_path();
        std::env::remove_var("XDG_CONFIG_HOME");
        assert_eq!(
            path,
            PathBuf::from("/tmp/test_xdg_config/costreport/config.toml")
        );
    }
}
