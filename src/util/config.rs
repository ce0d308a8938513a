use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_issue_per_page")]
    pub issue_per_page: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Clock skew tolerated between a file write and an entity change.
    #[serde(default = "default_skew")]
    pub skew_secs: u64,
}

/// Which files count toward a pull request's size and type when they match
/// the ignored-path pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionPolicy {
    CountAll,
    #[default]
    ExcludeFromType,
    ExcludeFromSizeAndType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_generated_pattern")]
    pub generated_pattern: String,
    #[serde(default = "default_ignored_pattern")]
    pub ignored_pattern: String,
    #[serde(default = "default_comment_pattern")]
    pub comment_pattern: String,
    #[serde(default = "default_addition_cap")]
    pub addition_cap: u32,
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
    #[serde(default)]
    pub exclusion: ExclusionPolicy,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_issue_per_page() -> u32 {
    50
}
fn default_user_agent() -> String {
    format!("pulltally/{}", env!("CARGO_PKG_VERSION"))
}
fn default_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    10
}
fn default_base_delay() -> u64 {
    100
}
fn default_max_delay() -> u64 {
    30_000
}
fn default_max_jitter() -> u64 {
    250
}
fn default_skew() -> u64 {
    60
}
fn default_generated_pattern() -> String {
    r"changelog|CHANGELOG|Gopkg\.toml".to_string()
}
fn default_ignored_pattern() -> String {
    concat!(
        r"go\.mod|go\.sum|vendor/|third_party|ignore|schemas/v\d|schema/v\d|Gopkg\.lock|\.DS_Store|",
        r"\.json$|\.pb\.go|references/api/grpc|docs/commands/|pb\.gw\.go|proto/.*\.tmpl|proto/.*\.md"
    )
    .to_string()
}
fn default_comment_pattern() -> String {
    r"(?s)<!--.*?-->".to_string()
}
fn default_addition_cap() -> u32 {
    10
}
fn default_description_limit() -> usize {
    240
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            per_page: default_per_page(),
            issue_per_page: default_issue_per_page(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_jitter_ms: default_max_jitter(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            skew_secs: default_skew(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            generated_pattern: default_generated_pattern(),
            ignored_pattern: default_ignored_pattern(),
            comment_pattern: default_comment_pattern(),
            addition_cap: default_addition_cap(),
            description_limit: default_description_limit(),
            exclusion: ExclusionPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: AppConfig =
                toml::from_str(&content).with_context(|| "Failed to parse config file")?;
            return Ok(config);
        }

        let mut candidates = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".config/pulltally/config.toml"));
        }
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pulltally") {
            candidates.push(proj_dirs.config_dir().join("config.toml"));
        }

        for config_path in &candidates {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;
                let config: AppConfig =
                    toml::from_str(&content).with_context(|| "Failed to parse config file")?;
                return Ok(config);
            }
        }

        Ok(AppConfig::default())
    }

    pub fn cache_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.cache.dir {
            return dir.clone();
        }
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pulltally") {
            return proj_dirs.cache_dir().to_path_buf();
        }
        PathBuf::from(".cache/pulltally")
    }

    pub fn log_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pulltally") {
            return proj_dirs.data_dir().join("logs");
        }
        PathBuf::from(".local/share/pulltally/logs")
    }
}
