//! Configuration management for pushcheck.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pushcheck_git::{MirrorConfig, RemoteLayout};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tags::TagSet;

/// pushcheck configuration, usually loaded from `pushcheck.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Git server and mirror settings.
    #[serde(default)]
    pub git: GitConfig,

    /// Worker pacing.
    #[serde(default)]
    pub queue: QueueConfig,

    /// The push manager web application, for links in messages.
    #[serde(default)]
    pub main_app: MainAppConfig,

    /// Code review server, for links in messages.
    #[serde(default)]
    pub reviewboard: ReviewboardConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub web_hooks: WebHooksConfig,
}

impl Config {
    /// Load config from a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file can't be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or fails validation.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.git.main_repository.trim().is_empty() {
            return Err(Error::Config("git.main_repository must not be empty".into()));
        }
        if self.git.main_branch.trim().is_empty() {
            return Err(Error::Config("git.main_branch must not be empty".into()));
        }
        if self.git.command_timeout_secs == 0 {
            return Err(Error::Config("git.command_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Settings for the shared mirror.
    #[must_use]
    pub fn mirror_config(&self) -> MirrorConfig {
        let git = &self.git;
        MirrorConfig {
            layout: RemoteLayout {
                scheme: git.scheme.clone(),
                servername: git.servername.clone(),
                port: git.port,
                auth: git.auth.clone(),
                main_repository: git.main_repository.clone(),
                dev_repositories_dir: git.dev_repositories_dir.clone(),
            },
            main_branch: git.main_branch.clone(),
            local_repo_path: git.local_repo_path.clone(),
            local_mirror: git.local_mirror.clone(),
            command_timeout: Duration::from_secs(git.command_timeout_secs),
            committer_name: git.committer_name.clone(),
            committer_email: git.committer_email.clone(),
        }
    }

    /// Tags whose requests are never verified.
    #[must_use]
    pub fn excluded_tags(&self) -> TagSet {
        self.git.exclude_from_verification.iter().cloned().collect()
    }
}

/// Git server and mirror settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_servername")]
    pub servername: String,

    #[serde(default)]
    pub port: Option<u16>,

    /// Credential placed in the URL userinfo.
    #[serde(default)]
    pub auth: Option<SecretString>,

    #[serde(default = "default_main_repository")]
    pub main_repository: String,

    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Server directory holding developer repositories.
    #[serde(default = "default_dev_repositories_dir")]
    pub dev_repositories_dir: String,

    /// Local directory for the shared mirror.
    #[serde(default = "default_local_repo_path")]
    pub local_repo_path: PathBuf,

    /// Optional object store used with `git clone --reference`.
    #[serde(default)]
    pub local_mirror: Option<PathBuf>,

    #[serde(default)]
    pub exclude_from_verification: Vec<String>,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            servername: default_servername(),
            port: None,
            auth: None,
            main_repository: default_main_repository(),
            main_branch: default_main_branch(),
            dev_repositories_dir: default_dev_repositories_dir(),
            local_repo_path: default_local_repo_path(),
            local_mirror: None,
            exclude_from_verification: Vec::new(),
            command_timeout_secs: default_command_timeout_secs(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
        }
    }
}

fn default_scheme() -> String {
    "https".into()
}

fn default_servername() -> String {
    "localhost".into()
}

fn default_main_repository() -> String {
    "main".into()
}

fn default_main_branch() -> String {
    "master".into()
}

fn default_dev_repositories_dir() -> String {
    "dev".into()
}

fn default_local_repo_path() -> PathBuf {
    PathBuf::from("repos")
}

const fn default_command_timeout_secs() -> u64 {
    300
}

fn default_committer_name() -> String {
    "pushcheck".into()
}

fn default_committer_email() -> String {
    "pushcheck@localhost".into()
}

/// Worker pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Pause between jobs, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Bound on the already-in-main commit cache.
    #[serde(default = "default_sha_cache_limit")]
    pub sha_cache_limit: usize,
}

impl QueueConfig {
    #[must_use]
    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            sha_cache_limit: default_sha_cache_limit(),
        }
    }
}

const fn default_throttle_ms() -> u64 {
    1000
}

const fn default_sha_cache_limit() -> usize {
    1000
}

/// The push manager web application.
#[derive(Debug, Clone, Deserialize)]
pub struct MainAppConfig {
    #[serde(default = "default_servername")]
    pub servername: String,

    #[serde(default = "default_https_port")]
    pub port: u16,
}

impl MainAppConfig {
    /// Base URL, leaving out the port when it is the https default.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.port == 443 {
            format!("https://{}", self.servername)
        } else {
            format!("https://{}:{}", self.servername, self.port)
        }
    }
}

impl Default for MainAppConfig {
    fn default() -> Self {
        Self {
            servername: default_servername(),
            port: default_https_port(),
        }
    }
}

const fn default_https_port() -> u16 {
    443
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewboardConfig {
    #[serde(default = "default_servername")]
    pub servername: String,
}

impl Default for ReviewboardConfig {
    fn default() -> Self {
        Self {
            servername: default_servername(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Domain appended to bare user names.
    #[serde(default = "default_mail_domain")]
    pub default_domain: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_domain: default_mail_domain(),
        }
    }
}

fn default_mail_domain() -> String {
    "localhost".into()
}

/// Outbound web hooks. Disabled when `post_url` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct WebHooksConfig {
    #[serde(default)]
    pub post_url: Option<String>,

    #[serde(default = "default_web_hook_timeout_secs")]
    pub timeout_secs: u64,
}

impl WebHooksConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WebHooksConfig {
    fn default() -> Self {
        Self {
            post_url: None,
            timeout_secs: default_web_hook_timeout_secs(),
        }
    }
}

const fn default_web_hook_timeout_secs() -> u64 {
    3
}
