//! Settings: command-line flags over environment over config file over defaults.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::{
    github::{DEFAULT_API_BASE, GitHubError},
    retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy},
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Config file structure (`$XDG_CONFIG_HOME/fork-sync/config.yaml`)
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub github_token: Option<String>,
    pub api_base: Option<String>,
    pub max_retries: Option<u32>,
    /// Seconds between retries.
    pub retry_delay: Option<u64>,
    pub max_concurrency: Option<usize>,
    /// Seconds; 0 disables the timeout.
    pub request_timeout: Option<u64>,
}

/// Values supplied on the command line (or via their bound env vars).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub max_retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub api_base: String,
    pub retry: RetryPolicy,
    pub max_concurrency: Option<usize>,
    pub request_timeout: Option<Duration>,
}

impl Settings {
    /// Merge all sources. Fails only when no token can be found.
    pub fn resolve(
        overrides: &Overrides,
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GitHubError> {
        let token = find_token(&env, &file)?;
        let api_base = env("GITHUB_API_URL")
            .filter(|url| !url.is_empty())
            .or(file.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let max_retries = overrides
            .max_retries
            .or(file.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let delay = overrides
            .retry_delay
            .or(file.retry_delay)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        let request_timeout = match file.request_timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_REQUEST_TIMEOUT),
        };

        Ok(Self {
            token,
            api_base,
            retry: RetryPolicy::new(max_retries, delay),
            max_concurrency: overrides
                .max_concurrency
                .or(file.max_concurrency)
                .filter(|cap| *cap > 0),
            request_timeout,
        })
    }
}

/// Find the GitHub token: `GITHUB_TOKEN`, then `GH_TOKEN`, then the config file.
fn find_token(
    env: &impl Fn(&str) -> Option<String>,
    file: &ConfigFile,
) -> Result<String, GitHubError> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Some(token) = env(var)
            && !token.is_empty()
        {
            tracing::debug!("Using GitHub token from {} env var", var);
            return Ok(token);
        }
    }

    if let Some(token) = file.github_token.as_ref().filter(|token| !token.is_empty()) {
        tracing::debug!("Using GitHub token from config file");
        return Ok(token.clone());
    }

    Err(GitHubError::NoToken)
}

/// Load the config file, falling back to defaults if it is absent or broken.
pub fn load_config_file() -> ConfigFile {
    let Ok(path) = get_config_path() else {
        return ConfigFile::default();
    };
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::debug!("No config file at {}: {}", path.display(), error);
            return ConfigFile::default();
        }
    };
    parse_config(&contents)
        .inspect(|_| tracing::debug!("Using config file {}", path.display()))
        .unwrap_or_else(|error| {
            tracing::warn!("Ignoring malformed config file {}: {}", path.display(), error);
            ConfigFile::default()
        })
}

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

fn get_config_path() -> Result<PathBuf> {
    let base_dirs = xdg::BaseDirectories::with_prefix(env!("CARGO_PKG_NAME"));
    base_dirs
        .get_config_file("config.yaml")
        .ok_or_else(|| anyhow!("Failed to determine config file path"))
}

/// Printed when no token is found anywhere.
pub const TOKEN_HELP: &str = "\
To use fork-sync you need a GitHub personal access token with 'repo' scope.

You can provide it in one of these ways:
  1. Set an environment variable:
     export GITHUB_TOKEN=your_github_token_here
  2. Add it to ~/.config/fork-sync/config.yaml:
     github_token: your_github_token_here

To create a token, visit: https://github.com/settings/tokens";
