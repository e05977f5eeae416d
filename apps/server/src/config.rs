//! Gateway configuration.
//!
//! CLI arguments with environment fallbacks, validated once at startup into
//! a [`GatewayConfig`].

use clap::Parser;
use linkhub_core::Collection;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

/// LinkHub sync gateway
///
/// Splits pushed state into per-collection files and writes each one to a
/// versioned file store with optimistic concurrency.
#[derive(Parser, Debug, Clone)]
#[command(name = "linkhub-gateway", version)]
#[command(about = "Sync gateway for LinkHub collections")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8787")]
    pub listen: SocketAddr,

    /// Comma-separated origins allowed to write, or "*"
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    /// Repository owner
    #[arg(long, env = "GH_OWNER")]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, env = "GH_REPO")]
    pub repo: Option<String>,

    /// Access token for the contents API
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Branch written to
    #[arg(long, env = "GH_BRANCH", default_value = "main")]
    pub branch: String,

    /// Optional directory inside the repository holding the data files
    #[arg(long, env = "GH_BASE_PATH", default_value = "")]
    pub base_path: String,

    /// Contents API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Timeout for each backing store request
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Serve from an in-process store instead of the repository (development)
    #[arg(long, env = "MEMORY_STORE", default_value = "false")]
    pub memory_store: bool,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if self.branch.trim().is_empty() {
            return Err("GH_BRANCH must not be empty".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be positive".to_string());
        }
        if !self.github_api_url.starts_with("http://") && !self.github_api_url.starts_with("https://")
        {
            return Err(format!(
                "GITHUB_API_URL must be an http(s) URL, got '{}'",
                self.github_api_url
            ));
        }
        if self.base_path.split('/').any(|segment| segment == "..") {
            return Err("GH_BASE_PATH must not contain '..'".to_string());
        }
        Ok(())
    }

    pub fn into_config(self) -> Result<GatewayConfig, String> {
        self.validate()?;
        Ok(GatewayConfig {
            origins: OriginPolicy::parse(&self.allowed_origins),
            repository: RepositoryConfig {
                owner: non_empty(self.owner),
                repo: non_empty(self.repo),
                token: non_empty(self.token),
                branch: self.branch.trim().to_string(),
                api_url: self.github_api_url.trim_end_matches('/').to_string(),
            },
            layout: ResourceLayout::new(&self.base_path),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            memory_store: self.memory_store,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Which origins may write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    Any,
    List(BTreeSet<String>),
}

impl OriginPolicy {
    /// Parse a comma-separated list. A `*` entry allows every origin.
    pub fn parse(raw: &str) -> Self {
        let entries: BTreeSet<String> = raw
            .split(',')
            .map(|entry| entry.trim().trim_end_matches('/').to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        if entries.contains("*") {
            OriginPolicy::Any
        } else {
            OriginPolicy::List(entries)
        }
    }

    pub fn allows(&self, origin: Option<&str>) -> bool {
        match self {
            OriginPolicy::Any => true,
            OriginPolicy::List(entries) => origin.is_some_and(|origin| entries.contains(origin)),
        }
    }

    /// Entries reported by the diagnostics endpoint.
    pub fn entries(&self) -> Vec<String> {
        match self {
            OriginPolicy::Any => vec!["*".to_string()],
            OriginPolicy::List(entries) => entries.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub branch: String,
    pub api_url: String,
}

/// Maps collections to paths inside the backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLayout {
    base_path: String,
}

impl ResourceLayout {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.trim().trim_matches('/').to_string(),
        }
    }

    pub fn path(&self, collection: Collection) -> String {
        if self.base_path.is_empty() {
            collection.resource_path()
        } else {
            format!("{}/{}", self.base_path, collection.resource_path())
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub origins: OriginPolicy,
    pub repository: RepositoryConfig,
    pub layout: ResourceLayout,
    pub request_timeout: Duration,
    pub memory_store: bool,
}

impl GatewayConfig {
    /// Development configuration: in-memory store, given origin policy.
    pub fn in_memory(origins: OriginPolicy) -> Self {
        Self {
            origins,
            repository: RepositoryConfig {
                owner: None,
                repo: None,
                token: None,
                branch: "main".to_string(),
                api_url: "https://api.github.com".to_string(),
            },
            layout: ResourceLayout::default(),
            request_timeout: Duration::from_secs(30),
            memory_store: true,
        }
    }
}
