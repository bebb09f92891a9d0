// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for a vrouter node, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Virtualization platform connection
// - Image catalog location
// - Worker pool sizing and task result retention
// - HTTP API and token authentication
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "vrouter/v1";
pub const KIND: &str = "RouterNodeConfig";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterNodeConfig {
    /// API version (must be "vrouter/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RouterNodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: NodeConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformBackend {
    /// JSON gateway in front of the hypervisor manager
    #[default]
    Rest,
    /// In-process simulator (development only)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub backend: PlatformBackend,

    /// Gateway base URL, e.g. https://vcenter-gw.example.com/api
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub user: String,

    /// Password (supports "env:VAR_NAME" for environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Interval between polls of a long-running platform operation
    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Directory holding router-<family>-<version>.ova artifacts
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds a finished task result is kept for polling
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Destroy a deployed instance whose annotation could not be written
    #[serde(default = "default_true")]
    pub cleanup_on_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Public URL prefix used in task status links
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for X-Auth tokens (supports "env:VAR_NAME")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_task_poll_interval() -> u64 {
    500
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("/images")
}

fn default_worker_count() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_result_ttl() -> u64 {
    3600
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: PlatformBackend::default(),
            endpoint: String::new(),
            user: String::new(),
            password: None,
            verify_tls: true,
            task_poll_interval_ms: default_task_poll_interval(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            result_ttl_secs: default_result_ttl(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            cleanup_on_failure: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            base_url: String::new(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for RouterNodeConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "vrouter-node".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

/// Resolve a secret value, following the "env:VAR_NAME" convention.
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("environment variable {} is not set", var)),
        None => Ok(value.to_string()),
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` flag
    Explicit(PathBuf),
    Discovered(PathBuf),
    Defaults,
}

impl RouterNodeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. VROUTER_CONFIG_PATH environment variable
    /// 2. ./vrouter-config.yaml (working directory)
    /// 3. ~/.vrouter/config.yaml (user home)
    /// 4. /etc/vrouter/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VROUTER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./vrouter-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vrouter").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/vrouter/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Read configuration with discovery, fallback to default.
    ///
    /// Emits no logs and applies no environment overrides, so it can run
    /// before logging is set up.
    pub fn read(cli_path: Option<PathBuf>) -> anyhow::Result<(Self, ConfigSource)> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            let config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            return Ok((config, ConfigSource::Explicit(path)));
        }

        match Self::discover_config() {
            Some(path) => Ok((Self::from_yaml_file(&path)?, ConfigSource::Discovered(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (config, source) = Self::read(cli_path)?;
        Ok(config.finish_loading(&source))
    }

    /// Log where `self` came from and apply environment overrides.
    pub fn finish_loading(mut self, source: &ConfigSource) -> Self {
        match source {
            ConfigSource::Explicit(path) => {
                tracing::info!("Loading configuration from explicit path: {:?}", path)
            }
            ConfigSource::Discovered(path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", path)
            }
            ConfigSource::Defaults => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.")
            }
        }
        self.apply_env_overrides();
        self
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("VROUTER_IMAGES_DIR") {
            tracing::info!("Environment override: VROUTER_IMAGES_DIR={}", dir);
            self.spec.images.dir = PathBuf::from(dir);
        }

        if let Ok(endpoint) = std::env::var("VROUTER_PLATFORM_ENDPOINT") {
            tracing::info!("Environment override: VROUTER_PLATFORM_ENDPOINT={}", endpoint);
            self.spec.platform.endpoint = endpoint;
        }

        if let Ok(val) = std::env::var("VROUTER_WORKERS") {
            match val.parse::<usize>() {
                Ok(count) => {
                    tracing::info!("Environment override: VROUTER_WORKERS={}", count);
                    self.spec.workers.count = count;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for VROUTER_WORKERS: '{}'. Expected a number. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.images.dir.as_os_str().is_empty() {
            anyhow::bail!("spec.images.dir cannot be empty");
        }

        if self.spec.workers.count == 0 {
            anyhow::bail!("spec.workers.count must be at least 1");
        }

        if self.spec.workers.queue_capacity == 0 {
            anyhow::bail!("spec.workers.queue_capacity must be at least 1");
        }

        if self.spec.platform.backend == PlatformBackend::Rest {
            if self.spec.platform.endpoint.is_empty() {
                anyhow::bail!("spec.platform.endpoint is required for the rest backend");
            }
            if self.spec.platform.user.is_empty() {
                anyhow::bail!("spec.platform.user is required for the rest backend");
            }
        }

        match self.spec.observability.log_format.as_str() {
            "compact" | "json" => {}
            other => anyhow::bail!(
                "Invalid log_format: '{}'. Must be 'compact' or 'json'",
                other
            ),
        }

        Ok(())
    }
}
