//! Configuration module for the assistant.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `GYN_` and use double underscores
//! to separate nested levels:
//! - `GYN_STORAGE__CONTAINER=medical-refs` sets `storage.container`
//! - `GYN_UPLOADS__MAX_ACTIVE=4` sets `uploads.max_active`
//! - `GYN_SERVER__BIND=0.0.0.0:5000` sets `server.bind`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Blob storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Azure OpenAI settings
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Semantic search settings
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    /// User upload policy
    #[serde(default)]
    pub uploads: UploadConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Azure storage account name; empty disables the remote store
    #[serde(default)]
    pub account: String,

    /// Blob container holding indexes and source documents
    #[serde(default = "default_container")]
    pub container: String,

    /// SAS token granting read/write/list/delete on the container
    #[serde(default)]
    pub sas_token: String,

    /// Local directory mirroring the blob key layout, used as a
    /// resolution fallback and for local-only mode
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiConfig {
    /// Azure OpenAI resource endpoint, e.g. https://myresource.openai.azure.com
    #[serde(default)]
    pub endpoint: String,

    /// API key; prefer setting GYN_OPENAI__API_KEY in the environment
    #[serde(default)]
    pub api_key: String,

    /// Deployment name for chat completions
    #[serde(default = "default_deployment")]
    pub deployment: String,

    /// API version query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SemanticSearchConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Directory for cached embedding model downloads
    #[serde(default = "default_model_cache")]
    pub model_cache_dir: PathBuf,

    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Maximum number of concurrently active user-uploaded indexes.
    /// Policy constant, not a physical limit.
    #[serde(default = "default_max_active")]
    pub max_active: usize,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allowed file extensions (lowercase, without dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_container() -> String {
    "gynassist".to_string()
}
fn default_local_root() -> PathBuf {
    PathBuf::from(".gynassist/store")
}
fn default_deployment() -> String {
    "gpt-35-turbo".to_string()
}
fn default_api_version() -> String {
    "2023-05-15".to_string()
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_model_cache() -> PathBuf {
    PathBuf::from(".gynassist/models")
}
fn default_top_k() -> usize {
    5
}
fn default_max_active() -> usize {
    2
}
fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}
fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            storage: StorageConfig::default(),
            openai: OpenAiConfig::default(),
            semantic_search: SemanticSearchConfig::default(),
            uploads: UploadConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            container: default_container(),
            sas_token: String::new(),
            local_root: default_local_root(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            deployment: default_deployment(),
            api_version: default_api_version(),
        }
    }
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            model_cache_dir: default_model_cache(),
            top_k: default_top_k(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            max_body_bytes: default_max_body_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| PathBuf::from("gynassist.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with GYN_ prefix
            // Use double underscore (__) to separate nested levels
            .merge(Env::prefixed("GYN_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)
    }

    /// Find the configuration file by searching from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let candidate = ancestor.join("gynassist.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// Whether a remote blob store is configured
    pub fn remote_store_configured(&self) -> bool {
        !self.storage.account.is_empty()
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from("gynassist.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let template = r#"# gynassist configuration file

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

[storage]
# Azure storage account name. Leave empty to run in local-only mode.
account = ""

# Blob container holding per-PDF indexes and source documents
container = "gynassist"

# SAS token with read/write/list/delete permission on the container.
# Prefer GYN_STORAGE__SAS_TOKEN in the environment.
sas_token = ""

# Local directory mirroring the blob key layout (fallback / local-only mode)
local_root = ".gynassist/store"

[openai]
# Azure OpenAI resource endpoint, e.g. https://myresource.openai.azure.com
endpoint = ""

# Prefer GYN_OPENAI__API_KEY in the environment
api_key = ""

# Chat-completions deployment name
deployment = "gpt-35-turbo"

api_version = "2023-05-15"

[semantic_search]
# Embedding model (downloaded on first start)
model = "AllMiniLML6V2"

# Directory for cached model downloads
model_cache_dir = ".gynassist/models"

# Chunks retrieved per question
top_k = 5

[uploads]
# Maximum concurrently active user-uploaded PDFs
max_active = 2

# Maximum upload size in bytes (16 MB)
max_body_bytes = 16777216

# Allowed upload extensions
allowed_extensions = ["pdf"]

[server]
# HTTP bind address
bind = "127.0.0.1:5000"
"#;

        std::fs::write(&config_path, template)?;

        if force {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upload_policy() {
        let settings = Settings::default();
        assert_eq!(settings.uploads.max_active, 2);
        assert_eq!(settings.uploads.max_body_bytes, 16 * 1024 * 1024);
        assert_eq!(settings.uploads.allowed_extensions, vec!["pdf"]);
        assert_eq!(settings.semantic_search.top_k, 5);
        assert!(!settings.remote_store_configured());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = Settings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.uploads.max_active, settings.uploads.max_active);
        assert_eq!(parsed.server.bind, settings.server.bind);
    }
}
