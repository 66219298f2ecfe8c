//! Configuration for the ohmytasks gateway

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the upstream task API lives and how to authenticate against it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Task CRUD endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Forwarded as `x-api-key` on every upstream call
    #[serde(default)]
    pub api_key: String,

    /// Optional user-settings endpoint; settings routes 404 without it
    #[serde(default)]
    pub settings_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the sqlite cache store
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Disable to force every read upstream
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Human-readable name for the token
    pub name: String,
    /// The hashed API token (argon2 hash, or plain text for backwards compat)
    pub token_hash: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("ohmytasks-cache.sqlite")
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            enabled: default_cache_enabled(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Default config path
    pub fn default_path() -> Result<PathBuf> {
        // Check environment variable first
        if let Ok(env_path) = std::env::var("OHMYTASKS_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        // Check for config in current directory
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Ok(local);
        }

        // Check /data/config.toml (Docker default)
        let data_config = PathBuf::from("/data/config.toml");
        if data_config.exists() {
            return Ok(data_config);
        }

        // Then check XDG config
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ohmytasks");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // Add helpful comments
        let with_comments = format!(
            "# ohmytasks gateway configuration\n\
             # See: https://github.com/vincenthenon/ohmytasks\n\n\
             {}\n\n\
             # Point [upstream] at your task API and add tokens with:\n\
             #   ohmytasks token --name <client-name>\n",
            content
        );

        std::fs::write(path, with_comments).context("Failed to write config file")?;

        Ok(())
    }

    /// Upstream endpoint must be configured before the gateway can run
    pub fn ensure_upstream(&self) -> Result<()> {
        if self.upstream.endpoint.trim().is_empty() {
            anyhow::bail!(
                "upstream.endpoint is not configured; edit your config.toml or run 'ohmytasks init'"
            );
        }
        Ok(())
    }

    /// Check if a token is valid (supports both hashed and legacy plain tokens)
    pub fn validate_token(&self, token: &str) -> bool {
        let argon2 = Argon2::default();

        for t in &self.tokens {
            // Try to parse as argon2 hash
            if let Ok(parsed_hash) = PasswordHash::new(&t.token_hash) {
                if argon2
                    .verify_password(token.as_bytes(), &parsed_hash)
                    .is_ok()
                {
                    return true;
                }
            } else {
                // Fallback: plain text comparison (legacy/backwards compat)
                if t.token_hash == token {
                    return true;
                }
            }
        }
        false
    }
}

/// Hash a token using argon2
pub fn hash_token(token: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash token: {}", e))?;
    Ok(hash.to_string())
}
