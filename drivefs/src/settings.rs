use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use drivefs_adapter::drive_client::{DEFAULT_API_URL, DEFAULT_UPLOAD_URL};
use drivefs_adapter::{AdapterConfig, MemoryPool, SqlitePool};
use drivefs_common::CachePool;

pub const ACCESS_TOKEN_ENV: &str = "DRIVEFS_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheSettings {
    None,
    #[default]
    Memory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            upload_url: default_upload_url(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.adapter.validate()?;
        if let CacheSettings::Sqlite { path } = &self.cache {
            if path.as_os_str().is_empty() {
                anyhow::bail!("cache.path must not be empty for the sqlite backend");
            }
        }
        if self.remote.api_url.is_empty() || self.remote.upload_url.is_empty() {
            anyhow::bail!("remote.api_url and remote.upload_url must not be empty");
        }
        Ok(())
    }

    pub fn open_pool(&self) -> anyhow::Result<Option<Arc<dyn CachePool>>> {
        Ok(match &self.cache {
            CacheSettings::None => None,
            CacheSettings::Memory => Some(Arc::new(MemoryPool::new())),
            CacheSettings::Sqlite { path } => {
                let pool = SqlitePool::open(path)?;
                pool.purge_expired()?;
                Some(Arc::new(pool))
            }
        })
    }
}

pub fn access_token() -> anyhow::Result<String> {
    std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("{} is not set", ACCESS_TOKEN_ENV))
}
