use std::time::Duration;

use serde::Deserialize;

/// Literal root marker understood by the remote store ("My Drive").
pub const ROOT_MARKER: &str = "root";

/// Prefix of a shared-drive root locator: `drive/<shared-drive-id>`.
pub const SHARED_DRIVE_PREFIX: &str = "drive/";

const DEFAULT_MAX_ITEMS_PER_LEVEL: usize = 250;
const MAX_ITEMS_PER_LEVEL_LIMIT: usize = 1000;
const DEFAULT_METADATA_TTL_S: u64 = 5 * 60;
const DEFAULT_CONTENT_TTL_S: u64 = 60;
const DEFAULT_PARENT_TTL_S: u64 = 12 * 60 * 60;
const DEFAULT_MISSING_PARENT_TTL_S: u64 = 72 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Folder ID, `root`, or `drive/<shared-drive-id>`.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_max_items_per_level")]
    pub max_items_per_level: usize,
    #[serde(default = "default_metadata_ttl_s")]
    pub metadata_ttl_s: u64,
    #[serde(default = "default_content_ttl_s")]
    pub content_ttl_s: u64,
    #[serde(default = "default_parent_ttl_s")]
    pub parent_ttl_s: u64,
    #[serde(default = "default_missing_parent_ttl_s")]
    pub missing_parent_ttl_s: u64,
}

fn default_root() -> String {
    ROOT_MARKER.to_string()
}

fn default_max_items_per_level() -> usize {
    DEFAULT_MAX_ITEMS_PER_LEVEL
}

fn default_metadata_ttl_s() -> u64 {
    DEFAULT_METADATA_TTL_S
}

fn default_content_ttl_s() -> u64 {
    DEFAULT_CONTENT_TTL_S
}

fn default_parent_ttl_s() -> u64 {
    DEFAULT_PARENT_TTL_S
}

fn default_missing_parent_ttl_s() -> u64 {
    DEFAULT_MISSING_PARENT_TTL_S
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_items_per_level: DEFAULT_MAX_ITEMS_PER_LEVEL,
            metadata_ttl_s: DEFAULT_METADATA_TTL_S,
            content_ttl_s: DEFAULT_CONTENT_TTL_S,
            parent_ttl_s: DEFAULT_PARENT_TTL_S,
            missing_parent_ttl_s: DEFAULT_MISSING_PARENT_TTL_S,
        }
    }
}

impl AdapterConfig {
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_items_per_level == 0 || self.max_items_per_level >= MAX_ITEMS_PER_LEVEL_LIMIT {
            anyhow::bail!(
                "max_items_per_level must be between 1 and {}, got {}",
                MAX_ITEMS_PER_LEVEL_LIMIT - 1,
                self.max_items_per_level
            );
        }
        if let Some(drive_id) = self.root.strip_prefix(SHARED_DRIVE_PREFIX) {
            if drive_id.is_empty() || drive_id.contains('/') {
                anyhow::bail!("shared drive root must look like drive/<id>, got {}", self.root);
            }
        } else if self.root.contains('/') {
            anyhow::bail!("root must be a single ID, got {}", self.root);
        }
        if self.metadata_ttl_s == 0 {
            anyhow::bail!("metadata_ttl_s must be greater than zero");
        }
        Ok(())
    }

    /// ID of the scope root. A shared drive's ID doubles as the ID of its
    /// top-level folder.
    pub fn root_id(&self) -> &str {
        let root = self.root.trim_matches('/');
        if root.is_empty() {
            return ROOT_MARKER;
        }
        root.strip_prefix(SHARED_DRIVE_PREFIX).unwrap_or(root)
    }

    pub fn shared_drive_id(&self) -> Option<&str> {
        self.root.strip_prefix(SHARED_DRIVE_PREFIX)
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_s)
    }

    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_s)
    }

    pub fn parent_ttl(&self) -> Duration {
        Duration::from_secs(self.parent_ttl_s)
    }

    pub fn missing_parent_ttl(&self) -> Duration {
        Duration::from_secs(self.missing_parent_ttl_s)
    }
}
