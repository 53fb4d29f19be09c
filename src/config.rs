//! Configuration loading for the showroom server.
//!
//! Settings are read from `showroom.toml` and layered with environment
//! overrides (file → environment). Every section is optional; omitted
//! fields fall back to defaults that suit a single-branch install.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8080
//! bind = "127.0.0.1"
//!
//! [database]
//! path = "showroom.db"
//!
//! [cache]
//! ttl_secs = 180
//! max_entries = 256
//!
//! [ingest]
//! scan_limit = 30
//! manifest_cap = 5
//!
//! [logging]
//! dir = "logs"
//!
//! [[mailboxes]]
//! branch = "City Showroom"
//! host = "imap.example.com"
//! port = 993
//! user = "loads@example.com"
//! password = ""            # or set SHOWROOM_IMAP_PASSWORD
//! sender_filter = "dispatch@oem.example.com"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up by `load_or_default`.
pub const CONFIG_FILE: &str = "showroom.toml";

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address to bind (default: "127.0.0.1")
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Path to the database file (default: "showroom.db")
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("showroom.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Read-cache settings for the dashboard endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Seconds a cached result stays fresh (default: 180)
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Maximum cached entries before the oldest is evicted (default: 256)
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl() -> u64 {
    180
}

fn default_cache_entries() -> usize {
    256
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

/// Manifest ingestion limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// Newest messages examined per sync run (default: 30)
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    /// New loads imported per sync run (default: 5)
    #[serde(default = "default_manifest_cap")]
    pub manifest_cap: usize,
}

fn default_scan_limit() -> usize {
    30
}

fn default_manifest_cap() -> usize {
    5
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            scan_limit: default_scan_limit(),
            manifest_cap: default_manifest_cap(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Directory for daily-rolled log files; stderr only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// One IMAP mailbox feeding one branch with S08 load manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Branch the manifests belong to, matched against `branches.name`
    pub branch: String,
    pub host: String,
    /// IMAPS port (default: 993)
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub user: String,
    /// Account password; leave empty and set SHOWROOM_IMAP_PASSWORD instead
    #[serde(default)]
    pub password: String,
    /// Only messages FROM this address are trusted as manifest sources
    pub sender_filter: String,
}

fn default_imap_port() -> u16 {
    993
}

/// Root configuration, deserialized from `showroom.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub mailboxes: Vec<MailboxConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse showroom.toml")
    }

    /// Load configuration from `showroom.toml` in the given directory.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize showroom.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the database path, with fallback to environment variable.
    pub fn db_path(&self) -> PathBuf {
        std::env::var("SHOWROOM_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.database.path.clone())
    }

    /// Get the server port, with fallback to environment variable.
    pub fn port(&self) -> u16 {
        if let Ok(env_val) = std::env::var("SHOWROOM_PORT")
            && let Ok(port) = env_val.parse()
        {
            return port;
        }
        self.server.port
    }

    /// Look up the mailbox for a branch. An empty file password is filled
    /// from SHOWROOM_IMAP_PASSWORD so credentials can stay out of the file.
    pub fn mailbox_for(&self, branch: &str) -> Option<MailboxConfig> {
        let mut mailbox = self
            .mailboxes
            .iter()
            .find(|m| m.branch == branch)
            .cloned()?;
        if mailbox.password.is_empty()
            && let Ok(env_val) = std::env::var("SHOWROOM_IMAP_PASSWORD")
        {
            mailbox.password = env_val;
        }
        Some(mailbox)
    }

    /// Validate the configuration, returning a list of warnings.
    /// Warnings don't prevent startup but indicate likely misconfiguration.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cache.ttl_secs == 0 {
            warnings.push(
                "cache.ttl_secs is 0: every dashboard request will hit the database".to_string(),
            );
        }
        if self.cache.max_entries == 0 {
            warnings.push("cache.max_entries is 0: caching is effectively disabled".to_string());
        }
        if self.ingest.manifest_cap == 0 {
            warnings.push("ingest.manifest_cap is 0: sync runs will never import anything".to_string());
        }
        if self.ingest.manifest_cap > self.ingest.scan_limit {
            warnings.push(format!(
                "ingest.manifest_cap ({}) exceeds scan_limit ({}): the cap can never be reached",
                self.ingest.manifest_cap, self.ingest.scan_limit
            ));
        }

        for mailbox in &self.mailboxes {
            if mailbox.host.is_empty() {
                warnings.push(format!("Mailbox '{}' has an empty host", mailbox.branch));
            }
            if mailbox.user.is_empty() {
                warnings.push(format!("Mailbox '{}' has an empty user", mailbox.branch));
            }
            if mailbox.sender_filter.is_empty() {
                warnings.push(format!(
                    "Mailbox '{}' has an empty sender_filter: any sender could inject stock",
                    mailbox.branch
                ));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for mailbox in &self.mailboxes {
            if !seen.insert(mailbox.branch.as_str()) {
                warnings.push(format!(
                    "Duplicate mailbox entry for branch '{}'",
                    mailbox.branch
                ));
            }
        }

        warnings
    }
}
