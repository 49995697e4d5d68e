//! Versioned server configuration with a reader/writer lock and atomic save.
//!
//! The configuration lives at `<config-dir>/config.json`. On first run a
//! default configuration is synthesized (region `us-east-1`, freshly
//! generated credentials) and saved; on subsequent runs the file is loaded
//! and its version field is reset to [`CONFIG_VERSION`], which acts as the
//! forward-migration hook for older files.
//!
//! Saves go through a sibling temp file followed by a rename, so a crash
//! mid-save never leaves a torn `config.json` behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credential::Credential;
use crate::error::{ConfigError, ConfigResult};

/// Current configuration format version. Loaded files are stamped with this
/// value regardless of what they carried on disk.
pub const CONFIG_VERSION: &str = "4";

/// File name of the configuration document inside the config directory.
const CONFIG_FILE: &str = "config.json";

/// Directory for TLS material, created next to the configuration file.
const CERTS_DIR: &str = "certs";

/// Default serving region for newly created configurations.
const DEFAULT_REGION: &str = "us-east-1";

// ---------------------------------------------------------------------------
// Logger targets
// ---------------------------------------------------------------------------

/// File logger target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FileLogger {
    /// Whether the file target is enabled.
    pub enable: bool,
    /// Path of the log file.
    pub filename: String,
    /// Minimum level written to the file.
    pub level: String,
}

/// Console logger target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleLogger {
    /// Whether the console target is enabled.
    pub enable: bool,
    /// Minimum level written to the console.
    pub level: String,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            enable: true,
            level: "error".to_owned(),
        }
    }
}

/// Syslog logger target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SyslogLogger {
    /// Whether the syslog target is enabled.
    pub enable: bool,
    /// Network address of the syslog daemon.
    pub addr: String,
    /// Minimum level forwarded to syslog.
    pub level: String,
}

/// The set of configured logger targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    /// File target.
    pub file: FileLogger,
    /// Console target.
    pub console: ConsoleLogger,
    /// Syslog target.
    pub syslog: SyslogLogger,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// The persisted server configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Configuration format version tag.
    pub version: String,
    /// API access credentials.
    pub credential: Credential,
    /// Serving region reported to clients.
    pub region: String,
    /// Logger targets.
    pub logger: LoggerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_owned(),
            credential: Credential::generate(),
            region: DEFAULT_REGION.to_owned(),
            logger: LoggerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// A configuration document bound to its on-disk location, guarded by a
/// reader/writer lock.
///
/// Readers (the per-request accessors) take the shared lock; setters take
/// the exclusive lock. [`ConfigStore::save`] serializes under the shared
/// lock and publishes the bytes atomically.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    inner: RwLock<ServerConfig>,
}

impl ConfigStore {
    /// Load the configuration from `dir`, creating it (and the sibling
    /// `certs/` directory) with defaults on first run.
    pub fn init(dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ConfigError::io(&dir, e))?;
        let certs = dir.join(CERTS_DIR);
        fs::create_dir_all(&certs).map_err(|e| ConfigError::io(&certs, e))?;

        let path = dir.join(CONFIG_FILE);
        let store = if path.exists() {
            let raw = fs::read(&path).map_err(|e| ConfigError::io(&path, e))?;
            let mut config: ServerConfig = serde_json::from_slice(&raw)?;
            // Stamp the running version; older files migrate forward on the
            // next save.
            config.version = CONFIG_VERSION.to_owned();
            debug!(path = %path.display(), "loaded server config");
            Self {
                dir,
                inner: RwLock::new(config),
            }
        } else {
            let store = Self {
                dir,
                inner: RwLock::new(ServerConfig::default()),
            };
            store.save()?;
            info!(path = %path.display(), "created default server config");
            store
        };

        Ok(store)
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Path of the TLS certificate directory.
    #[must_use]
    pub fn certs_path(&self) -> PathBuf {
        self.dir.join(CERTS_DIR)
    }

    /// Current configuration version tag.
    #[must_use]
    pub fn version(&self) -> String {
        self.inner.read().version.clone()
    }

    /// Current serving region.
    #[must_use]
    pub fn region(&self) -> String {
        self.inner.read().region.clone()
    }

    /// Replace the serving region.
    pub fn set_region(&self, region: impl Into<String>) {
        self.inner.write().region = region.into();
    }

    /// Current access credentials.
    #[must_use]
    pub fn credential(&self) -> Credential {
        self.inner.read().credential.clone()
    }

    /// Replace the access credentials.
    pub fn set_credential(&self, credential: Credential) {
        self.inner.write().credential = credential;
    }

    /// Current file logger target.
    #[must_use]
    pub fn file_logger(&self) -> FileLogger {
        self.inner.read().logger.file.clone()
    }

    /// Replace the file logger target.
    pub fn set_file_logger(&self, logger: FileLogger) {
        self.inner.write().logger.file = logger;
    }

    /// Current console logger target.
    #[must_use]
    pub fn console_logger(&self) -> ConsoleLogger {
        self.inner.read().logger.console.clone()
    }

    /// Replace the console logger target.
    pub fn set_console_logger(&self, logger: ConsoleLogger) {
        self.inner.write().logger.console = logger;
    }

    /// Current syslog logger target.
    #[must_use]
    pub fn syslog_logger(&self) -> SyslogLogger {
        self.inner.read().logger.syslog.clone()
    }

    /// Replace the syslog logger target.
    pub fn set_syslog_logger(&self, logger: SyslogLogger) {
        self.inner.write().logger.syslog = logger;
    }

    /// Return a snapshot of the whole configuration.
    #[must_use]
    pub fn snapshot(&self) -> ServerConfig {
        self.inner.read().clone()
    }

    /// Persist the configuration atomically: serialize, write to a sibling
    /// temp file, fsync, and rename over `config.json`.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path();
        let bytes = {
            let config = self.inner.read();
            serde_json::to_vec_pretty(&*config)?
        };

        let temp = temp_sibling(&path);
        let result = write_and_rename(&temp, &path, &bytes);
        if result.is_err() {
            // Never leave a stray temp file behind on failure.
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

/// Build a sibling temp path `<path>-<8hex>`.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(format!("-{:08x}", rand::rng().random::<u32>()));
    PathBuf::from(os)
}

fn write_and_rename(temp: &Path, path: &Path, bytes: &[u8]) -> ConfigResult<()> {
    let mut file = fs::File::create(temp).map_err(|e| ConfigError::io(temp, e))?;
    file.write_all(bytes).map_err(|e| ConfigError::io(temp, e))?;
    file.sync_all().map_err(|e| ConfigError::io(temp, e))?;
    drop(file);
    fs::rename(temp, path).map_err(|e| ConfigError::io(path, e))
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static SERVER_CONFIG: OnceLock<ConfigStore> = OnceLock::new();

/// Initialize the process-wide configuration store from `dir`.
///
/// The first successful call wins; later calls return the already
/// initialized store and ignore `dir`.
pub fn init_config(dir: impl Into<PathBuf>) -> ConfigResult<&'static ConfigStore> {
    if let Some(existing) = SERVER_CONFIG.get() {
        return Ok(existing);
    }
    let store = ConfigStore::init(dir)?;
    Ok(SERVER_CONFIG.get_or_init(|| store))
}

/// The process-wide configuration store, if [`init_config`] has run.
#[must_use]
pub fn server_config() -> Option<&'static ConfigStore> {
    SERVER_CONFIG.get()
}
