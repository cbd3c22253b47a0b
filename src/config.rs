//! Local configuration: `~/.relic/config.toml` plus `RELIC_*`
//! environment overrides. The file is read once at startup and written
//! at most once per invocation (key generation or explicit `config`
//! set).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

pub const DEFAULT_SERVER: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACCESS_LEVEL: &str = "private";
pub const DEFAULT_EXPIRES_IN: &str = "never";

const CONFIG_DIR_NAME: &str = ".relic";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    core: CoreSection,
    client: ClientSection,
    defaults: DefaultsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct CoreSection {
    server: String,
    timeout: u64,
    progress: bool,
}

impl Default for CoreSection {
    fn default() -> Self {
        CoreSection {
            server: DEFAULT_SERVER.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ClientSection {
    key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DefaultsSection {
    access_level: String,
    expires_in: String,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        DefaultsSection {
            access_level: DEFAULT_ACCESS_LEVEL.to_string(),
            expires_in: DEFAULT_EXPIRES_IN.to_string(),
        }
    }
}

/// Flattened view handed to the rest of the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub client_key: String,
    pub timeout_secs: u64,
    pub progress: bool,
    pub access_level: String,
    pub expires_in: String,
    dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from(config_dir()?)
    }

    /// Loads from an explicit directory. A missing file yields defaults.
    pub fn load_from(dir: PathBuf) -> Result<Self, CliError> {
        let path = dir.join(CONFIG_FILE_NAME);
        let file = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;
            toml::from_str::<ConfigFile>(&raw)
                .map_err(|e| CliError::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            ConfigFile::default()
        };

        let mut cfg = Config {
            server: file.core.server,
            client_key: file.client.key,
            timeout_secs: file.core.timeout,
            progress: file.core.progress,
            access_level: file.defaults.access_level,
            expires_in: file.defaults.expires_in,
            dir,
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("RELIC_SERVER") {
            if !v.is_empty() {
                self.server = v;
            }
        }
        if let Ok(v) = env::var("RELIC_CLIENT_KEY") {
            if !v.is_empty() {
                self.client_key = v;
            }
        }
        if let Ok(v) = env::var("RELIC_TIMEOUT") {
            if let Ok(secs) = v.parse() {
                self.timeout_secs = secs;
            }
        }
        if let Ok(v) = env::var("RELIC_PROGRESS") {
            if let Ok(on) = v.parse() {
                self.progress = on;
            }
        }
        if let Ok(v) = env::var("RELIC_ACCESS_LEVEL") {
            if !v.is_empty() {
                self.access_level = v;
            }
        }
        if let Ok(v) = env::var("RELIC_EXPIRES_IN") {
            if !v.is_empty() {
                self.expires_in = v;
            }
        }
    }

    /// Current value for a dotted config key (long or short form).
    pub fn get(&self, key: &str) -> Result<String, CliError> {
        match key {
            "core.server" | "server" => Ok(self.server.clone()),
            "client.key" | "key" => Ok(self.client_key.clone()),
            "core.timeout" | "timeout" => Ok(self.timeout_secs.to_string()),
            "core.progress" | "progress" => Ok(self.progress.to_string()),
            "defaults.access_level" | "access_level" => Ok(self.access_level.clone()),
            "defaults.expires_in" | "expires_in" => Ok(self.expires_in.clone()),
            _ => Err(CliError::Validation(format!("Unknown config key: {key}"))),
        }
    }

    /// Persists a single key to this config's file.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CliError> {
        set_in(&self.dir, key, value)
    }
}

/// Writes one key into the config file under `dir`, creating the file
/// if needed.
pub fn set_in(dir: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let mut file = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str::<ConfigFile>(&raw)
            .map_err(|e| CliError::Config(format!("failed to parse {}: {e}", path.display())))?
    } else {
        ConfigFile::default()
    };

    match key {
        "core.server" | "server" => file.core.server = value.to_string(),
        "client.key" | "key" => file.client.key = value.to_string(),
        "core.timeout" | "timeout" => {
            file.core.timeout = value
                .parse()
                .map_err(|_| CliError::Validation(format!("timeout must be a number: {value}")))?;
        }
        "core.progress" | "progress" => {
            file.core.progress = value
                .parse()
                .map_err(|_| CliError::Validation(format!("progress must be true or false: {value}")))?;
        }
        "defaults.access_level" | "access_level" => file.defaults.access_level = value.to_string(),
        "defaults.expires_in" | "expires_in" => file.defaults.expires_in = value.to_string(),
        _ => return Err(CliError::Validation(format!("Unknown config key: {key}"))),
    }

    write_config_file(dir, &file)
}

fn write_config_file(dir: &Path, file: &ConfigFile) -> Result<(), CliError> {
    fs::create_dir_all(dir)
        .map_err(|e| CliError::Config(format!("failed to create {}: {e}", dir.display())))?;
    restrict_dir_permissions(dir);

    let path = dir.join(CONFIG_FILE_NAME);
    let raw = toml::to_string_pretty(file)
        .map_err(|e| CliError::Config(format!("failed to encode config: {e}")))?;
    fs::write(&path, raw)
        .map_err(|e| CliError::Config(format!("failed to write {}: {e}", path.display())))?;
    restrict_file_permissions(&path);
    Ok(())
}

/// Creates a default config file; refuses to clobber an existing one.
pub fn init(dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(CliError::Validation(format!(
            "config file already exists at {}",
            path.display()
        )));
    }
    write_config_file(dir, &ConfigFile::default())?;
    Ok(path)
}

pub fn config_dir() -> Result<PathBuf, CliError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| CliError::Config("could not determine home directory".into()))
}

/// 16 random bytes, hex-encoded to 32 characters. Not a credential,
/// just an ownership tag the server associates relics with.
pub fn generate_client_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns true when a key was newly generated and persisted.
///
/// Known limitation: two first-run invocations can race on the config
/// file here; the last writer wins and the loser's relics end up under
/// a key that was never saved. Matches the original client's behavior.
pub fn ensure_client_key(cfg: &mut Config) -> Result<bool, CliError> {
    if !cfg.client_key.is_empty() {
        return Ok(false);
    }
    let key = generate_client_key();
    cfg.set("client.key", &key)?;
    cfg.client_key = key;
    Ok(true)
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) {}

#[cfg(unix)]
fn restrict_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_file_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = Config::load_from(dir.path().to_path_buf()).unwrap();
        assert_eq!(cfg.server, DEFAULT_SERVER);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(cfg.progress);
        assert_eq!(cfg.access_level, "private");
        assert_eq!(cfg.expires_in, "never");
        assert!(cfg.client_key.is_empty());
    }

    #[test]
    fn set_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        set_in(dir.path(), "core.server", "https://relics.example.com").unwrap();
        set_in(dir.path(), "defaults.access_level", "public").unwrap();
        set_in(dir.path(), "timeout", "60").unwrap();

        let cfg = Config::load_from(dir.path().to_path_buf()).unwrap();
        assert_eq!(cfg.server, "https://relics.example.com");
        assert_eq!(cfg.access_level, "public");
        assert_eq!(cfg.timeout_secs, 60);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.expires_in, "never");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempdir().unwrap();
        let err = set_in(dir.path(), "core.colour", "red").unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(set_in(dir.path(), "core.timeout", "soon").is_err());
    }

    #[test]
    fn client_key_is_32_hex_chars() {
        let key = generate_client_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_client_key());
    }

    #[test]
    fn ensure_client_key_generates_once() {
        let dir = tempdir().unwrap();
        let mut cfg = Config::load_from(dir.path().to_path_buf()).unwrap();

        assert!(ensure_client_key(&mut cfg).unwrap());
        let first = cfg.client_key.clone();
        assert_eq!(first.len(), 32);

        // Second call sees the persisted key and does not regenerate.
        let mut reloaded = Config::load_from(dir.path().to_path_buf()).unwrap();
        assert!(!ensure_client_key(&mut reloaded).unwrap());
        assert_eq!(reloaded.client_key, first);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();
        assert!(init(dir.path()).is_err());
    }
}
