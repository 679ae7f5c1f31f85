// Server configuration file: `<config_dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::{ensure_owner_only_dir, write_private_atomic};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8989;

/// Settings read by the HTTP server on startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Addresses the server binds to. Every entry gets its own listener.
    pub listeners: Vec<Listener>,
    /// Allow the UI to be embedded in frames on other origins.
    pub allow_frame: bool,
    /// Include modification times in directory listings.
    pub timestamps: bool,
    /// Path components or `*.ext` globs hidden from listings and downloads.
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listeners: vec![Listener::default()],
            allow_frame: false,
            timestamps: true,
            ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.into(), port: DEFAULT_PORT }
    }
}

impl Listener {
    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Config {
    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Save to a specific path (creates parent directories).
    ///
    /// A parent directory created here is restricted to the owner; an
    /// existing one keeps its permissions.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        let new_parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty() && !parent.exists())
            .map(Path::to_path_buf);

        write_private_atomic(path, contents.as_bytes())
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        if let Some(parent) = new_parent {
            ensure_owner_only_dir(&parent)
                .map_err(|source| ConfigError::Io { path: parent.clone(), source })?;
        }
        Ok(())
    }

    /// Write the default configuration to `path` and return it.
    pub fn init_default(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Load `path`, writing defaults first when the file does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Self::init_default(path)
            }
            other => other,
        }
    }

    /// True when `name` matches one of the ignore patterns.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| pattern_matches(pattern, name))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(suffix), _) => name.ends_with(suffix),
        (None, Some(prefix)) => name.starts_with(prefix),
        (None, None) => name == pattern,
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error in `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config serialize error: {0}")]
    Serialize(#[source] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listeners, vec![Listener { host: "0.0.0.0".into(), port: 8989 }]);
        assert!(!cfg.allow_frame);
        assert!(cfg.timestamps);
        assert!(cfg.ignore_patterns.is_empty());
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config {
            listeners: vec![
                Listener { host: "127.0.0.1".into(), port: 9000 },
                Listener { host: "::1".into(), port: 9001 },
            ],
            allow_frame: true,
            timestamps: false,
            ignore_patterns: vec![".git".into(), "*.tmp".into()],
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str("allow_frame = true\n").unwrap();
        assert!(cfg.allow_frame);
        assert_eq!(cfg.listeners, Config::default().listeners);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = toml::from_str::<Config>("listen_port = 80\n").expect_err("parse should fail");
        assert!(err.to_string().contains("unknown field `listen_port`"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn init_default_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("config").join("config.toml");

        let cfg = Config::init_default(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn save_to_only_restricts_directories_it_creates() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("shared");
        std::fs::create_dir(&existing).unwrap();
        std::fs::set_permissions(&existing, std::fs::Permissions::from_mode(0o755)).unwrap();
        Config::default().save_to(&existing.join("config.toml")).unwrap();
        let mode = std::fs::metadata(&existing).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);

        let fresh = dir.path().join("fresh");
        Config::default().save_to(&fresh.join("config.toml")).unwrap();
        let mode = std::fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn load_or_init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let first = Config::load_or_init(&path).unwrap();
        assert!(path.exists());

        let mut edited = first.clone();
        edited.allow_frame = true;
        edited.save_to(&path).unwrap();

        assert_eq!(Config::load_or_init(&path).unwrap(), edited);
    }

    #[test]
    fn load_or_init_surfaces_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listeners = 3").unwrap();

        assert!(matches!(Config::load_or_init(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn listener_address_brackets_ipv6() {
        assert_eq!(Listener { host: "::".into(), port: 80 }.address(), "[::]:80");
        assert_eq!(Listener { host: "localhost".into(), port: 80 }.address(), "localhost:80");
    }

    #[test]
    fn ignore_patterns_match_names_and_globs() {
        let cfg = Config {
            ignore_patterns: vec![".git".into(), "*.tmp".into(), "~*".into()],
            ..Config::default()
        };
        assert!(cfg.is_ignored(".git"));
        assert!(cfg.is_ignored("upload.tmp"));
        assert!(cfg.is_ignored("~lock"));
        assert!(!cfg.is_ignored("notes.txt"));
        assert!(!cfg.is_ignored(".github"));
    }
}
