// Directory layout: config dir (config.toml, db.json, cache/) and files dir.
//
// Defaults live under `~/.droppy/`. Overrides may be relative (resolved
// against the working directory) or start with `~/`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application directory under the user's home.
pub const APP_DIR_NAME: &str = ".droppy";

const CONFIG_DIR_NAME: &str = "config";
const FILES_DIR_NAME: &str = "files";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "db.json";
const CACHE_DIR_NAME: &str = "cache";
const RESOURCES_CACHE_NAME: &str = "resources.json";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Resolved, absolute locations of everything droppy reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub files_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: impl Into<PathBuf>, files_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into(), files_dir: files_dir.into() }
    }

    /// Resolve the layout from optional CLI overrides.
    pub fn resolve(config_dir: Option<&Path>, files_dir: Option<&Path>) -> Result<Self, PathsError> {
        let cwd = std::env::current_dir().map_err(PathsError::CurrentDir)?;
        Self::resolve_from(dirs::home_dir(), &cwd, config_dir, files_dir)
    }

    /// Testable variant with explicit home and working directories.
    pub fn resolve_from(
        home: Option<PathBuf>,
        cwd: &Path,
        config_dir: Option<&Path>,
        files_dir: Option<&Path>,
    ) -> Result<Self, PathsError> {
        let home = home.as_deref();
        let app_dir = || home.map(|h| h.join(APP_DIR_NAME)).ok_or(PathsError::NoHome);

        let config_dir = match config_dir {
            Some(dir) => absolutize(dir, home, cwd)?,
            None => app_dir()?.join(CONFIG_DIR_NAME),
        };
        let files_dir = match files_dir {
            Some(dir) => absolutize(dir, home, cwd)?,
            None => app_dir()?.join(FILES_DIR_NAME),
        };

        Ok(Self { config_dir, files_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn db_file(&self) -> PathBuf {
        self.config_dir.join(DB_FILE_NAME)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config_dir.join(CACHE_DIR_NAME)
    }

    pub fn resources_cache(&self) -> PathBuf {
        self.cache_dir().join(RESOURCES_CACHE_NAME)
    }
}

fn absolutize(path: &Path, home: Option<&Path>, cwd: &Path) -> Result<PathBuf, PathsError> {
    if let Ok(rest) = path.strip_prefix("~") {
        let home = home.ok_or(PathsError::NoHome)?;
        return Ok(home.join(rest));
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> Option<PathBuf> {
        Some(PathBuf::from("/home/alice"))
    }

    #[test]
    fn defaults_live_under_home() {
        let paths = Paths::resolve_from(home(), Path::new("/srv"), None, None).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/alice/.droppy/config"));
        assert_eq!(paths.files_dir, PathBuf::from("/home/alice/.droppy/files"));
    }

    #[test]
    fn derived_files_are_inside_config_dir() {
        let paths = Paths::new("/etc/droppy", "/srv/files");
        assert_eq!(paths.config_file(), PathBuf::from("/etc/droppy/config.toml"));
        assert_eq!(paths.db_file(), PathBuf::from("/etc/droppy/db.json"));
        assert_eq!(paths.resources_cache(), PathBuf::from("/etc/droppy/cache/resources.json"));
    }

    #[test]
    fn relative_overrides_resolve_against_cwd() {
        let paths = Paths::resolve_from(
            home(),
            Path::new("/srv"),
            Some(Path::new("conf")),
            Some(Path::new("./data")),
        )
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/srv/conf"));
        assert_eq!(paths.files_dir, PathBuf::from("/srv/./data"));
    }

    #[test]
    fn tilde_overrides_expand_home() {
        let paths =
            Paths::resolve_from(home(), Path::new("/srv"), Some(Path::new("~/droppy")), None)
                .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/alice/droppy"));
    }

    #[test]
    fn explicit_overrides_do_not_need_home() {
        let paths = Paths::resolve_from(
            None,
            Path::new("/srv"),
            Some(Path::new("/etc/droppy")),
            Some(Path::new("/srv/files")),
        )
        .unwrap();
        assert_eq!(paths, Paths::new("/etc/droppy", "/srv/files"));
    }

    #[test]
    fn missing_home_is_an_error_for_defaults() {
        let err = Paths::resolve_from(None, Path::new("/srv"), None, None).unwrap_err();
        assert!(matches!(err, PathsError::NoHome));
    }
}
