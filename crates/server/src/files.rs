// Read-only view of the files directory: request path validation and listings.

use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use droppy_common::config::Config;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// `.`/`..` components or an absolute path.
    Traversal,
    NullByte,
    /// A component matches one of the configured ignore patterns.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<Entry>,
}

/// Map a decoded request path onto `root`.
///
/// Separators are normalised to `/` and empty segments collapsed; anything
/// that could step outside `root` is rejected rather than cleaned.
pub fn resolve(root: &Path, raw: &str, config: &Config) -> Result<PathBuf, PathRejection> {
    if raw.contains('\0') {
        return Err(PathRejection::NullByte);
    }

    let unified = raw.replace('\\', "/");
    let mut resolved = root.to_path_buf();
    for segment in unified.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(PathRejection::Traversal),
        }
        if config.is_ignored(segment) {
            return Err(PathRejection::Ignored);
        }
        resolved.push(segment);
    }
    Ok(resolved)
}

/// List `dir`, directories first then files, each group sorted by name.
/// Ignored entries are omitted.
pub async fn list(dir: &Path, rel: &str, config: &Config) -> io::Result<Listing> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if config.is_ignored(&name) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            // Entry vanished between readdir and stat.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        let kind = if metadata.is_dir() { EntryKind::Dir } else { EntryKind::File };
        let size = if metadata.is_dir() { 0 } else { metadata.len() };
        let modified = if config.timestamps {
            metadata.modified().ok().map(DateTime::<Utc>::from)
        } else {
            None
        };
        entries.push(Entry { name, kind, size, modified });
    }

    entries.sort_by(|a, b| {
        (a.kind != EntryKind::Dir, &a.name).cmp(&(b.kind != EntryKind::Dir, &b.name))
    });

    let path = rel.trim_matches('/').to_owned();
    Ok(Listing { path, entries })
}
