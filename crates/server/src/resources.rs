// Client resources: embedded assets bundled into `<config_dir>/cache/resources.json`.
//
// Production bundles strip comments and indentation; dev bundles keep the
// sources verbatim and are never written to the cache.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use droppy_common::fs::write_private_atomic;
use droppy_common::paths::Paths;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Bundle format version; bumped whenever embedded assets change shape.
const BUNDLE_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+1");

struct Asset {
    name: &'static str,
    mime: &'static str,
    kind: AssetKind,
    source: &'static str,
}

#[derive(Clone, Copy)]
enum AssetKind {
    Html,
    Css,
    Js,
}

const ASSETS: &[Asset] = &[
    Asset {
        name: "index.html",
        mime: "text/html; charset=utf-8",
        kind: AssetKind::Html,
        source: include_str!("../client/index.html"),
    },
    Asset {
        name: "style.css",
        mime: "text/css; charset=utf-8",
        kind: AssetKind::Css,
        source: include_str!("../client/style.css"),
    },
    Asset {
        name: "client.js",
        mime: "text/javascript; charset=utf-8",
        kind: AssetKind::Js,
        source: include_str!("../client/client.js"),
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub mime: String,
    /// Base64 SHA-256 of `content`, used as a strong ETag.
    pub etag: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub version: String,
    pub files: Vec<Resource>,
}

impl Bundle {
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.files.iter().find(|r| r.name == name)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|r| r.content.len()).sum()
    }
}

/// Outcome of `droppy build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub files: usize,
    pub bytes: usize,
    pub path: PathBuf,
}

/// Bundle the embedded assets in memory.
pub fn compile(minify: bool) -> Bundle {
    let files = ASSETS
        .iter()
        .map(|asset| {
            let content = if minify {
                minify_source(asset.kind, asset.source)
            } else {
                asset.source.to_owned()
            };
            Resource {
                name: asset.name.to_owned(),
                mime: asset.mime.to_owned(),
                etag: etag(&content),
                content,
            }
        })
        .collect();
    Bundle { version: BUNDLE_VERSION.to_owned(), files }
}

/// Rebuild the production bundle and write it to the cache.
pub fn build(paths: &Paths) -> Result<BuildReport> {
    let bundle = compile(true);
    let path = paths.resources_cache();
    write_cache(&path, &bundle)?;
    info!(path = %path.display(), files = bundle.files.len(), "resources built");
    Ok(BuildReport { files: bundle.files.len(), bytes: bundle.total_bytes(), path })
}

/// Load the bundle for serving. Dev mode always compiles fresh sources.
/// Production reads the cache and rebuilds it when missing or stale.
pub fn load(paths: &Paths, dev: bool) -> Bundle {
    if dev {
        debug!("dev mode: compiling unminified resources");
        return compile(false);
    }

    let path = paths.resources_cache();
    match read_cache(&path) {
        Ok(Some(bundle)) if bundle.version == BUNDLE_VERSION => return bundle,
        Ok(Some(bundle)) => {
            info!(cached = %bundle.version, current = BUNDLE_VERSION, "resource cache is stale");
        }
        Ok(None) => debug!(path = %path.display(), "no resource cache"),
        Err(error) => warn!(error = %format!("{error:#}"), "ignoring unreadable resource cache"),
    }

    let bundle = compile(true);
    if let Err(error) = write_cache(&path, &bundle) {
        warn!(error = %format!("{error:#}"), "serving resources without a cache");
    }
    bundle
}

fn read_cache(path: &Path) -> Result<Option<Bundle>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read `{}`", path.display()));
        }
    };
    let bundle = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to decode resource cache `{}`", path.display()))?;
    Ok(Some(bundle))
}

fn write_cache(path: &Path, bundle: &Bundle) -> Result<()> {
    let contents = serde_json::to_vec(bundle).context("failed to encode resource bundle")?;
    write_private_atomic(path, &contents)
        .with_context(|| format!("failed to write resource cache `{}`", path.display()))
}

fn etag(content: &str) -> String {
    STANDARD_NO_PAD.encode(Sha256::digest(content.as_bytes()))
}

fn minify_source(kind: AssetKind, source: &str) -> String {
    let stripped = match kind {
        AssetKind::Css => strip_block_comments(source),
        AssetKind::Html | AssetKind::Js => source.to_owned(),
    };

    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !matches!(kind, AssetKind::Js) || !line.starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_block_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
