// `droppy update`: install the newest published release with cargo.

use std::future::Future;

use anyhow::{bail, Context, Result};
use semver::{BuildMetadata, Version};
use serde::Deserialize;
use tracing::{debug, info};

use crate::cli::{RuntimeConfig, VERSION};

const PACKAGE_NAME: &str = "droppy-cli";
const REGISTRY_API: &str = "https://crates.io/api/v1/crates";

/// Where releases are published and how they get installed.
pub trait ReleaseSource {
    fn latest_version(&self, package: &str) -> impl Future<Output = Result<String>>;
    fn install(&self, package: &str, version: &str) -> impl Future<Output = Result<()>>;
}

/// crates.io for lookups, `cargo install` for installs.
pub struct CratesIo {
    client: reqwest::Client,
}

impl CratesIo {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("droppy/{VERSION}"))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_version: String,
}

fn parse_max_version(body: &str) -> Result<String> {
    let response: CrateResponse =
        serde_json::from_str(body).context("unexpected registry response")?;
    Ok(response.krate.max_version)
}

impl ReleaseSource for CratesIo {
    async fn latest_version(&self, package: &str) -> Result<String> {
        let url = format!("{REGISTRY_API}/{package}");
        debug!(url = %url, "querying registry");
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to query `{url}`"))?
            .text()
            .await
            .context("failed to read registry response")?;
        parse_max_version(&body)
    }

    async fn install(&self, package: &str, version: &str) -> Result<()> {
        info!(package, version, "running cargo install");
        let status = tokio::process::Command::new("cargo")
            .args(["install", package, "--version", version, "--force"])
            .status()
            .await
            .context("failed to run cargo")?;
        if !status.success() {
            bail!("cargo install exited with {status}");
        }
        Ok(())
    }
}

pub async fn run(_config: &RuntimeConfig) -> Result<()> {
    let source = CratesIo::new()?;
    let message = self_update(&source, PACKAGE_NAME, VERSION).await?;
    println!("{message}");
    Ok(())
}

/// Install `package` if the source has a newer release than `current`.
/// Always yields a message for the user.
pub async fn self_update<S: ReleaseSource>(source: &S, package: &str, current: &str) -> Result<String> {
    let latest = source.latest_version(package).await?;
    if !is_newer(&latest, current)? {
        return Ok(format!("droppy is up to date ({current})"));
    }

    source
        .install(package, &latest)
        .await
        .with_context(|| format!("failed to install {package} {latest}"))?;
    Ok(format!("Updated droppy from {current} to {latest}"))
}

/// Semver precedence: pre-releases sort below their release, build metadata
/// is ignored.
fn is_newer(latest: &str, current: &str) -> Result<bool> {
    let latest = parse_version(latest)
        .with_context(|| format!("registry returned an invalid version `{latest}`"))?;
    let current =
        parse_version(current).with_context(|| format!("invalid current version `{current}`"))?;
    Ok(latest > current)
}

fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let mut version = Version::parse(raw.trim())?;
    version.build = BuildMetadata::EMPTY;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeSource {
        latest: &'static str,
        fail_install: bool,
        installed: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(latest: &'static str) -> Self {
            Self { latest, fail_install: false, installed: Mutex::new(Vec::new()) }
        }
    }

    impl ReleaseSource for FakeSource {
        async fn latest_version(&self, _package: &str) -> Result<String> {
            Ok(self.latest.to_owned())
        }

        async fn install(&self, package: &str, version: &str) -> Result<()> {
            if self.fail_install {
                bail!("cargo install exited with exit status: 101");
            }
            self.installed.lock().unwrap().push(format!("{package}@{version}"));
            Ok(())
        }
    }

    #[test]
    fn version_ordering() {
        assert!(is_newer("1.2.0", "1.1.9").unwrap());
        assert!(is_newer("1.10.0", "1.9.0").unwrap());
        assert!(is_newer("1.0.0", "1.0.0-beta.2").unwrap());
        assert!(!is_newer("1.0.0", "1.0.0").unwrap());
        assert!(!is_newer("0.9.9", "1.0.0").unwrap());
        assert!(!is_newer("1.0.0-rc.1", "1.0.0").unwrap());
        assert!(is_newer("1.0.0-rc.2", "1.0.0-rc.1").unwrap());
        assert!(is_newer("1.0.0-rc.1", "1.0.0-beta.9").unwrap());
        assert!(!is_newer("1.0.0-rc.1", "1.0.0-rc.2").unwrap());
        assert!(!is_newer("1.0.0+build.5", "1.0.0").unwrap());
    }

    #[test]
    fn invalid_versions_are_errors() {
        assert!(is_newer("latest", "1.0.0").is_err());
        assert!(is_newer("1.0", "1.0.0").is_err());
        assert!(is_newer("1.0.0.1", "1.0.0").is_err());
    }

    #[test]
    fn registry_body_parsing() {
        let body = r#"{"crate":{"id":"droppy-cli","max_version":"0.4.2"},"versions":[]}"#;
        assert_eq!(parse_max_version(body).unwrap(), "0.4.2");
        assert!(parse_max_version(r#"{"errors":[{"detail":"Not Found"}]}"#).is_err());
    }

    #[tokio::test]
    async fn up_to_date_installs_nothing() {
        let source = FakeSource::new("0.1.0");
        let message = self_update(&source, "droppy-cli", "0.1.0").await.unwrap();
        assert_eq!(message, "droppy is up to date (0.1.0)");
        assert!(source.installed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn newer_release_is_installed() {
        let source = FakeSource::new("0.2.0");
        let message = self_update(&source, "droppy-cli", "0.1.0").await.unwrap();
        assert_eq!(message, "Updated droppy from 0.1.0 to 0.2.0");
        assert_eq!(*source.installed.lock().unwrap(), ["droppy-cli@0.2.0"]);
    }

    #[tokio::test]
    async fn install_failure_is_reported() {
        let mut source = FakeSource::new("0.2.0");
        source.fail_install = true;
        let err = self_update(&source, "droppy-cli", "0.1.0").await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to install droppy-cli 0.2.0"));
    }
}
