//! WA Web protocol version discovery.
//!
//! The library publishes its current protocol version as a small JSON
//! manifest; we fetch it per connect and fall back to a pinned version when
//! the manifest is unreachable, the same way the upstream helper does.

use serde::Deserialize;
use tracing::{debug, warn};

use wabot_core::ports::WaVersion;

/// Pinned version used when the manifest cannot be fetched.
pub const FALLBACK_VERSION: WaVersion = WaVersion(2, 3000, 1015901307);

const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/WhiskeySockets/Baileys/master/src/Defaults/baileys-version.json";

#[derive(Debug, Deserialize)]
struct VersionManifest {
    version: [u32; 3],
}

impl From<VersionManifest> for WaVersion {
    fn from(m: VersionManifest) -> Self {
        WaVersion(m.version[0], m.version[1], m.version[2])
    }
}

/// Latest published protocol version, or the pinned fallback.
pub async fn fetch_latest(http: &reqwest::Client, url_override: Option<&str>) -> WaVersion {
    let url = url_override.unwrap_or(DEFAULT_MANIFEST_URL);
    match try_fetch(http, url).await {
        Ok(version) => {
            debug!(version = %version, "fetched latest protocol version");
            version
        }
        Err(e) => {
            warn!(error = %e, "version fetch failed, using pinned fallback");
            FALLBACK_VERSION
        }
    }
}

async fn try_fetch(http: &reqwest::Client, url: &str) -> Result<WaVersion, reqwest::Error> {
    let manifest: VersionManifest = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(manifest.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_into_a_version_triple() {
        let manifest: VersionManifest =
            serde_json::from_str(r#"{"version":[2,3000,1023223821]}"#).unwrap();
        let version: WaVersion = manifest.into();
        assert_eq!(version, WaVersion(2, 3000, 1023223821));
        assert_eq!(version.to_string(), "2.3000.1023223821");
    }
}
