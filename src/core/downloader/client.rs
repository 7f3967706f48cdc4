use std::path::Path;

use reqwest::Client;
use tracing::debug;

use super::hash::{sha1_hex, verify_bytes, ExpectedHashes};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{EventBus, LauncherEvent};
use crate::core::fs::write_atomic;

/// Hash-validated HTTP downloader.
pub struct Downloader {
    client: Client,
    /// Optional bus for emitting progress events.
    events: Option<EventBus>,
}

impl Downloader {
    pub fn new(client: Client, events: Option<EventBus>) -> Self {
        Self { client, events }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── In-memory fetch ─────────────────────────────────

    /// GET `url` into memory. Any non-2xx status is an error.
    pub async fn fetch_bytes(&self, url: &str) -> LauncherResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let bytes = response.bytes().await?.to_vec();

        if let Some(events) = &self.events {
            let file_name = url.rsplit('/').next().unwrap_or_default().to_string();
            events.publish(LauncherEvent::DownloadProgress {
                url: url.to_string(),
                file_name,
                bytes_downloaded: bytes.len() as u64,
                total_bytes,
            });
        }

        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }

    /// Fetch and verify against whatever hashes are known.
    pub async fn fetch_verified(
        &self,
        url: &str,
        expected: &ExpectedHashes<'_>,
    ) -> LauncherResult<Vec<u8>> {
        let bytes = self.fetch_bytes(url).await?;
        verify_bytes(&bytes, expected, url)?;
        Ok(bytes)
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// The hash is checked on the in-memory buffer before anything touches
    /// the disk, so a mismatch never leaves a partial file behind.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        let bytes = self.fetch_bytes(url).await?;

        if let Some(expected) = sha1_expected {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::HashMismatch {
                    subject: dest.display().to_string(),
                    algorithm: "SHA-1",
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        write_atomic(dest, &bytes).await?;
        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }
}
