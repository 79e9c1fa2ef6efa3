//! EPG source download
//!
//! Fetches per-country XMLTV documents over HTTP. Downloads are normalized
//! to the on-disk form the pipeline expects: gzip-compressed when the target
//! name ends in `.gz`, plain otherwise, regardless of how the server
//! delivered them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::utils::{CompressionFormat, DecompressionService};

/// HTTP fetcher for EPG sources
pub struct EpgFetcher {
    client: reqwest::Client,
}

impl EpgFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Expand the URL template for one country code.
    ///
    /// `{country}` expands to the lowercased code, `{COUNTRY}` to the
    /// uppercased one.
    pub fn url_for(template: &str, country: &str) -> String {
        template
            .replace("{country}", &country.to_lowercase())
            .replace("{COUNTRY}", &country.to_uppercase())
    }

    /// Download one country's EPG document to `target`.
    ///
    /// A fetch failure is propagated; the run never fabricates a
    /// placeholder document.
    pub async fn fetch_country(
        &self,
        template: &str,
        country: &str,
        target: &Path,
    ) -> AppResult<()> {
        let url = Self::url_for(template, country);
        debug!("Fetching EPG for {country} from {url}");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes for {country}", bytes.len());

        let want_gzip = target.extension().is_some_and(|ext| ext == "gz");
        let is_gzip = DecompressionService::detect_compression_format(&bytes)
            == CompressionFormat::Gzip;

        let payload: Vec<u8> = match (want_gzip, is_gzip) {
            (true, true) | (false, false) => bytes.to_vec(),
            (true, false) => DecompressionService::compress_gzip(&bytes)
                .map_err(|e| AppError::configuration(format!("gzip of {country} failed: {e}")))?,
            (false, true) => DecompressionService::decompress(bytes)
                .map_err(|e| AppError::configuration(format!("gunzip of {country} failed: {e}")))?,
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, payload)?;
        info!("Wrote EPG for {country} to {}", target.display());
        Ok(())
    }

    /// Download every configured country, in order.
    ///
    /// An empty country list is a fatal, explicit abort: it would otherwise
    /// silently produce an empty catalog downstream.
    pub async fn fetch_all(
        &self,
        template: &str,
        countries: &[String],
        epg_dir: &Path,
    ) -> AppResult<Vec<PathBuf>> {
        if countries.is_empty() {
            return Err(AppError::empty_result(
                "no country codes configured; refusing to fetch nothing",
            ));
        }

        let mut written = Vec::with_capacity(countries.len());
        for country in countries {
            let target = epg_dir.join(epg_file_name(country));
            self.fetch_country(template, country, &target).await?;
            written.push(target);
        }
        Ok(written)
    }
}

/// Canonical on-disk name for a country's EPG document.
pub fn epg_file_name(country: &str) -> String {
    format!("epg_{}.xml.gz", country.to_uppercase())
}
