//! Application configuration
//!
//! All paths and thresholds flow from a TOML file into the components at
//! construction; the core never reads the environment implicitly. A missing
//! config file is materialized with defaults so a fresh deployment has
//! something to edit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod defaults;

use defaults::*;

use crate::merge::MasterSource;
use crate::resolver::ResolverConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub epg: EpgConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub masters: Vec<MasterSourceConfig>,
    #[serde(default)]
    pub grabber: GrabberConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_m3u_dir")]
    pub m3u_dir: PathBuf,
    #[serde(default = "default_epg_dir")]
    pub epg_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_favourites")]
    pub favourites: PathBuf,
    #[serde(default = "default_aliases")]
    pub aliases: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Favourites-only playlist written by `prune` and consumed by `match`
    #[serde(default = "default_pruned_name")]
    pub pruned_name: String,
    /// Identifier-corrected playlist written by `match`
    #[serde(default = "default_matched_name")]
    pub matched_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Verdicts at or above this confidence are applied on rewrite
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,
    /// Minimum token-set Jaccard similarity for a name match
    #[serde(default = "default_jaccard_floor")]
    pub jaccard_floor: f64,
    #[serde(default = "default_true")]
    pub enable_suffix_swap: bool,
    #[serde(default = "default_true")]
    pub enable_slug_guess: bool,
    #[serde(default = "default_true")]
    pub restrict_by_country: bool,
}

/// How `match` builds the EPG keep-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneMode {
    /// Full identity resolution (primary mode)
    Resolver,
    /// Direct id/name intersection with a fuzzy name fallback
    Fuzzy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    /// Country codes whose guides participate in the catalog
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,
    /// Download URL template; `{country}`/`{COUNTRY}` expand to the code
    #[serde(default)]
    pub url_template: String,
    /// File name of the pruned, merged EPG document
    #[serde(default = "default_merged_name")]
    pub merged_name: String,
    #[serde(default = "default_prune_mode")]
    pub prune_mode: PruneMode,
    /// Acceptance threshold for the fuzzy prune mode
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Append master channels unknown to the favourites set as new rows
    #[serde(default = "default_true")]
    pub append_new_channels: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterSourceConfig {
    pub label: String,
    pub path: PathBuf,
    /// Lower is preferred
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrabberConfig {
    #[serde(default = "default_grabber_command")]
    pub command: String,
    #[serde(default = "default_grabber_days")]
    pub days: u32,
    #[serde(default = "default_grabber_timeout_secs")]
    pub timeout_secs: u64,
    /// Substring identifying declared ids that are already station ids
    #[serde(default = "default_station_id_marker")]
    pub station_id_marker: String,
    #[serde(default = "default_grabber_output_name")]
    pub output_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_match_report")]
    pub match_report: String,
    #[serde(default = "default_unmatched_report")]
    pub unmatched_report: String,
    #[serde(default = "default_prune_report")]
    pub prune_report: String,
    #[serde(default = "default_sources_report")]
    pub sources_report: String,
    #[serde(default = "default_coverage_report")]
    pub coverage_report: String,
    #[serde(default = "default_station_list")]
    pub station_list: String,
    #[serde(default = "default_fuzzy_report")]
    pub fuzzy_report: String,
    #[serde(default = "default_cc_map")]
    pub cc_map: String,
}

fn default_m3u_dir() -> PathBuf {
    PathBuf::from(DEFAULT_M3U_DIR)
}
fn default_epg_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EPG_DIR)
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}
fn default_favourites() -> PathBuf {
    PathBuf::from(DEFAULT_FAVOURITES)
}
fn default_aliases() -> PathBuf {
    PathBuf::from(DEFAULT_ALIASES)
}
fn default_pruned_name() -> String {
    DEFAULT_PRUNED_NAME.to_string()
}
fn default_matched_name() -> String {
    DEFAULT_MATCHED_NAME.to_string()
}
fn default_accept_threshold() -> f64 {
    DEFAULT_ACCEPT_THRESHOLD
}
fn default_jaccard_floor() -> f64 {
    DEFAULT_JACCARD_FLOOR
}
fn default_true() -> bool {
    true
}
fn default_countries() -> Vec<String> {
    DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect()
}
fn default_merged_name() -> String {
    DEFAULT_MERGED_EPG_NAME.to_string()
}
fn default_prune_mode() -> PruneMode {
    PruneMode::Resolver
}
fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_grabber_command() -> String {
    DEFAULT_GRABBER_COMMAND.to_string()
}
fn default_grabber_days() -> u32 {
    DEFAULT_GRABBER_DAYS
}
fn default_grabber_timeout_secs() -> u64 {
    DEFAULT_GRABBER_TIMEOUT_SECS
}
fn default_station_id_marker() -> String {
    DEFAULT_STATION_ID_MARKER.to_string()
}
fn default_grabber_output_name() -> String {
    DEFAULT_GRABBER_OUTPUT_NAME.to_string()
}
fn default_match_report() -> String {
    DEFAULT_MATCH_REPORT.to_string()
}
fn default_unmatched_report() -> String {
    DEFAULT_UNMATCHED_REPORT.to_string()
}
fn default_prune_report() -> String {
    DEFAULT_PRUNE_REPORT.to_string()
}
fn default_sources_report() -> String {
    DEFAULT_SOURCES_REPORT.to_string()
}
fn default_coverage_report() -> String {
    DEFAULT_COVERAGE_REPORT.to_string()
}
fn default_station_list() -> String {
    DEFAULT_STATION_LIST.to_string()
}
fn default_fuzzy_report() -> String {
    DEFAULT_FUZZY_REPORT.to_string()
}
fn default_cc_map() -> String {
    DEFAULT_CC_MAP.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            m3u_dir: default_m3u_dir(),
            epg_dir: default_epg_dir(),
            log_dir: default_log_dir(),
            favourites: default_favourites(),
            aliases: default_aliases(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            pruned_name: default_pruned_name(),
            matched_name: default_matched_name(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            jaccard_floor: default_jaccard_floor(),
            enable_suffix_swap: true,
            enable_slug_guess: true,
            restrict_by_country: true,
        }
    }
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            countries: default_countries(),
            url_template: String::new(),
            merged_name: default_merged_name(),
            prune_mode: default_prune_mode(),
            fuzzy_threshold: default_fuzzy_threshold(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            append_new_channels: true,
        }
    }
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            command: default_grabber_command(),
            days: default_grabber_days(),
            timeout_secs: default_grabber_timeout_secs(),
            station_id_marker: default_station_id_marker(),
            output_name: default_grabber_output_name(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            match_report: default_match_report(),
            unmatched_report: default_unmatched_report(),
            prune_report: default_prune_report(),
            sources_report: default_sources_report(),
            coverage_report: default_coverage_report(),
            station_list: default_station_list(),
            fuzzy_report: default_fuzzy_report(),
            cc_map: default_cc_map(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.matching.accept_threshold;
        if !(MIN_ACCEPT_THRESHOLD..=1.0).contains(&threshold) {
            anyhow::bail!(
                "matching.accept_threshold must be within [{MIN_ACCEPT_THRESHOLD}, 1.0], got {threshold}"
            );
        }
        if !(0.0..=1.0).contains(&self.matching.jaccard_floor) {
            anyhow::bail!(
                "matching.jaccard_floor must be within [0.0, 1.0], got {}",
                self.matching.jaccard_floor
            );
        }
        Ok(())
    }

    /// Resolver settings derived from the matching section.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            accept_threshold: self.matching.accept_threshold,
            jaccard_floor: self.matching.jaccard_floor,
            enable_suffix_swap: self.matching.enable_suffix_swap,
            enable_slug_guess: self.matching.enable_slug_guess,
            restrict_by_country: self.matching.restrict_by_country,
        }
    }

    /// Master sources in declaration order.
    pub fn master_sources(&self) -> Vec<MasterSource> {
        self.masters
            .iter()
            .map(|m| MasterSource {
                label: m.label.clone(),
                path: m.path.clone(),
                priority: m.priority,
            })
            .collect()
    }

    /// On-disk paths of the per-country EPG documents.
    pub fn epg_document_paths(&self) -> Vec<PathBuf> {
        self.epg
            .countries
            .iter()
            .map(|c| self.paths.epg_dir.join(crate::fetch::epg_file_name(c)))
            .collect()
    }

    pub fn pruned_playlist_path(&self) -> PathBuf {
        self.paths.m3u_dir.join(&self.playlist.pruned_name)
    }

    pub fn matched_playlist_path(&self) -> PathBuf {
        self.paths.m3u_dir.join(&self.playlist.matched_name)
    }

    pub fn merged_epg_path(&self) -> PathBuf {
        self.paths.epg_dir.join(&self.epg.merged_name)
    }

    pub fn grabber_output_path(&self) -> PathBuf {
        self.paths.epg_dir.join(&self.grabber.output_name)
    }

    pub fn report_path(&self, name: &str) -> PathBuf {
        self.paths.log_dir.join(name)
    }

    pub fn cc_map_path(&self) -> PathBuf {
        self.paths.m3u_dir.join(&self.reports.cc_map)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.epg.http_timeout_secs)
    }

    pub fn grabber_timeout(&self) -> Duration {
        Duration::from_secs(self.grabber.timeout_secs)
    }
}
