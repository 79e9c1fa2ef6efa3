//! Default configuration values

pub const DEFAULT_M3U_DIR: &str = "m3u";
pub const DEFAULT_EPG_DIR: &str = "epg";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_FAVOURITES: &str = "tv_favourites.csv";
pub const DEFAULT_ALIASES: &str = "epg_aliases.csv";

pub const DEFAULT_PRUNED_NAME: &str = "pruned_tv.m3u";
pub const DEFAULT_MATCHED_NAME: &str = "pruned_tv_matched.m3u";

pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.90;
/// Secondary guide deployments may lower the threshold, but never below
/// this.
pub const MIN_ACCEPT_THRESHOLD: f64 = 0.60;
pub const DEFAULT_JACCARD_FLOOR: f64 = 0.60;

pub const DEFAULT_COUNTRIES: &[&str] = &["GB", "US", "CA", "DE"];
pub const DEFAULT_MERGED_EPG_NAME: &str = "merged_matched_epg.xml.gz";
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.86;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_GRABBER_COMMAND: &str = "tv_grab_zz_sdjson";
pub const DEFAULT_GRABBER_DAYS: u32 = 7;
pub const DEFAULT_GRABBER_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_STATION_ID_MARKER: &str = "schedulesdirect";
pub const DEFAULT_GRABBER_OUTPUT_NAME: &str = "epg_sd_matched.xml.gz";

pub const DEFAULT_MATCH_REPORT: &str = "m3u_epg_match_report.csv";
pub const DEFAULT_UNMATCHED_REPORT: &str = "m3u_epg_unmatched.csv";
pub const DEFAULT_PRUNE_REPORT: &str = "prune_report.csv";
pub const DEFAULT_SOURCES_REPORT: &str = "pruned_sources.csv";
pub const DEFAULT_COVERAGE_REPORT: &str = "station_coverage.csv";
pub const DEFAULT_STATION_LIST: &str = "station_ids.txt";
pub const DEFAULT_FUZZY_REPORT: &str = "epg_match_report.csv";
pub const DEFAULT_CC_MAP: &str = "channel_cc_map.json";
