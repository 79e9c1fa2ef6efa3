use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_reconcile::{
    aliases::AliasTable,
    config::{Config, PruneMode},
    epg::{xmltv, ChannelCatalog},
    errors::AppError,
    favourites,
    fetch::EpgFetcher,
    grabber,
    merge::{self, MasterIndex},
    output,
    playlist,
    resolver::ChannelResolver,
};

#[derive(Parser)]
#[command(name = "epg-reconcile")]
#[command(version)]
#[command(about = "Favourites-driven M3U playlist pruning and XMLTV EPG reconciliation")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prune the favourites table into a playlist, enriched from masters
    Prune,
    /// Match playlist identifiers against the EPG catalog and prune the EPG
    Match,
    /// Download the configured per-country EPG documents
    Fetch,
    /// Run the external schedule grabber limited to favourite stations
    Grab {
        /// Number of days to fetch (overrides configuration)
        #[arg(long)]
        days: Option<u32>,
        /// Only resolve and print station ids; do not invoke the grabber
        #[arg(long)]
        dry_run: bool,
    },
    /// Attribute each pruned playlist entry to its master source
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("epg_reconcile={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting epg-reconcile v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    match cli.command {
        Commands::Prune => run_prune(&config),
        Commands::Match => run_match(&config),
        Commands::Fetch => run_fetch(&config).await,
        Commands::Grab { days, dry_run } => run_grab(&config, days, dry_run).await,
        Commands::Sources => run_sources(&config),
    }
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Favourites -> pruned playlist, country map and prune report.
fn run_prune(config: &Config) -> Result<()> {
    let rows = favourites::load_favourites(&config.paths.favourites)?;
    let masters = MasterIndex::load(&config.master_sources())?;
    let outcome = merge::merge_favourites(&rows, &masters, config.merge.append_new_channels);

    let playlist_path = config.pruned_playlist_path();
    write_text(&playlist_path, &playlist::write_playlist(&outcome.entries))?;
    info!(
        "Wrote {} channels to {}",
        outcome.stats.written,
        playlist_path.display()
    );

    let cc_map_path = config.cc_map_path();
    write_text(&cc_map_path, &serde_json::to_string_pretty(&outcome.cc_map)?)?;

    let report_path = config.report_path(&config.reports.prune_report);
    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(&report_path)?;
    writer.write_record([
        "artifact",
        "path",
        "rows_written",
        "skipped_not_favourite",
        "skipped_no_url",
    ])?;
    writer.write_record([
        "pruned playlist (favourites only)",
        &playlist_path.display().to_string(),
        &outcome.stats.written.to_string(),
        &outcome.stats.skipped_not_favourite.to_string(),
        &outcome.stats.skipped_no_url.to_string(),
    ])?;
    writer.flush()?;

    if let Some(updated) = &outcome.updated_favourites {
        favourites::save_favourites(&config.paths.favourites, updated)?;
        info!(
            "Appended {} master discoveries to {}",
            outcome.stats.appended_new,
            config.paths.favourites.display()
        );
    }

    Ok(())
}

/// Playlist + EPG catalog -> matched playlist, pruned EPG and reports.
fn run_match(config: &Config) -> Result<()> {
    let playlist_path = config.pruned_playlist_path();
    let entries = playlist::load_playlist(&playlist_path)?;
    let aliases = AliasTable::load(&config.paths.aliases)?;
    let (catalog, documents) = ChannelCatalog::load(&config.epg_document_paths())?;

    let resolver = ChannelResolver::new(&catalog, &aliases, config.resolver_config());
    let outcome = output::apply_verdicts(&entries, &resolver);

    let matched_path = config.matched_playlist_path();
    write_text(&matched_path, &playlist::write_playlist(&outcome.entries))?;
    info!("Wrote matched playlist to {}", matched_path.display());

    output::write_audit_report(
        &config.report_path(&config.reports.match_report),
        &entries,
        &outcome.verdicts,
    )?;
    let unmatched = output::write_unmatched_report(
        &config.report_path(&config.reports.unmatched_report),
        &entries,
        &outcome.verdicts,
    )?;
    if unmatched > 0 {
        warn!("{unmatched} entries unmatched; curate aliases to fix the next run");
    }

    let keep: HashSet<String> = match config.epg.prune_mode {
        PruneMode::Resolver => outcome.accepted_ids.iter().cloned().collect(),
        PruneMode::Fuzzy => {
            let (keep, actions) =
                output::fuzzy_keep_ids(&entries, &documents, config.epg.fuzzy_threshold);
            output::write_fuzzy_report(
                &config.report_path(&config.reports.fuzzy_report),
                &actions,
            )?;
            keep
        }
    };

    if keep.is_empty() {
        return Err(AppError::empty_result(
            "no channels passed the acceptance threshold; refusing to write an empty EPG",
        )
        .into());
    }

    let filtered = output::filter_epg(&documents, &keep);
    let epg_path = config.merged_epg_path();
    xmltv::save_xmltv(&epg_path, &filtered.content)?;
    info!(
        "Wrote pruned EPG to {} ({} channels, {} programmes)",
        epg_path.display(),
        filtered.channels_kept,
        filtered.programmes_kept
    );

    Ok(())
}

/// Download the configured per-country EPG documents.
async fn run_fetch(config: &Config) -> Result<()> {
    if config.epg.url_template.is_empty() {
        return Err(AppError::configuration(
            "epg.url_template is not set; nowhere to fetch guides from",
        )
        .into());
    }

    let fetcher = EpgFetcher::new(config.http_timeout());
    let written = fetcher
        .fetch_all(
            &config.epg.url_template,
            &config.epg.countries,
            &config.paths.epg_dir,
        )
        .await?;
    info!("Fetched {} EPG documents", written.len());
    Ok(())
}

/// Resolve favourite stations and run the external grabber.
async fn run_grab(config: &Config, days: Option<u32>, dry_run: bool) -> Result<()> {
    let rows = favourites::load_favourites(&config.paths.favourites)?;
    if !rows.iter().any(|r| r.favourite) {
        info!("No rows marked favourite; nothing to grab");
        return Ok(());
    }

    let report_path = config.report_path(&config.reports.match_report);
    if !report_path.exists() {
        return Err(AppError::missing_input(
            &report_path,
            "match report not found; run `epg-reconcile match` first",
        )
        .into());
    }
    let report = grabber::load_match_report(&report_path)?;

    let resolution =
        grabber::resolve_station_ids(&rows, &report, &config.grabber.station_id_marker);
    grabber::write_coverage_report(
        &config.report_path(&config.reports.coverage_report),
        &resolution.coverage,
    )?;

    if resolution.station_ids.is_empty() {
        return Err(AppError::empty_result(format!(
            "no favourites resolved to station ids; see {}",
            config.reports.coverage_report
        ))
        .into());
    }

    let station_list = config.report_path(&config.reports.station_list);
    grabber::write_station_list(&station_list, &resolution.station_ids)?;
    info!(
        "Resolved {} station ids -> {}",
        resolution.station_ids.len(),
        station_list.display()
    );

    if dry_run {
        info!("Dry run complete; skipping grabber invocation");
        return Ok(());
    }

    let output_path = config.grabber_output_path();
    let wants_gzip = output_path.extension().is_some_and(|ext| ext == "gz");
    let output_xml = if wants_gzip {
        output_path.with_extension("")
    } else {
        output_path.clone()
    };
    if let Some(parent) = output_xml.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let grab = grabber::run_grabber(
        &config.grabber.command,
        days.unwrap_or(config.grabber.days),
        &output_xml,
        &resolution.station_ids,
        config.grabber_timeout(),
    )
    .await?;

    if !grab.filtered || wants_gzip {
        if !grab.filtered {
            info!("Grabber ran without station filtering; pruning locally");
        }
        let document = xmltv::load_xmltv(&output_xml)?;
        let keep: HashSet<String> = resolution.station_ids.iter().cloned().collect();
        let filtered = output::filter_epg(std::slice::from_ref(&document), &keep);
        xmltv::save_xmltv(&output_path, &filtered.content)?;
        if output_xml != output_path {
            std::fs::remove_file(&output_xml)?;
        }
    }

    info!(
        "Favourite-only schedule written to {}",
        output_path.display()
    );
    Ok(())
}

/// Attribute each pruned playlist entry to its master source.
fn run_sources(config: &Config) -> Result<()> {
    let entries = playlist::load_playlist(&config.pruned_playlist_path())?;
    let masters = MasterIndex::load(&config.master_sources())?;

    let report_path = config.report_path(&config.reports.sources_report);
    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(&report_path)?;
    writer.write_record(["channel_name", "tvg_id", "url", "country", "source"])?;
    for entry in &entries {
        writer.write_record([
            entry.name.as_str(),
            entry.tvg_id.as_str(),
            entry.url.as_str(),
            entry.country.as_str(),
            &masters.attribute_source(entry),
        ])?;
    }
    writer.flush()?;

    info!(
        "Attributed {} entries -> {}",
        entries.len(),
        report_path.display()
    );
    Ok(())
}
