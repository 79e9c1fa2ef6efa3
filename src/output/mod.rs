//! Pruned output assembly
//!
//! Applies resolver verdicts to rewrite playlist identifiers, filters the
//! EPG catalog down to matched channels, and emits the per-row audit and
//! unmatched reports. Below-threshold verdicts leave the row's original
//! declared id untouched but are still recorded for audit.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::epg::xmltv::{self, XmltvDocument};
use crate::errors::AppResult;
use crate::models::{MatchMethod, MatchVerdict, PlaylistEntry};
use crate::normalize::normalize;
use crate::resolver::ChannelResolver;

/// Result of resolving a whole playlist
#[derive(Debug)]
pub struct MatchOutcome {
    /// Entries with identifiers rewritten where the verdict was accepted,
    /// in input order
    pub entries: Vec<PlaylistEntry>,
    /// One verdict per input entry, in input order
    pub verdicts: Vec<MatchVerdict>,
    /// Distinct accepted ids in first-seen order
    pub accepted_ids: Vec<String>,
}

/// Resolve every entry and apply accepted verdicts.
///
/// A previously-present id is never blanked: rejected verdicts keep the
/// original declared id, and the rewrite only ever replaces the identifier
/// attribute.
pub fn apply_verdicts(entries: &[PlaylistEntry], resolver: &ChannelResolver) -> MatchOutcome {
    let threshold = resolver.config().accept_threshold;
    let mut out_entries = Vec::with_capacity(entries.len());
    let mut verdicts = Vec::with_capacity(entries.len());
    let mut accepted_ids = Vec::new();
    let mut accepted_seen = HashSet::new();

    for entry in entries {
        let verdict = resolver.resolve(entry);
        let applied = verdict.accepted(threshold);

        let mut rewritten = entry.clone();
        if applied {
            rewritten.tvg_id = verdict.matched_id.clone();
            if accepted_seen.insert(verdict.matched_id.clone()) {
                accepted_ids.push(verdict.matched_id.clone());
            }
        }

        info!(
            "[MATCH] {}: old_tvg_id='{}' matched_tvg_id='{}' method={} confidence={:.3} applied_tvg_id='{}'",
            entry.name,
            entry.tvg_id,
            verdict.matched_id,
            verdict.method,
            verdict.confidence,
            rewritten.tvg_id
        );

        out_entries.push(rewritten);
        verdicts.push(verdict);
    }

    info!(
        "Resolved {} entries: {} accepted at threshold {:.2}",
        entries.len(),
        accepted_ids.len(),
        threshold
    );

    MatchOutcome {
        entries: out_entries,
        verdicts,
        accepted_ids,
    }
}

/// A filtered EPG document ready to be written
#[derive(Debug)]
pub struct FilteredEpg {
    pub content: String,
    pub channels_kept: usize,
    pub programmes_kept: usize,
}

/// Copy the subset of the input documents covered by the accepted id set.
///
/// Each accepted channel definition is copied exactly once (first-seen order
/// across documents); every programme whose channel reference is accepted is
/// copied, preserving relative order within and across documents.
pub fn filter_epg(documents: &[XmltvDocument], accepted: &HashSet<String>) -> FilteredEpg {
    let mut channel_blocks: Vec<&str> = Vec::new();
    let mut programme_blocks: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();

    for document in documents {
        for channel in &document.channels {
            if accepted.contains(&channel.id) && seen.insert(channel.id.as_str()) {
                channel_blocks.push(&channel.raw_xml);
            }
        }
        for programme in &document.programmes {
            if accepted.contains(&programme.channel) {
                programme_blocks.push(&programme.raw_xml);
            }
        }
    }

    let filtered = FilteredEpg {
        content: xmltv::render_document(&channel_blocks, &programme_blocks),
        channels_kept: channel_blocks.len(),
        programmes_kept: programme_blocks.len(),
    };
    info!(
        "EPG filtered: {} channels, {} programmes kept",
        filtered.channels_kept, filtered.programmes_kept
    );
    filtered
}

/// Write the per-row audit report, one row per playlist entry in input
/// order.
pub fn write_audit_report(
    path: &Path,
    entries: &[PlaylistEntry],
    verdicts: &[MatchVerdict],
) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "name",
        "tvg_id",
        "tvg_name",
        "group",
        "matched_id",
        "match_method",
        "confidence",
    ])?;
    for (entry, verdict) in entries.iter().zip(verdicts) {
        writer.write_record([
            entry.name.as_str(),
            entry.tvg_id.as_str(),
            entry.match_name(),
            entry.group.as_str(),
            verdict.matched_id.as_str(),
            &verdict.method.to_string(),
            &format!("{:.3}", verdict.confidence),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the unmatched rows for manual alias curation.
pub fn write_unmatched_report(
    path: &Path,
    entries: &[PlaylistEntry],
    verdicts: &[MatchVerdict],
) -> AppResult<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["name", "tvg_id", "tvg_name", "group"])?;
    let mut count = 0usize;
    for (entry, verdict) in entries.iter().zip(verdicts) {
        if verdict.method == MatchMethod::Unmatched {
            writer.write_record([
                entry.name.as_str(),
                entry.tvg_id.as_str(),
                entry.match_name(),
                entry.group.as_str(),
            ])?;
            count += 1;
        }
    }
    writer.flush()?;
    Ok(count)
}

/// One keep-list decision of the fuzzy EPG-prune mode
#[derive(Debug, Clone)]
pub struct FuzzyAction {
    pub action: String,
    pub name: String,
    pub m3u_tvg_id: String,
    pub epg_channel_id: String,
    pub url: String,
}

/// Alternate EPG-prune mode: build the keep-list by direct id/name
/// intersection with a fuzzy name fallback instead of the full resolver.
///
/// Per playlist entry, in order: a purely numeric declared id is kept
/// verbatim; an exact normalized-name hit wins next; otherwise the closest
/// EPG name by normalized Levenshtein distance is accepted when it reaches
/// `fuzzy_threshold`.
pub fn fuzzy_keep_ids(
    entries: &[PlaylistEntry],
    documents: &[XmltvDocument],
    fuzzy_threshold: f64,
) -> (HashSet<String>, Vec<FuzzyAction>) {
    // normalized first display-name -> channel id, first-seen wins
    let mut name_to_id: Vec<(String, String)> = Vec::new();
    let mut seen_keys = HashSet::new();
    let mut seen_ids = HashSet::new();
    for document in documents {
        for channel in &document.channels {
            if !seen_ids.insert(channel.id.as_str()) {
                continue;
            }
            let display = channel
                .display_names
                .first()
                .map(String::as_str)
                .unwrap_or(channel.id.as_str());
            let key = normalize(display);
            if !key.is_empty() && seen_keys.insert(key.clone()) {
                name_to_id.push((key, channel.id.clone()));
            }
        }
    }

    let mut keep = HashSet::new();
    let mut actions = Vec::with_capacity(entries.len());

    for entry in entries {
        let tvg_id = entry.tvg_id.trim();
        if !tvg_id.is_empty() && tvg_id.chars().all(|c| c.is_ascii_digit()) {
            keep.insert(tvg_id.to_string());
            actions.push(FuzzyAction {
                action: "KEPT_ID".into(),
                name: entry.name.clone(),
                m3u_tvg_id: entry.tvg_id.clone(),
                epg_channel_id: tvg_id.to_string(),
                url: entry.url.clone(),
            });
            continue;
        }

        let key = normalize(&entry.name);
        if let Some((_, id)) = name_to_id.iter().find(|(k, _)| *k == key) {
            keep.insert(id.clone());
            actions.push(FuzzyAction {
                action: "KEPT_NAME".into(),
                name: entry.name.clone(),
                m3u_tvg_id: entry.tvg_id.clone(),
                epg_channel_id: id.clone(),
                url: entry.url.clone(),
            });
            continue;
        }

        let mut best: Option<&(String, String)> = None;
        let mut best_score = 0.0f64;
        if !key.is_empty() {
            for candidate in &name_to_id {
                let score = strsim::normalized_levenshtein(&key, &candidate.0);
                if score > best_score {
                    best_score = score;
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some((_, id)) if best_score >= fuzzy_threshold => {
                keep.insert(id.clone());
                actions.push(FuzzyAction {
                    action: format!("KEPT_FUZZY_{best_score:.3}"),
                    name: entry.name.clone(),
                    m3u_tvg_id: entry.tvg_id.clone(),
                    epg_channel_id: id.clone(),
                    url: entry.url.clone(),
                });
            }
            _ => {
                debug!(
                    "No fuzzy EPG match for '{}' (best {:.3})",
                    entry.name, best_score
                );
                actions.push(FuzzyAction {
                    action: "UNMATCHED".into(),
                    name: entry.name.clone(),
                    m3u_tvg_id: entry.tvg_id.clone(),
                    epg_channel_id: String::new(),
                    url: entry.url.clone(),
                });
            }
        }
    }

    (keep, actions)
}

/// Write the fuzzy keep-list action report.
pub fn write_fuzzy_report(path: &Path, actions: &[FuzzyAction]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["action", "name", "m3u_tvg_id", "epg_channel_id", "url"])?;
    for action in actions {
        writer.write_record([
            action.action.as_str(),
            action.name.as_str(),
            action.m3u_tvg_id.as_str(),
            action.epg_channel_id.as_str(),
            action.url.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
