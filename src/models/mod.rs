//! Core domain entities shared across the application
//!
//! Playlist entries, EPG channels, master references and match verdicts are
//! immutable snapshots built from the input documents for the duration of a
//! single run.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One channel entry from an M3U playlist
///
/// Identity within a playlist is positional (entries are emitted in input
/// order); identity for merge/de-duplication purposes is [`PlaylistEntry::identity_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Free-text display name after the comma of the EXTINF line
    pub name: String,
    /// Declared `tvg-id` attribute; possibly empty or unreliable
    pub tvg_id: String,
    /// Optional alternate display name (`tvg-name`)
    pub tvg_name: String,
    /// `group-title` attribute
    pub group: String,
    /// `tvg-logo` attribute
    pub logo: String,
    /// `tvg-country` attribute (2-3 letter code)
    pub country: String,
    /// Stream address; entries without one are never emitted
    pub url: String,
    /// Opaque `#`-prefixed lines attached to the stream, in input order,
    /// de-duplicated by exact text
    pub extra_properties: Vec<String>,
    /// Verbatim EXTINF line this entry was parsed from; empty for entries
    /// synthesized from favourites rows. Kept so a rewrite only touches the
    /// identifier attribute and leaves unmodeled attributes alone.
    pub raw_extinf: String,
}

impl PlaylistEntry {
    /// Case-insensitive identity key: first non-empty of display name,
    /// declared id, stream URL.
    pub fn identity_key(&self) -> Option<String> {
        [&self.name, &self.tvg_id, &self.url]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
    }

    /// The name the resolver should match on: the alternate display name
    /// when present, otherwise the raw display name.
    pub fn match_name(&self) -> &str {
        if self.tvg_name.trim().is_empty() {
            &self.name
        } else {
            &self.tvg_name
        }
    }
}

/// One channel definition from an XMLTV document
///
/// `raw_xml` holds the verbatim `<channel>` element so pruned output copies
/// the definition byte-for-byte.
#[derive(Debug, Clone)]
pub struct EpgChannel {
    /// Canonical channel id; unique within a catalog (first-seen wins)
    pub id: String,
    /// Display names in document order; defaults to `[id]` when the
    /// document supplies none
    pub display_names: Vec<String>,
    /// Verbatim source XML of the channel element
    pub raw_xml: String,
}

/// One programme entry from an XMLTV document, kept opaque
#[derive(Debug, Clone)]
pub struct Programme {
    /// The `channel` attribute referencing an [`EpgChannel::id`]
    pub channel: String,
    /// Verbatim source XML of the programme element
    pub raw_xml: String,
}

/// The strategy that produced a match verdict
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Manual alias override
    Alias,
    /// Declared id found verbatim in the catalog
    IdExact,
    /// Declared id equal to a catalog id after stripping non-alphanumerics
    IdCompact,
    /// Declared id matched with `.gb`/`.uk` suffix substituted
    IdSuffixSwap,
    /// Normalized name maps to exactly one catalog id
    NameUnique,
    /// Best token-set Jaccard similarity above the floor
    NameJaccard,
    /// Compacted name plus a guessed country suffix exists in the catalog
    SlugGuess,
    /// No strategy applied
    Unmatched,
}

/// Outcome of resolving one playlist entry against an EPG catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub method: MatchMethod,
    /// Matched catalog id; empty iff unmatched. When non-empty it always
    /// refers to an id present in the catalog that produced the verdict.
    pub matched_id: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl MatchVerdict {
    pub fn unmatched() -> Self {
        Self {
            method: MatchMethod::Unmatched,
            matched_id: String::new(),
            confidence: 0.0,
        }
    }

    /// Whether the verdict's id should be applied at the given acceptance
    /// threshold.
    pub fn accepted(&self, threshold: f64) -> bool {
        !self.matched_id.is_empty() && self.confidence >= threshold
    }
}

/// Manual override mapping a playlist row to a target EPG id
///
/// Overrides always win, with confidence 1.0.
#[derive(Debug, Clone)]
pub struct AliasOverride {
    /// Target EPG channel id
    pub target: String,
    /// Optional forced country-suffix hint for downstream strategies
    pub suffix: Option<String>,
}

/// One row of the favourites table
#[derive(Debug, Clone, Default)]
pub struct FavouriteRow {
    /// Inclusion flag; only truthy rows flow into the pruned playlist
    pub favourite: bool,
    /// Marks rows appended from a master source, pending manual review
    pub new: bool,
    pub name: String,
    pub tvg_id: String,
    /// Stream blob: the URL plus any embedded `#`-prefixed property lines
    pub url_blob: String,
    pub country: String,
    pub group: String,
    pub logo: String,
    /// Preferred master source label, when declared
    pub source: String,
}

/// A reference channel definition from a master playlist
#[derive(Debug, Clone)]
pub struct MasterEntry {
    pub entry: PlaylistEntry,
    /// Provenance tag of the source playlist
    pub source_label: String,
    /// Lower is preferred; first-seen wins within one priority
    pub priority: u32,
}

/// Counters accumulated while pruning favourites into a playlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub written: usize,
    pub skipped_not_favourite: usize,
    pub skipped_no_url: usize,
    /// Master channels appended to the favourites set as new rows
    pub appended_new: usize,
}
