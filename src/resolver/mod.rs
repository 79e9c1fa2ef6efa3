//! Channel identity resolution
//!
//! The matching engine at the heart of the reconciliation: given a playlist
//! entry with an unreliable or missing identifier and a catalog of EPG
//! channel records, determine which record the entry denotes and assign a
//! confidence score.
//!
//! Strategies are evaluated strictly in order and the first applicable one
//! wins; confidences are monotonically informative, so an exact-id match is
//! never beaten by a name-similarity match and a manual alias overrides
//! everything. The resolver never fails on a row: the worst outcome is an
//! `unmatched` verdict with confidence zero.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::aliases::AliasTable;
use crate::epg::ChannelCatalog;
use crate::models::{MatchMethod, MatchVerdict, PlaylistEntry};
use crate::normalize::{compact_id, jaccard, normalize, slugify, tokenize};

static RE_TRAILING_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-z]{2})$").expect("invalid suffix regex"));

/// Country suffixes tried by the slug-guess strategy, in order.
const SLUG_SUFFIXES: &[&str] = &["uk", "us", "ca", "de"];

/// Keyword table for guessing a row's country from its metadata.
const COUNTRY_KEYWORDS: &[(&str, &[&str])] = &[
    ("uk", &[" uk ", " gb ", " united kingdom ", ".uk", ".gb", " british "]),
    ("us", &[" us ", " usa ", " united states ", ".us"]),
    ("ca", &[" ca ", " canada ", ".ca"]),
    ("de", &[" de ", " germany ", " deutschland ", ".de"]),
];

/// Tuning knobs for the resolution strategies
///
/// The multi-country guide profile keeps everything enabled with a 0.90
/// acceptance threshold; the single-source grabber profile disables the
/// suffix logic and accepts down to 0.60.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Verdicts at or above this confidence are applied when rewriting
    pub accept_threshold: f64,
    /// Minimum token-set Jaccard similarity for a name match
    pub jaccard_floor: f64,
    /// Try `.gb`/`.uk` suffix substitution on declared ids
    pub enable_suffix_swap: bool,
    /// Try compacted-name-plus-country-suffix guesses as a last resort
    pub enable_slug_guess: bool,
    /// Narrow Jaccard candidates to ids matching the guessed country
    pub restrict_by_country: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.90,
            jaccard_floor: 0.60,
            enable_suffix_swap: true,
            enable_slug_guess: true,
            restrict_by_country: true,
        }
    }
}

/// The identity resolution engine
pub struct ChannelResolver<'a> {
    catalog: &'a ChannelCatalog,
    aliases: &'a AliasTable,
    config: ResolverConfig,
}

impl<'a> ChannelResolver<'a> {
    pub fn new(catalog: &'a ChannelCatalog, aliases: &'a AliasTable, config: ResolverConfig) -> Self {
        Self {
            catalog,
            aliases,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one playlist entry to a match verdict.
    pub fn resolve(&self, entry: &PlaylistEntry) -> MatchVerdict {
        let alias = self.aliases.get(&entry.name, &entry.tvg_id);

        // 1. Manual alias overrides win outright.
        if let Some(alias) = alias {
            if !alias.target.is_empty() {
                return MatchVerdict {
                    method: MatchMethod::Alias,
                    matched_id: alias.target.clone(),
                    confidence: 1.0,
                };
            }
        }

        let tvg_id = entry.tvg_id.trim();

        // 2. Declared id, verbatim.
        if !tvg_id.is_empty() && self.catalog.contains(tvg_id) {
            return MatchVerdict {
                method: MatchMethod::IdExact,
                matched_id: tvg_id.to_string(),
                confidence: 1.0,
            };
        }

        if !tvg_id.is_empty() {
            // 3. Declared id equal after stripping non-alphanumerics.
            if let Some(id) = self.catalog.id_by_compact(&compact_id(tvg_id)) {
                return MatchVerdict {
                    method: MatchMethod::IdCompact,
                    matched_id: id.to_string(),
                    confidence: 0.97,
                };
            }

            // 4. `.gb`/`.uk` suffix substitution.
            if self.config.enable_suffix_swap {
                if let Some(id) = self.suffix_swap(tvg_id) {
                    return MatchVerdict {
                        method: MatchMethod::IdSuffixSwap,
                        matched_id: id,
                        confidence: 0.96,
                    };
                }
            }
        }

        // 5. Normalized name mapping to exactly one catalog id.
        let name_key = normalize(entry.match_name());
        if !name_key.is_empty() {
            let ids = self.catalog.ids_by_normalized_name(&name_key);
            if ids.len() == 1 {
                return MatchVerdict {
                    method: MatchMethod::NameUnique,
                    matched_id: ids[0].clone(),
                    confidence: 0.92,
                };
            }
        }

        // 6. Suffix-constrained token-set Jaccard similarity.
        let hint = alias
            .and_then(|a| a.suffix.clone())
            .or_else(|| self.guess_suffix(entry));
        if let Some(verdict) = self.best_jaccard(entry, hint.as_deref()) {
            return verdict;
        }

        // 7. Compacted name plus a country suffix.
        if self.config.enable_slug_guess {
            let slug = slugify(entry.match_name());
            if !slug.is_empty() {
                for suffix in SLUG_SUFFIXES {
                    let guess = format!("{slug}.{suffix}");
                    if self.catalog.contains(&guess) {
                        return MatchVerdict {
                            method: MatchMethod::SlugGuess,
                            matched_id: guess,
                            confidence: 0.72,
                        };
                    }
                }
            }
        }

        MatchVerdict::unmatched()
    }

    fn suffix_swap(&self, tvg_id: &str) -> Option<String> {
        let swapped = if let Some(base) = tvg_id.strip_suffix(".gb") {
            format!("{base}.uk")
        } else if let Some(base) = tvg_id.strip_suffix(".uk") {
            format!("{base}.gb")
        } else {
            return None;
        };
        self.catalog.contains(&swapped).then_some(swapped)
    }

    /// Guess the row's country suffix from a keyword scan of its id, group
    /// and name, falling back to a trailing `.xx` on the declared id.
    fn guess_suffix(&self, entry: &PlaylistEntry) -> Option<String> {
        let blob = format!(
            " {} {} {} ",
            entry.tvg_id,
            entry.group,
            entry.match_name()
        )
        .to_lowercase();

        for (suffix, keywords) in COUNTRY_KEYWORDS {
            if keywords.iter().any(|k| blob.contains(k)) {
                return Some((*suffix).to_string());
            }
        }

        RE_TRAILING_SUFFIX
            .captures(&entry.tvg_id.trim().to_lowercase())
            .map(|c| c[1].to_string())
    }

    fn best_jaccard(&self, entry: &PlaylistEntry, hint: Option<&str>) -> Option<MatchVerdict> {
        let name_tokens = tokenize(entry.match_name());
        if name_tokens.is_empty() {
            return None;
        }

        let candidates: &[String] = match hint {
            Some(suffix) if self.config.restrict_by_country => self.catalog.ids_by_suffix(suffix),
            _ => self.catalog.ids(),
        };

        // First-seen order plus a strictly-greater comparison keeps ties
        // deterministic across runs.
        let mut best: Option<&String> = None;
        let mut best_score = 0.0f64;
        for id in candidates {
            let Some(names) = self.catalog.display_names(id) else {
                continue;
            };
            for display_name in names {
                let score = jaccard(&name_tokens, &tokenize(display_name));
                if score > best_score {
                    best_score = score;
                    best = Some(id);
                }
            }
        }

        let id = best?;
        if best_score < self.config.jaccard_floor {
            debug!(
                "Best Jaccard for '{}' is {:.3} ({}), below floor {:.2}",
                entry.match_name(),
                best_score,
                id,
                self.config.jaccard_floor
            );
            return None;
        }

        let suffix_matches = hint
            .map(|s| id.ends_with(&format!(".{s}")))
            .unwrap_or(false);
        let base = if suffix_matches { 0.85 } else { 0.80 };
        let confidence = base + (best_score - self.config.jaccard_floor).min(0.10);

        Some(MatchVerdict {
            method: MatchMethod::NameJaccard,
            matched_id: id.clone(),
            confidence: (confidence * 1000.0).round() / 1000.0,
        })
    }
}
