//! Channel name normalization and similarity
//!
//! Canonicalizes free-text channel names into a comparable token form. The
//! same pipeline is applied to playlist display names and EPG display names;
//! any asymmetry between the two sides breaks matching.

use std::collections::HashSet;
use std::sync::LazyLock;

use deunicode::deunicode;
use regex::Regex;

/// Standalone quality/codec markers removed from names before comparison.
static RE_QUALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(uhd|fhd|hd|sd|4k|hdr|hevc|h\.265|h265|1080p|720p|2160p)\b")
        .expect("invalid quality regex")
});

/// Parenthesized or bracketed segments (regional/format annotations).
static RE_BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(\[][^)\]]*[)\]]").expect("invalid bracket regex"));

/// Runs of anything that is not a lowercase letter or digit.
static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("invalid alnum regex"));

/// Canonicalize a free-text channel name.
///
/// Pipeline, in order: fold diacritics, lowercase, break on underscores,
/// rewrite `&` to "and" and `+` to "plus" (which also turns a trailing "+1"
/// timeshift marker into "plus 1"), drop standalone quality tokens, drop
/// bracketed segments, collapse non-alphanumeric runs to single spaces, trim.
/// Underscores must split before the stoplist runs; `\b` does not treat them
/// as token boundaries.
///
/// The result is idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let folded = deunicode(text.trim()).to_lowercase().replace('_', " ");
    let worded = folded.replace('&', " and ").replace('+', " plus ");
    let no_quality = RE_QUALITY.replace_all(&worded, " ");
    let no_brackets = RE_BRACKETED.replace_all(&no_quality, " ");
    let collapsed = RE_NON_ALNUM.replace_all(&no_brackets, " ");
    collapsed.trim().to_string()
}

/// Split a name into its set of normalized tokens. Duplicates collapse and
/// order is irrelevant.
pub fn tokenize(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalized name with the remaining spaces removed, for slug-style lookups.
pub fn slugify(text: &str) -> String {
    normalize(text).split_whitespace().collect()
}

/// Strip everything but ASCII alphanumerics from an identifier, lowercased.
pub fn compact_id(id: &str) -> String {
    id.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Token-set Jaccard similarity: `|A∩B| / |A∪B|`, 0.0 when either set is
/// empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
