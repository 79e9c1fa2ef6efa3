//! M3U playlist parsing and serialization
//!
//! Supports the line-oriented channel-list format: a `#EXTM3U` header, one
//! `#EXTINF` metadata line per channel carrying `key="value"` attributes and
//! a free-text display name after the comma, zero or more `#`-prefixed
//! property lines, then exactly one non-comment stream address line.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{AppResult, PlaylistError};
use crate::models::PlaylistEntry;

/// Attribute spellings accepted for each canonical field, in lookup order.
const TVG_ID_KEYS: &[&str] = &["tvg-id", "tvg_id", "tvgid"];
const TVG_NAME_KEYS: &[&str] = &["tvg-name", "tvg_name"];
const GROUP_KEYS: &[&str] = &["group-title", "group_title"];
const LOGO_KEYS: &[&str] = &["tvg-logo", "tvg_logo"];
const COUNTRY_KEYS: &[&str] = &["tvg-country", "tvg_country"];

static RE_EXTINF_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#EXTINF:").expect("invalid EXTINF regex"));

/// Parse a playlist document from a string.
///
/// The first non-blank line must be the `#EXTM3U` header marker; `path` is
/// only used for error reporting.
pub fn parse_playlist(content: &str, path: &Path) -> AppResult<Vec<PlaylistEntry>> {
    let mut lines = content.lines();
    let header = lines.find(|l| !l.trim().is_empty());
    if !matches!(header, Some(h) if h.trim_start().starts_with("#EXTM3U")) {
        return Err(PlaylistError::MissingHeader {
            path: path.to_path_buf(),
        }
        .into());
    }

    let mut entries = Vec::new();
    let mut current: Option<PlaylistEntry> = None;

    for (line_num, raw_line) in lines.enumerate() {
        let line = raw_line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if RE_EXTINF_PREFIX.is_match(line) {
            if let Some(dropped) = current.take() {
                warn!(
                    "Dropping channel '{}' without stream address before line {}",
                    dropped.name,
                    line_num + 2
                );
            }
            current = Some(parse_extinf_line(line));
        } else if let Some(stripped) = line.strip_prefix('#') {
            // Property line attached to the pending channel; order preserved,
            // exact duplicates collapse.
            if let Some(entry) = current.as_mut() {
                if !entry.extra_properties.iter().any(|p| p == line) {
                    entry.extra_properties.push(line.to_string());
                }
            } else {
                debug!("Ignoring stray comment line: #{stripped}");
            }
        } else if let Some(mut entry) = current.take() {
            entry.url = line.trim().to_string();
            entries.push(entry);
        } else {
            debug!("Ignoring stream address without EXTINF metadata: {line}");
        }
    }

    if let Some(dropped) = current {
        warn!(
            "Dropping trailing channel '{}' without stream address",
            dropped.name
        );
    }

    debug!("Parsed {} playlist entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Read and parse a playlist file.
pub fn load_playlist(path: &Path) -> AppResult<Vec<PlaylistEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::errors::AppError::missing_input(path, format!("cannot read playlist: {e}"))
    })?;
    parse_playlist(&content, path)
}

/// Parse one `#EXTINF` line into a partially-filled entry (no URL yet).
fn parse_extinf_line(line: &str) -> PlaylistEntry {
    let content = RE_EXTINF_PREFIX.replace(line, "");
    let (meta, name) = split_at_name_comma(&content);
    let attributes = parse_extinf_attributes(meta);

    PlaylistEntry {
        name: name.trim().to_string(),
        tvg_id: first_attr(&attributes, TVG_ID_KEYS),
        tvg_name: first_attr(&attributes, TVG_NAME_KEYS),
        group: first_attr(&attributes, GROUP_KEYS),
        logo: first_attr(&attributes, LOGO_KEYS),
        country: first_attr(&attributes, COUNTRY_KEYS),
        url: String::new(),
        extra_properties: Vec::new(),
        raw_extinf: line.to_string(),
    }
}

fn first_attr(attributes: &HashMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| attributes.get(*k))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Split the EXTINF payload at the first comma outside quotes: attribute
/// region on the left, display name on the right. Display names may contain
/// commas; quoted attribute values may too.
fn split_at_name_comma(content: &str) -> (&str, &str) {
    let mut in_quotes = false;
    for (idx, ch) in content.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return (&content[..idx], &content[idx + 1..]),
            _ => {}
        }
    }
    (content, "")
}

/// Parse `key="value"` pairs from the attribute region of an EXTINF line.
///
/// Quote-aware character walk; no regex so that values containing spaces or
/// escap-ish characters survive. Unquoted values end at whitespace.
fn parse_extinf_attributes(attrs_part: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();

    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    if !current_key.is_empty() && !current_value.is_empty() {
                        attributes.insert(current_key.clone(), current_value.clone());
                    }
                    current_value.clear();
                    in_value = false;
                }
                current_key.clear();
            }
            '=' if !in_quotes && !in_value => {
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            '"' if in_value => {
                in_quotes = false;
                if !current_key.is_empty() {
                    attributes.insert(current_key.clone(), current_value.clone());
                }
                current_key.clear();
                current_value.clear();
                in_value = false;
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }

    if in_value && !current_key.is_empty() && !current_value.is_empty() {
        attributes.insert(current_key, current_value);
    }

    attributes
}

/// Set or replace a `key="value"` attribute in an EXTINF line.
///
/// An existing attribute is rewritten in place; a missing one is inserted
/// before the name comma (or appended when the line has no comma). An empty
/// value leaves the line untouched, so a previously-present attribute is
/// never blanked.
pub fn set_attr(extinf: &str, key: &str, value: &str) -> String {
    if value.is_empty() {
        return extinf.to_string();
    }

    let pattern = Regex::new(&format!(r#"({}=")[^"]*(")"#, regex::escape(key)))
        .expect("invalid attribute regex");
    if pattern.is_match(extinf) {
        return pattern
            .replace(extinf, format!("${{1}}{value}${{2}}"))
            .to_string();
    }

    let mut in_quotes = false;
    for (idx, ch) in extinf.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                return format!(
                    "{} {}=\"{}\"{}",
                    &extinf[..idx],
                    key,
                    value,
                    &extinf[idx..]
                );
            }
            _ => {}
        }
    }
    format!("{extinf} {key}=\"{value}\"")
}

/// Build the EXTINF line for an entry.
///
/// Entries parsed from a document keep their verbatim EXTINF line with only
/// the identifier attribute synced; synthesized entries get a fresh line
/// built attribute by attribute, skipping empty fields.
pub fn extinf_line(entry: &PlaylistEntry) -> String {
    if !entry.raw_extinf.is_empty() {
        return set_attr(&entry.raw_extinf, "tvg-id", &entry.tvg_id);
    }

    let mut line = String::from("#EXTINF:-1");
    for (key, value) in [
        ("tvg-id", &entry.tvg_id),
        ("tvg-name", &entry.tvg_name),
        ("tvg-logo", &entry.logo),
        ("tvg-country", &entry.country),
        ("group-title", &entry.group),
    ] {
        if !value.is_empty() {
            line.push_str(&format!(" {key}=\"{value}\""));
        }
    }
    line.push(',');
    line.push_str(&entry.name);
    line
}

/// Serialize entries back into an M3U document.
///
/// Entries without a stream address are never emitted. Property lines are
/// written between the EXTINF line and the address, in stored order.
pub fn write_playlist(entries: &[PlaylistEntry]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for entry in entries {
        if entry.url.is_empty() {
            continue;
        }
        out.push_str(&extinf_line(entry));
        out.push('\n');
        for prop in &entry.extra_properties {
            out.push_str(prop);
            out.push('\n');
        }
        out.push_str(&entry.url);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str) -> Vec<PlaylistEntry> {
        parse_playlist(content, &PathBuf::from("test.m3u")).unwrap()
    }

    #[test]
    fn parses_attributes_name_and_url() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"bbc1.uk\" tvg-name=\"BBC One\" group-title=\"UK\",BBC One HD\n",
            "http://example.com/bbc1\n",
        ));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tvg_id, "bbc1.uk");
        assert_eq!(entries[0].tvg_name, "BBC One");
        assert_eq!(entries[0].group, "UK");
        assert_eq!(entries[0].name, "BBC One HD");
        assert_eq!(entries[0].url, "http://example.com/bbc1");
    }

    #[test]
    fn accepts_alternate_attribute_spellings() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg_id=\"five.uk\" group_title=\"UK\",Five\n",
            "http://example.com/five\n",
        ));
        assert_eq!(entries[0].tvg_id, "five.uk");
        assert_eq!(entries[0].group, "UK");
    }

    #[test]
    fn display_name_may_contain_commas() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"x.uk\",News, Weather & Sport\n",
            "http://example.com/x\n",
        ));
        assert_eq!(entries[0].name, "News, Weather & Sport");
    }

    #[test]
    fn quoted_attribute_values_may_contain_commas() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 group-title=\"News, UK\" tvg-id=\"y.uk\",Y\n",
            "http://example.com/y\n",
        ));
        assert_eq!(entries[0].group, "News, UK");
        assert_eq!(entries[0].name, "Y");
    }

    #[test]
    fn property_lines_attach_in_order_and_dedupe() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"z.uk\",Z\n",
            "#EXTVLCOPT:http-user-agent=Kodi\n",
            "#KODIPROP:inputstream=adaptive\n",
            "#EXTVLCOPT:http-user-agent=Kodi\n",
            "http://example.com/z\n",
        ));
        assert_eq!(
            entries[0].extra_properties,
            vec![
                "#EXTVLCOPT:http-user-agent=Kodi".to_string(),
                "#KODIPROP:inputstream=adaptive".to_string(),
            ]
        );
    }

    #[test]
    fn missing_header_is_an_error() {
        let result = parse_playlist(
            "#EXTINF:-1,No Header\nhttp://example.com\n",
            &PathBuf::from("bad.m3u"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn entry_without_url_is_dropped() {
        let entries = parse(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"a.uk\",A\n",
            "#EXTINF:-1 tvg-id=\"b.uk\",B\n",
            "http://example.com/b\n",
        ));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tvg_id, "b.uk");
    }

    #[test]
    fn set_attr_replaces_existing_value() {
        let line = "#EXTINF:-1 tvg-id=\"old.gb\" group-title=\"UK\",Name";
        let rewritten = set_attr(line, "tvg-id", "new.uk");
        assert_eq!(
            rewritten,
            "#EXTINF:-1 tvg-id=\"new.uk\" group-title=\"UK\",Name"
        );
    }

    #[test]
    fn set_attr_inserts_before_name_comma() {
        let line = "#EXTINF:-1 group-title=\"UK\",Name";
        let rewritten = set_attr(line, "tvg-id", "new.uk");
        assert_eq!(
            rewritten,
            "#EXTINF:-1 group-title=\"UK\" tvg-id=\"new.uk\",Name"
        );
    }

    #[test]
    fn set_attr_with_empty_value_is_identity() {
        let line = "#EXTINF:-1 tvg-id=\"keep.uk\",Name";
        assert_eq!(set_attr(line, "tvg-id", ""), line);
    }

    #[test]
    fn roundtrip_preserves_order_and_properties() {
        let doc = concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"a.uk\" group-title=\"UK\",A\n",
            "#EXTVLCOPT:http-user-agent=Kodi\n",
            "http://example.com/a\n",
            "#EXTINF:-1 tvg-id=\"b.de\" tvg-country=\"DE\" group-title=\"Germany\",B\n",
            "http://example.com/b\n",
        );
        let entries = parse(doc);
        let written = write_playlist(&entries);
        let reparsed = parse(&written);
        assert_eq!(reparsed.len(), 2);
        assert_eq!(reparsed[0].tvg_id, "a.uk");
        assert_eq!(reparsed[0].extra_properties.len(), 1);
        assert_eq!(reparsed[1].country, "DE");
    }
}
