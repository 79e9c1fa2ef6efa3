//! Favourites table I/O
//!
//! The favourites CSV is the user-curated channel list driving the pruned
//! playlist. Column headers are matched case-insensitively against a list
//! of accepted spellings, since the table is edited by hand in a
//! spreadsheet. The stream column may hold a multi-line blob: `#`-prefixed
//! property lines followed by the actual address.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::models::FavouriteRow;

/// Accepted header spellings per field, in lookup order.
const FLAG_HEADERS: &[&str] = &["favourite", "favorite", "include"];
const NEW_HEADERS: &[&str] = &["new"];
const NAME_HEADERS: &[&str] = &["channelname", "name", "channel"];
const ID_HEADERS: &[&str] = &["tvgid", "tvg-id", "tvg_id"];
const URL_HEADERS: &[&str] = &["url", "streamurl", "stream-url"];
const COUNTRY_HEADERS: &[&str] = &["country", "tvg-country", "tvg_country"];
const GROUP_HEADERS: &[&str] = &["grouptitle", "group", "category"];
const LOGO_HEADERS: &[&str] = &["logo", "tvg-logo", "tvg_logo"];
const SOURCE_HEADERS: &[&str] = &["source"];

/// Truthy spellings of the inclusion flag.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Split a stream blob into its property lines and the stream address.
///
/// `#`-prefixed lines are opaque properties; the first non-comment,
/// non-empty line is the address.
pub fn split_url_blob(blob: &str) -> (Vec<String>, String) {
    let mut properties = Vec::new();
    let mut url = String::new();
    for line in blob.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if !properties.iter().any(|p| p == line) {
                properties.push(line.to_string());
            }
        } else if url.is_empty() {
            url = line.to_string();
        } else {
            debug!("Ignoring extra address line in stream blob: {line}");
        }
    }
    (properties, url)
}

/// Load the favourites table.
///
/// A missing file is fatal: a run pruning from an absent favourites list
/// must abort rather than silently emit an empty playlist.
pub fn load_favourites(path: &Path) -> AppResult<Vec<FavouriteRow>> {
    if !path.exists() {
        return Err(AppError::missing_input(path, "favourites table not found"));
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |names: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };

    let flag_col = col(FLAG_HEADERS);
    let new_col = col(NEW_HEADERS);
    let name_col = col(NAME_HEADERS);
    let id_col = col(ID_HEADERS);
    let url_col = col(URL_HEADERS);
    let country_col = col(COUNTRY_HEADERS);
    let group_col = col(GROUP_HEADERS);
    let logo_col = col(LOGO_HEADERS);
    let source_col = col(SOURCE_HEADERS);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        rows.push(FavouriteRow {
            favourite: is_truthy(&field(flag_col)),
            new: is_truthy(&field(new_col)),
            name: field(name_col),
            tvg_id: field(id_col),
            url_blob: field(url_col),
            country: field(country_col),
            group: field(group_col),
            logo: field(logo_col),
            source: field(source_col),
        });
    }

    info!("Loaded {} favourites rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write the favourites table back with canonical headers.
///
/// Used after the master merge appended newly-discovered channels; the
/// append is additive only, existing rows are written unchanged in input
/// order.
pub fn save_favourites(path: &Path, rows: &[FavouriteRow]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "Favourite",
        "New",
        "ChannelName",
        "TvgId",
        "Url",
        "Country",
        "GroupTitle",
        "Logo",
        "Source",
    ])?;
    for row in rows {
        writer.write_record([
            if row.favourite { "1" } else { "0" },
            if row.new { "1" } else { "0" },
            &row.name,
            &row.tvg_id,
            &row.url_blob,
            &row.country,
            &row.group,
            &row.logo,
            &row.source,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn rows_from(content: &str) -> Vec<FavouriteRow> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        load_favourites(file.path()).unwrap()
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("YES", true)]
    #[case("y", true)]
    #[case("0", false)]
    #[case("no", false)]
    #[case("", false)]
    fn truthy_flag_spellings(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_truthy(value), expected);
    }

    #[test]
    fn loads_rows_with_flexible_headers() {
        let rows = rows_from(
            "Favorite,Channel,tvg-id,URL,Country,Category\n\
             1,BBC One,bbc1.uk,http://example/bbc1,GB,News\n\
             0,Skip Me,,http://example/skip,,\n",
        );
        assert_eq!(rows.len(), 2);
        assert!(rows[0].favourite);
        assert_eq!(rows[0].name, "BBC One");
        assert_eq!(rows[0].tvg_id, "bbc1.uk");
        assert_eq!(rows[0].country, "GB");
        assert_eq!(rows[0].group, "News");
        assert!(!rows[1].favourite);
    }

    #[test]
    fn splits_multiline_url_blob() {
        let blob = "#EXTVLCOPT:http-user-agent=Kodi\n#KODIPROP:key=value\nhttp://example/stream";
        let (properties, url) = split_url_blob(blob);
        assert_eq!(properties.len(), 2);
        assert_eq!(url, "http://example/stream");
    }

    #[test]
    fn blob_without_address_yields_empty_url() {
        let (properties, url) = split_url_blob("#EXTVLCOPT:only-props\n");
        assert_eq!(properties.len(), 1);
        assert!(url.is_empty());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favourites.csv");
        let rows = vec![FavouriteRow {
            favourite: true,
            new: false,
            name: "Channel 4".into(),
            tvg_id: "ch4.uk".into(),
            url_blob: "#KODIPROP:a=b\nhttp://example/ch4".into(),
            country: "UK".into(),
            group: "Entertainment".into(),
            logo: "http://example/logo.png".into(),
            source: "Free-TV".into(),
        }];
        save_favourites(&path, &rows).unwrap();

        let reloaded = load_favourites(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded[0].favourite);
        assert!(!reloaded[0].new);
        assert_eq!(reloaded[0].url_blob, rows[0].url_blob);
        assert_eq!(reloaded[0].source, "Free-TV");
    }

    #[test]
    fn missing_file_is_fatal() {
        assert!(load_favourites(Path::new("/nonexistent/favourites.csv")).is_err());
    }
}
