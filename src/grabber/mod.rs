//! External schedule-grabber invocation
//!
//! Wraps the XMLTV grabber program that downloads schedule data for a set
//! of station ids. Newer grabber releases accept a channel file restricting
//! the download; when the installed one does not, the run falls back to an
//! unrestricted download and prunes the result locally through the EPG
//! filter.

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{AppResult, GrabberError};
use crate::models::FavouriteRow;

/// How a grabber run ended
#[derive(Debug)]
pub struct GrabOutcome {
    /// Whether the grabber itself restricted the download to the station
    /// set; false means the caller must prune the output
    pub filtered: bool,
}

/// Station-id resolution for the favourites set
#[derive(Debug, Default)]
pub struct StationResolution {
    /// Distinct resolved station ids, sorted
    pub station_ids: BTreeSet<String>,
    /// (channel name, resolved id) per favourite row, in input order
    pub coverage: Vec<(String, Option<String>)>,
}

/// Read (name, matched id) pairs back from the match audit report.
pub fn load_match_report(path: &Path) -> AppResult<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let name_col = headers.iter().position(|h| h.trim() == "name");
    let id_col = headers.iter().position(|h| h.trim() == "matched_id");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        rows.push((field(name_col), field(id_col)));
    }
    Ok(rows)
}

/// Map favourite rows to station ids via the audit report.
///
/// Rows are keyed by lowercased channel name against the report; a row
/// whose declared id already looks like a grabber station id (leading `I`
/// plus the configured marker) is used as a fallback.
pub fn resolve_station_ids(
    favourites: &[FavouriteRow],
    report: &[(String, String)],
    station_id_marker: &str,
) -> StationResolution {
    let by_name: std::collections::HashMap<String, &str> = report
        .iter()
        .map(|(name, id)| (name.trim().to_lowercase(), id.as_str()))
        .collect();

    let mut resolution = StationResolution::default();
    for row in favourites.iter().filter(|r| r.favourite) {
        let key = row.name.trim().to_lowercase();
        let mut station = by_name
            .get(&key)
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if station.is_none() {
            let tvg_id = row.tvg_id.trim();
            if tvg_id.starts_with('I') && tvg_id.contains(station_id_marker) {
                station = Some(tvg_id.to_string());
            }
        }

        if let Some(id) = &station {
            resolution.station_ids.insert(id.clone());
        }
        resolution.coverage.push((row.name.clone(), station));
    }
    resolution
}

/// Write the station list file consumed by the grabber: one id per line,
/// sorted and de-duplicated.
pub fn write_station_list(path: &Path, station_ids: &BTreeSet<String>) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for id in station_ids {
        content.push_str(id);
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Write the per-favourite coverage report.
pub fn write_coverage_report(
    path: &Path,
    coverage: &[(String, Option<String>)],
) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ChannelName", "StationId"])?;
    for (name, station) in coverage {
        writer.write_record([name.as_str(), station.as_deref().unwrap_or("")])?;
    }
    writer.flush()?;
    Ok(())
}

/// Invoke the external grabber for the given station set.
///
/// Tries the id-restricted form first; when the grabber rejects the channel
/// file option the download is retried unrestricted and `filtered: false`
/// tells the caller to prune locally. Any other failure propagates with the
/// captured diagnostic output.
pub async fn run_grabber(
    command: &str,
    days: u32,
    output_xml: &Path,
    station_ids: &BTreeSet<String>,
    timeout: Duration,
) -> AppResult<GrabOutcome> {
    let mut station_file = tempfile::NamedTempFile::new()?;
    for id in station_ids {
        writeln!(station_file, "{id}")?;
    }
    station_file.flush()?;

    let restricted = [
        "--days".to_string(),
        days.to_string(),
        "--output".to_string(),
        output_xml.display().to_string(),
        "--channel-file".to_string(),
        station_file.path().display().to_string(),
    ];

    let output = invoke(command, &restricted, timeout).await?;
    if output.status.success() {
        info!("Grabber completed with station filtering");
        return Ok(GrabOutcome { filtered: true });
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let unsupported =
        stderr.to_lowercase().contains("unknown option") || stderr.contains("--channel-file");
    if !unsupported {
        return Err(GrabberError::Failed {
            command: command.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: stderr.into_owned(),
        }
        .into());
    }

    warn!("Grabber does not support --channel-file; retrying unrestricted");
    let unrestricted = [
        "--days".to_string(),
        days.to_string(),
        "--output".to_string(),
        output_xml.display().to_string(),
    ];
    let output = invoke(command, &unrestricted, timeout).await?;
    if !output.status.success() {
        return Err(GrabberError::Failed {
            command: command.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .into());
    }

    Ok(GrabOutcome { filtered: false })
}

async fn invoke(
    command: &str,
    args: &[String],
    timeout: Duration,
) -> AppResult<std::process::Output> {
    debug!("Running grabber: {command} {}", args.join(" "));

    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| GrabberError::Timeout {
            command: command.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                crate::errors::AppError::Grabber(GrabberError::NotFound {
                    command: command.to_string(),
                })
            } else {
                crate::errors::AppError::Io(e)
            }
        })?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fav(name: &str, tvg_id: &str, favourite: bool) -> FavouriteRow {
        FavouriteRow {
            favourite,
            name: name.into(),
            tvg_id: tvg_id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_stations_from_report_by_name() {
        let favourites = vec![
            fav("BBC One", "", true),
            fav("Not Included", "", false),
            fav("Unknown Channel", "", true),
        ];
        let report = vec![
            ("bbc one".to_string(), "I12345.json.schedulesdirect.org".to_string()),
            ("other".to_string(), "I99999.json.schedulesdirect.org".to_string()),
        ];
        let resolution = resolve_station_ids(&favourites, &report, "schedulesdirect");

        assert_eq!(resolution.station_ids.len(), 1);
        assert!(resolution
            .station_ids
            .contains("I12345.json.schedulesdirect.org"));
        // non-favourites are not covered at all
        assert_eq!(resolution.coverage.len(), 2);
        assert_eq!(resolution.coverage[1].1, None);
    }

    #[test]
    fn declared_id_that_looks_like_a_station_id_is_a_fallback() {
        let favourites = vec![fav("Obscure", "I55555.json.schedulesdirect.org", true)];
        let resolution = resolve_station_ids(&favourites, &[], "schedulesdirect");
        assert!(resolution
            .station_ids
            .contains("I55555.json.schedulesdirect.org"));
    }

    #[test]
    fn station_list_is_sorted_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.txt");
        let ids: BTreeSet<String> = ["b".to_string(), "a".to_string(), "c".to_string()].into();
        write_station_list(&path, &ids).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a\nb\nc\n");
    }

    #[tokio::test]
    async fn missing_grabber_command_is_reported() {
        let ids: BTreeSet<String> = ["x".to_string()].into();
        let result = run_grabber(
            "definitely-not-a-real-grabber-binary",
            1,
            Path::new("/tmp/out.xml"),
            &ids,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::errors::AppError::Grabber(GrabberError::NotFound { .. }))
        ));
    }
}
