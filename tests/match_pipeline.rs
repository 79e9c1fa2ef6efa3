//! End-to-end reconciliation: playlist + EPG catalog -> matched playlist,
//! pruned EPG and audit trail.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use epg_reconcile::aliases::AliasTable;
use epg_reconcile::epg::{xmltv, ChannelCatalog};
use epg_reconcile::models::MatchMethod;
use epg_reconcile::output;
use epg_reconcile::playlist;
use epg_reconcile::resolver::{ChannelResolver, ResolverConfig};
use epg_reconcile::utils::DecompressionService;

const EPG_GB: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<tv generator-info-name=\"fixture\">\n",
    "  <channel id=\"bbcone.uk\">\n",
    "    <display-name>BBC One</display-name>\n",
    "  </channel>\n",
    "  <channel id=\"itv1.uk\">\n",
    "    <display-name>ITV1</display-name>\n",
    "  </channel>\n",
    "  <channel id=\"five.uk\">\n",
    "    <display-name>Channel 5</display-name>\n",
    "  </channel>\n",
    "  <programme start=\"20260801180000 +0000\" stop=\"20260801190000 +0000\" channel=\"bbcone.uk\">\n",
    "    <title>Evening News</title>\n",
    "  </programme>\n",
    "  <programme start=\"20260801190000 +0000\" stop=\"20260801200000 +0000\" channel=\"itv1.uk\">\n",
    "    <title>Quiz Night</title>\n",
    "  </programme>\n",
    "  <programme start=\"20260801200000 +0000\" stop=\"20260801210000 +0000\" channel=\"five.uk\">\n",
    "    <title>Film</title>\n",
    "  </programme>\n",
    "</tv>\n",
);

const EPG_US: &str = concat!(
    "<tv>\n",
    "  <channel id=\"cnn.us\">\n",
    "    <display-name>CNN</display-name>\n",
    "  </channel>\n",
    "  <channel id=\"bbcone.uk\">\n",
    "    <display-name>BBC One Duplicate</display-name>\n",
    "  </channel>\n",
    "  <programme start=\"20260801180000 +0000\" channel=\"cnn.us\">\n",
    "    <title>World Report</title>\n",
    "  </programme>\n",
    "</tv>\n",
);

const PLAYLIST: &str = concat!(
    "#EXTM3U\n",
    // exact id
    "#EXTINF:-1 tvg-id=\"bbcone.uk\" group-title=\"UK\",BBC One HD\n",
    "http://example/bbcone\n",
    // suffix swap .gb -> .uk
    "#EXTINF:-1 tvg-id=\"itv1.gb\" group-title=\"UK\",ITV 1\n",
    "http://example/itv1\n",
    // name-unique with a quality marker to strip
    "#EXTINF:-1 group-title=\"UK\",Channel 5 HD\n",
    "http://example/five\n",
    // unmatched, declared id must survive the rewrite
    "#EXTINF:-1 tvg-id=\"mystery.zz\" group-title=\"Docs\",Mystery Channel\n",
    "http://example/mystery\n",
);

struct Fixture {
    _dir: tempfile::TempDir,
    epg_paths: Vec<PathBuf>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();

    // one gzipped document, one plain, exercising transparent decompression
    let gb_path = dir.path().join("epg_GB.xml.gz");
    let gz = DecompressionService::compress_gzip(EPG_GB.as_bytes()).unwrap();
    std::fs::File::create(&gb_path)
        .unwrap()
        .write_all(&gz)
        .unwrap();

    let us_path = dir.path().join("epg_US.xml");
    std::fs::write(&us_path, EPG_US).unwrap();

    Fixture {
        epg_paths: vec![gb_path, us_path],
        _dir: dir,
    }
}

#[test]
fn full_pipeline_rewrites_playlist_and_prunes_epg() {
    let fixture = fixture();
    let (catalog, documents) = ChannelCatalog::load(&fixture.epg_paths).unwrap();
    assert_eq!(catalog.len(), 4); // duplicate bbcone.uk collapsed

    let entries = playlist::parse_playlist(PLAYLIST, &PathBuf::from("pruned.m3u")).unwrap();
    let aliases = AliasTable::default();
    let resolver = ChannelResolver::new(&catalog, &aliases, ResolverConfig::default());
    let outcome = output::apply_verdicts(&entries, &resolver);

    assert_eq!(outcome.verdicts[0].method, MatchMethod::IdExact);
    assert_eq!(outcome.verdicts[1].method, MatchMethod::IdSuffixSwap);
    assert_eq!(outcome.verdicts[1].matched_id, "itv1.uk");
    assert_eq!(outcome.verdicts[2].method, MatchMethod::NameUnique);
    assert_eq!(outcome.verdicts[2].matched_id, "five.uk");
    assert_eq!(outcome.verdicts[3].method, MatchMethod::Unmatched);

    // rewrite: accepted ids applied, unmatched id untouched
    let written = playlist::write_playlist(&outcome.entries);
    let reparsed = playlist::parse_playlist(&written, &PathBuf::from("matched.m3u")).unwrap();
    assert_eq!(reparsed[0].tvg_id, "bbcone.uk");
    assert_eq!(reparsed[1].tvg_id, "itv1.uk");
    assert_eq!(reparsed[2].tvg_id, "five.uk");
    assert_eq!(reparsed[3].tvg_id, "mystery.zz");
    // entry order is positional identity and must be preserved
    let names: Vec<&str> = reparsed.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["BBC One HD", "ITV 1", "Channel 5 HD", "Mystery Channel"]
    );

    // EPG closure over the accepted set
    let accepted: HashSet<String> = outcome.accepted_ids.iter().cloned().collect();
    assert_eq!(accepted.len(), 3);
    let filtered = output::filter_epg(&documents, &accepted);
    assert_eq!(filtered.channels_kept, 3);
    assert_eq!(filtered.programmes_kept, 3);
    assert!(!filtered.content.contains("cnn.us"));
    assert!(!filtered.content.contains("World Report"));
    // first-seen definition of the duplicated channel wins
    assert!(!filtered.content.contains("BBC One Duplicate"));

    // the pruned document is itself a valid XMLTV document
    let reparsed_epg =
        epg_reconcile::epg::xmltv::parse_xmltv(&filtered.content, &PathBuf::from("out.xml"))
            .unwrap();
    assert_eq!(reparsed_epg.channels.len(), 3);
    assert_eq!(reparsed_epg.programmes.len(), 3);
}

#[test]
fn pruned_epg_roundtrips_through_gzip_on_disk() {
    let fixture = fixture();
    let (_, documents) = ChannelCatalog::load(&fixture.epg_paths).unwrap();

    let accepted: HashSet<String> = ["bbcone.uk".to_string()].into();
    let filtered = output::filter_epg(&documents, &accepted);

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("merged_matched_epg.xml.gz");
    xmltv::save_xmltv(&out_path, &filtered.content).unwrap();

    let reloaded = xmltv::load_xmltv(&out_path).unwrap();
    assert_eq!(reloaded.channels.len(), 1);
    assert_eq!(reloaded.channels[0].id, "bbcone.uk");
    assert_eq!(reloaded.programmes.len(), 1);
}

#[test]
fn malformed_document_is_skipped_not_fatal() {
    let fixture = fixture();
    let dir = tempfile::tempdir().unwrap();
    let bad_path = dir.path().join("epg_BAD.xml");
    std::fs::write(&bad_path, "<tv><channel id=\"broken\">").unwrap();

    let mut paths = fixture.epg_paths.clone();
    paths.push(bad_path);
    let (catalog, documents) = ChannelCatalog::load(&paths).unwrap();
    assert_eq!(documents.len(), 2);
    assert!(catalog.contains("bbcone.uk"));
}

#[test]
fn audit_and_unmatched_reports_cover_every_row() {
    let fixture = fixture();
    let (catalog, _) = ChannelCatalog::load(&fixture.epg_paths).unwrap();
    let entries = playlist::parse_playlist(PLAYLIST, &PathBuf::from("pruned.m3u")).unwrap();
    let aliases = AliasTable::default();
    let resolver = ChannelResolver::new(&catalog, &aliases, ResolverConfig::default());
    let outcome = output::apply_verdicts(&entries, &resolver);

    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("logs/match_report.csv");
    let unmatched_path = dir.path().join("logs/unmatched.csv");

    output::write_audit_report(&audit_path, &entries, &outcome.verdicts).unwrap();
    let unmatched =
        output::write_unmatched_report(&unmatched_path, &entries, &outcome.verdicts).unwrap();
    assert_eq!(unmatched, 1);

    let mut reader = csv::Reader::from_path(&audit_path).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), entries.len());
    // input order, with method and confidence per row
    assert_eq!(&records[0][0], "BBC One HD");
    assert_eq!(&records[0][5], "id_exact");
    assert_eq!(&records[0][6], "1.000");
    assert_eq!(&records[3][5], "unmatched");
    assert_eq!(&records[3][6], "0.000");

    // the report feeds the grabber's station resolution
    let report = epg_reconcile::grabber::load_match_report(&audit_path).unwrap();
    assert_eq!(report.len(), entries.len());
    assert_eq!(report[0], ("BBC One HD".to_string(), "bbcone.uk".to_string()));
}

#[test]
fn alias_override_wins_over_catalog_contents() {
    let fixture = fixture();
    let (catalog, _) = ChannelCatalog::load(&fixture.epg_paths).unwrap();

    let mut alias_file = tempfile::NamedTempFile::new().unwrap();
    alias_file
        .write_all(
            b"m3u_name,tvg_id_current,tvg_id_target\n\
              BBC One HD,bbcone.uk,cnn.us\n",
        )
        .unwrap();
    let aliases = AliasTable::load(alias_file.path()).unwrap();

    let entries = playlist::parse_playlist(PLAYLIST, &PathBuf::from("pruned.m3u")).unwrap();
    let resolver = ChannelResolver::new(&catalog, &aliases, ResolverConfig::default());
    let outcome = output::apply_verdicts(&entries, &resolver);

    // the row also satisfies id_exact, but the alias wins
    assert_eq!(outcome.verdicts[0].method, MatchMethod::Alias);
    assert_eq!(outcome.verdicts[0].matched_id, "cnn.us");
    assert_eq!(outcome.verdicts[0].confidence, 1.0);
}
