//! Favourites pruning with master-source enrichment, end to end through
//! the on-disk formats.

use std::path::PathBuf;

use epg_reconcile::favourites;
use epg_reconcile::merge::{self, MasterIndex, MasterSource};
use epg_reconcile::playlist;

const FREE_TV_MASTER: &str = concat!(
    "#EXTM3U\n",
    "#EXTINF:-1 tvg-id=\"daserste.de\" group-title=\"Germany\",Das Erste\n",
    "http://master/daserste\n",
    "#EXTINF:-1 tvg-id=\"bbcone.uk\" tvg-country=\"UK\" group-title=\"Entertainment\",BBC One\n",
    "#EXTVLCOPT:http-user-agent=MasterAgent\n",
    "http://master/bbcone\n",
    "#EXTINF:-1 tvg-id=\"fresh.ca\" tvg-country=\"CA\",Fresh Discovery\n",
    "http://master/fresh\n",
);

const FAVOURITES: &str = concat!(
    "Favourite,ChannelName,TvgId,Url,Country,GroupTitle,Logo,Source\n",
    "1,Das Erste,,http://master/daserste,,,,\n",
    "1,BBC One,bbcone.uk,\"#KODIPROP:inputstream=adaptive\nhttp://fav/bbcone\",,News,,\n",
    "0,Not Wanted,,http://fav/notwanted,,,,\n",
    "1,No Address,,,,,,\n",
);

struct Fixture {
    dir: tempfile::TempDir,
    favourites_path: PathBuf,
    sources: Vec<MasterSource>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let favourites_path = dir.path().join("tv_favourites.csv");
    std::fs::write(&favourites_path, FAVOURITES).unwrap();

    let master_path = dir.path().join("free_tv_master.m3u");
    std::fs::write(&master_path, FREE_TV_MASTER).unwrap();

    Fixture {
        favourites_path,
        sources: vec![MasterSource {
            label: "Free-TV".into(),
            path: master_path,
            priority: 0,
        }],
        dir,
    }
}

#[test]
fn prune_backfills_from_master_and_counts_skips() {
    let fixture = fixture();
    let rows = favourites::load_favourites(&fixture.favourites_path).unwrap();
    let masters = MasterIndex::load(&fixture.sources).unwrap();
    let outcome = merge::merge_favourites(&rows, &masters, false);

    assert_eq!(outcome.stats.written, 2);
    assert_eq!(outcome.stats.skipped_not_favourite, 1);
    assert_eq!(outcome.stats.skipped_no_url, 1);

    // scenario: blank country, master matched by stream URL carries
    // group-title "Germany" -> country backfilled, rendered group "Germany"
    let das_erste = &outcome.entries[0];
    assert_eq!(das_erste.country, "Germany");
    assert_eq!(das_erste.group, "Germany");
    assert_eq!(outcome.cc_map.get("Das Erste").unwrap(), "Germany");

    // row fields win over master fields; properties merge row-then-master
    let bbc = &outcome.entries[1];
    assert_eq!(bbc.url, "http://fav/bbcone");
    assert_eq!(bbc.country, "UK");
    assert_eq!(bbc.group, "United Kingdom - News");
    assert_eq!(
        bbc.extra_properties,
        vec![
            "#KODIPROP:inputstream=adaptive".to_string(),
            "#EXTVLCOPT:http-user-agent=MasterAgent".to_string(),
        ]
    );
}

#[test]
fn pruned_playlist_roundtrips_with_properties() {
    let fixture = fixture();
    let rows = favourites::load_favourites(&fixture.favourites_path).unwrap();
    let masters = MasterIndex::load(&fixture.sources).unwrap();
    let outcome = merge::merge_favourites(&rows, &masters, false);

    let playlist_path = fixture.dir.path().join("pruned_tv.m3u");
    std::fs::write(&playlist_path, playlist::write_playlist(&outcome.entries)).unwrap();

    let reparsed = playlist::load_playlist(&playlist_path).unwrap();
    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed[0].name, "Das Erste");
    assert_eq!(reparsed[1].country, "UK");
    assert_eq!(reparsed[1].extra_properties.len(), 2);
    // every emitted entry carries a stream address
    assert!(reparsed.iter().all(|e| !e.url.is_empty()));
}

#[test]
fn master_discoveries_append_additively_and_survive_a_rerun() {
    let fixture = fixture();
    let rows = favourites::load_favourites(&fixture.favourites_path).unwrap();
    let masters = MasterIndex::load(&fixture.sources).unwrap();
    let outcome = merge::merge_favourites(&rows, &masters, true);

    // only "Fresh Discovery" is unknown to the favourites set
    assert_eq!(outcome.stats.appended_new, 1);
    let updated = outcome.updated_favourites.unwrap();
    assert_eq!(updated.len(), rows.len() + 1);
    let appended = updated.last().unwrap();
    assert!(!appended.favourite);
    assert!(appended.new);
    assert_eq!(appended.name, "Fresh Discovery");
    assert_eq!(appended.country, "CA");
    assert_eq!(appended.source, "Free-TV");

    // persist and re-run: nothing new to append, rows unchanged
    favourites::save_favourites(&fixture.favourites_path, &updated).unwrap();
    let reloaded = favourites::load_favourites(&fixture.favourites_path).unwrap();
    assert_eq!(reloaded.len(), updated.len());
    assert_eq!(reloaded.last().unwrap().name, "Fresh Discovery");

    let rerun = merge::merge_favourites(&reloaded, &masters, true);
    assert_eq!(rerun.stats.appended_new, 0);
    assert!(rerun.updated_favourites.is_none());
}

#[test]
fn source_attribution_prefers_master_labels() {
    let fixture = fixture();
    let masters = MasterIndex::load(&fixture.sources).unwrap();

    let known = playlist::parse_playlist(
        "#EXTM3U\n#EXTINF:-1 tvg-id=\"daserste.de\",Das Erste\nhttp://master/daserste\n",
        &PathBuf::from("pruned.m3u"),
    )
    .unwrap();
    assert_eq!(masters.attribute_source(&known[0]), "Free-TV");

    let unknown = playlist::parse_playlist(
        "#EXTM3U\n#EXTINF:-1,Elsewhere\nhttp://cdn.elsewhere.net/live\n",
        &PathBuf::from("pruned.m3u"),
    )
    .unwrap();
    assert_eq!(masters.attribute_source(&unknown[0]), "cdn.elsewhere.net");
}
