mod common;

use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{BASE_URL, CountingFetcher, feed, gz};
use epg_merge::archive::ArchiveStore;
use epg_merge::database::Database;
use epg_merge::database::repositories::ArchiveSeaOrmRepository;
use epg_merge::merge::{MergeOutput, StreamingMergeEngine};
use epg_merge::models::{CacheEntry, FeedType, MergeResult, Timeframe};
use epg_merge::sources::SourceCacheManager;

struct Pipeline {
    dir: TempDir,
    fetcher: Arc<CountingFetcher>,
    cache: SourceCacheManager,
    engine: StreamingMergeEngine,
}

impl Pipeline {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::new();
        let cache = SourceCacheManager::new(
            fetcher.clone(),
            dir.path().join("cache"),
            BASE_URL,
            Duration::from_secs(24 * 3600),
        );
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));
        Self {
            dir,
            fetcher,
            cache,
            engine,
        }
    }

    async fn fetch(&self, sources: &[&str]) -> Vec<CacheEntry> {
        let sources: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
        self.cache
            .fetch(&sources, Timeframe::ThreeDays, FeedType::Iptv)
            .await
            .unwrap()
    }

    async fn merge(&self, entries: &[CacheEntry], keep: &[&str]) -> MergeResult {
        let keep: Vec<String> = keep.iter().map(|s| s.to_string()).collect();
        self.engine
            .merge(
                entries,
                &keep,
                MergeOutput {
                    filename: "merged.xml.gz".to_string(),
                    days_included: 3,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap()
    }
}

fn decompress(path: &Path) -> String {
    let mut xml = String::new();
    GzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

/// Values of `attr="..."` on every `<tag ` in document order
fn attribute_values(xml: &str, tag: &str, attr: &str) -> Vec<String> {
    let open = format!("<{tag} ");
    let needle = format!("{attr}=\"");
    xml.match_indices(&open)
        .filter_map(|(at, _)| {
            let rest = &xml[at..];
            let end_of_tag = rest.find('>')?;
            let tag_text = &rest[..end_of_tag];
            let start = tag_text.find(&needle)? + needle.len();
            let len = tag_text[start..].find('"')?;
            Some(tag_text[start..start + len].to_string())
        })
        .collect()
}

#[tokio::test]
async fn test_overlapping_sources_yield_one_programme() {
    let pipeline = Pipeline::new();
    pipeline.fetcher.serve(
        "a.xml.gz",
        gz(&feed(&["bbc1"], &[("bbc1", "2025-01-01T00:00", "News")])),
    );
    pipeline.fetcher.serve(
        "b.xml.gz",
        gz(&feed(&[], &[("bbc1", "2025-01-01T00:00", "News")])),
    );

    let entries = pipeline.fetch(&["a.xml.gz", "b.xml.gz"]).await;
    let result = pipeline.merge(&entries, &["bbc1"]).await;

    assert_eq!(result.channels_included, 1);
    assert_eq!(result.programs_included, 1);
}

#[tokio::test]
async fn test_duplicating_a_source_changes_nothing() {
    let pipeline = Pipeline::new();
    pipeline.fetcher.serve(
        "uk.xml.gz",
        gz(&feed(
            &["bbc1", "bbc2", "itv1"],
            &[
                ("bbc1", "1", "News"),
                ("bbc1", "2", "Film"),
                ("bbc2", "1", "Docs"),
                ("itv1", "1", "Quiz"),
            ],
        )),
    );

    let once = pipeline.fetch(&["uk.xml.gz"]).await;
    let single = pipeline.merge(&once, &["bbc1", "bbc2"]).await;

    let twice = pipeline.fetch(&["uk.xml.gz", "uk.xml.gz"]).await;
    assert_eq!(twice.len(), 2);
    let doubled = pipeline.merge(&twice, &["bbc1", "bbc2"]).await;

    assert_eq!(single.channels_included, doubled.channels_included);
    assert_eq!(single.programs_included, doubled.programs_included);
    assert_eq!(doubled.programs_included, 3);

    // The repeated fetch was served from cache
    assert_eq!(pipeline.fetcher.download_count(), 1);
    assert_eq!(pipeline.fetcher.head_count(), 0);
}

#[tokio::test]
async fn test_output_respects_allow_list() {
    let pipeline = Pipeline::new();
    pipeline.fetcher.serve(
        "uk.xml.gz",
        gz(&feed(
            &["bbc1", "itv1", "ch4"],
            &[
                ("bbc1", "1", "News"),
                ("itv1", "1", "Quiz"),
                ("ch4", "1", "Film"),
                ("ghost", "1", "Nothing"),
            ],
        )),
    );
    pipeline.fetcher.serve(
        "us.xml.gz",
        gz(&feed(&["cnn"], &[("cnn", "1", "Headlines"), ("ch4", "2", "Late")])),
    );

    let entries = pipeline.fetch(&["uk.xml.gz", "us.xml.gz"]).await;
    let keep = ["bbc1", "ch4", "cnn", "ghost"];
    let result = pipeline.merge(&entries, &keep).await;

    let xml = decompress(&result.output_path);
    let kept_channels: HashSet<String> =
        attribute_values(&xml, "channel", "id").into_iter().collect();
    let programme_channels = attribute_values(&xml, "programme", "channel");

    assert_eq!(
        kept_channels,
        HashSet::from(["bbc1".to_string(), "ch4".to_string(), "cnn".to_string()])
    );
    assert_eq!(programme_channels.len() as u64, result.programs_included);
    for channel in &programme_channels {
        assert!(kept_channels.contains(channel), "{channel} leaked into output");
    }
    // "ghost" is allow-listed but never declared as a channel
    assert!(!programme_channels.iter().any(|c| c == "ghost"));
}

#[tokio::test]
async fn test_unparseable_source_does_not_abort_merge() {
    let pipeline = Pipeline::new();
    pipeline
        .fetcher
        .serve("bad.xml.gz", gz("<tv><channel id=\"bbc1\"></tv>"));
    pipeline.fetcher.serve(
        "good.xml.gz",
        gz(&feed(&["bbc1"], &[("bbc1", "1", "News")])),
    );

    let entries = pipeline.fetch(&["bad.xml.gz", "good.xml.gz"]).await;
    let result = pipeline.merge(&entries, &["bbc1"]).await;

    assert_eq!(result.channels_included, 1);
    assert_eq!(result.programs_included, 1);
}

#[tokio::test]
async fn test_archive_monotonicity() {
    let pipeline = Pipeline::new();
    pipeline.fetcher.serve(
        "uk.xml.gz",
        gz(&feed(&["bbc1"], &[("bbc1", "1", "News")])),
    );
    let database = Database::in_memory().await.unwrap();
    let store = ArchiveStore::new(
        pipeline.dir.path().join("current"),
        pipeline.dir.path().join("archives"),
        ArchiveSeaOrmRepository::new(database.connection()),
    );

    let entries = pipeline.fetch(&["uk.xml.gz"]).await;
    const PROMOTIONS: usize = 4;
    for _ in 0..PROMOTIONS {
        let result = pipeline.merge(&entries, &["bbc1"]).await;
        store
            .promote(&result.output_path, result.meta())
            .await
            .unwrap();
    }

    let listed = store.list().await.unwrap();
    assert_eq!(listed.iter().filter(|e| e.is_current).count(), 1);
    assert_eq!(
        listed.iter().filter(|e| !e.is_current).count(),
        PROMOTIONS - 1
    );
    assert!(listed.iter().all(|e| e.channels == 1 && e.programs == 1));
}
