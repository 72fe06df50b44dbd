//! Streaming XMLTV merge
//!
//! Every cached feed is read forward-only with `quick-xml`. Each top-level
//! `<channel>` and `<programme>` element is re-serialized into its own small
//! buffer and offered to the [`MergeAccumulator`]; kept programmes are spooled
//! to an unnamed temp file so the merged output can list all channels before
//! any programme without holding programme bodies in memory.

use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::accumulator::{ChannelRecord, MergeAccumulator, ProgrammeRecord};
use crate::errors::{AppError, AppResult, SourceError};
use crate::models::{CacheEntry, MergeResult};
use crate::settings::validation::{validate_channels, validate_output_filename};
use crate::utils::decompression::DecompressionService;
use crate::utils::human_format::{format_duration, format_memory};

const XML_HEADER: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const TV_OPEN: &[u8] = b"<tv generator-info-name=\"epg-merge\">\n";
const TV_CLOSE: &[u8] = b"</tv>\n";

/// Where the merged file goes and what it covers
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub filename: String,
    pub days_included: u32,
}

/// Result of [`StreamingMergeEngine::clear_temp_files`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempCleanup {
    pub deleted: u64,
    pub freed_mb: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct FileTally {
    channels_seen: u64,
    channels_kept: u64,
    programmes_seen: u64,
    programmes_kept: u64,
}

pub struct StreamingMergeEngine {
    temp_dir: PathBuf,
}

impl StreamingMergeEngine {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Merge `cached_files` in the given order into a gzip-compressed XMLTV
    /// document at `{temp_dir}/{output.filename}`.
    ///
    /// The work runs on the blocking pool. `cancel` is polled between
    /// elements; a cancelled merge leaves no output file behind.
    pub async fn merge(
        &self,
        cached_files: &[CacheEntry],
        keep_channel_ids: &[String],
        output: MergeOutput,
        cancel: CancellationToken,
    ) -> AppResult<MergeResult> {
        let files: Vec<PathBuf> = cached_files.iter().map(|e| e.path().to_path_buf()).collect();
        let keep = keep_channel_ids.to_vec();
        let temp_dir = self.temp_dir.clone();

        tokio::task::spawn_blocking(move || merge_files(&temp_dir, &files, &keep, &output, &cancel))
            .await
            .map_err(|e| AppError::internal(format!("Merge task failed: {e}")))?
    }

    /// Delete leftover `*.xml.gz` outputs from the temp directory
    pub fn clear_temp_files(&self) -> AppResult<TempCleanup> {
        let mut deleted = 0u64;
        let mut freed = 0u64;

        let entries = match std::fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TempCleanup {
                    deleted: 0,
                    freed_mb: 0.0,
                });
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_output = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".xml.gz"));
            if !is_output || !entry.file_type()?.is_file() {
                continue;
            }

            let size = entry.metadata()?.len();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    deleted += 1;
                    freed += size;
                }
                Err(e) => warn!("Could not delete temp file {}: {}", path.display(), e),
            }
        }

        let freed_mb = (freed as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0;
        info!(
            "Cleared {} temp files ({})",
            deleted,
            format_memory(freed as f64)
        );
        Ok(TempCleanup { deleted, freed_mb })
    }
}

fn merge_files(
    temp_dir: &Path,
    files: &[PathBuf],
    keep: &[String],
    output: &MergeOutput,
    cancel: &CancellationToken,
) -> AppResult<MergeResult> {
    validate_channels(keep)?;
    validate_output_filename(&output.filename)?;
    if files.is_empty() {
        return Err(SourceError::NoneObtained.into());
    }

    let started = Instant::now();
    std::fs::create_dir_all(temp_dir)?;

    let spool = tempfile::tempfile_in(temp_dir)?;
    let mut accumulator = MergeAccumulator::new(keep.iter().cloned(), BufWriter::new(spool));

    let mut skipped = 0usize;
    for path in files {
        match scan_file(path, &mut accumulator, cancel) {
            Ok(tally) => debug!(
                "{}: kept {}/{} channels, {}/{} programmes",
                path.display(),
                tally.channels_kept,
                tally.channels_seen,
                tally.programmes_kept,
                tally.programmes_seen
            ),
            Err(AppError::Source(e @ SourceError::ParseError { .. })) => {
                skipped += 1;
                warn!("Skipping rest of {}: {}", path.display(), e);
            }
            Err(e) => return Err(e),
        }
    }

    let channels_included = accumulator.channels_kept();
    let programs_included = accumulator.programmes_kept();
    let (channels, spool) = accumulator.into_parts();
    let spool = spool.into_inner().map_err(|e| e.into_error())?;

    if cancel.is_cancelled() {
        return Err(AppError::cancelled("merge"));
    }
    let output_path = temp_dir.join(&output.filename);
    let byte_size = write_document(temp_dir, &output_path, &channels, spool, cancel)?;

    info!(
        "Merged {} files ({} skipped) into {}: {} channels, {} programmes, {} in {}",
        files.len(),
        skipped,
        output_path.display(),
        channels_included,
        programs_included,
        format_memory(byte_size as f64),
        format_duration(started.elapsed())
    );

    Ok(MergeResult {
        output_path,
        channels_included,
        programs_included,
        byte_size,
        days_included: output.days_included,
    })
}

/// Write declaration, channels, spooled programmes. The document is built in
/// a sibling temp file and renamed over `output_path` once complete, unless
/// `cancel` fired in the meantime.
fn write_document(
    temp_dir: &Path,
    output_path: &Path,
    channels: &[Vec<u8>],
    mut programmes: File,
    cancel: &CancellationToken,
) -> AppResult<u64> {
    let staging = tempfile::Builder::new()
        .prefix(".merge-")
        .tempfile_in(temp_dir)?;

    let mut encoder = GzEncoder::new(BufWriter::new(staging.reopen()?), Compression::default());
    encoder.write_all(XML_HEADER)?;
    encoder.write_all(TV_OPEN)?;
    for channel in channels {
        encoder.write_all(channel)?;
        encoder.write_all(b"\n")?;
    }
    programmes.seek(SeekFrom::Start(0))?;
    std::io::copy(&mut programmes, &mut encoder)?;
    encoder.write_all(TV_CLOSE)?;

    let file = encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    if cancel.is_cancelled() {
        return Err(AppError::cancelled("merge"));
    }
    staging.persist(output_path).map_err(|e| e.error)?;
    Ok(std::fs::metadata(output_path)?.len())
}

/// Top-level element being re-serialized
struct ElementCapture {
    kind: CaptureKind,
    writer: Writer<Vec<u8>>,
    /// Nesting level the element opened at
    level: usize,
    title: Option<Vec<u8>>,
    title_writer: Option<Writer<Vec<u8>>>,
}

enum CaptureKind {
    Channel { id: Option<String> },
    Programme { channel: String, start: String },
}

impl ElementCapture {
    fn begin(start: &BytesStart, level: usize) -> Option<Self> {
        let kind = match start.name().as_ref() {
            b"channel" => CaptureKind::Channel {
                id: attribute(start, b"id"),
            },
            b"programme" => CaptureKind::Programme {
                channel: attribute(start, b"channel").unwrap_or_default(),
                start: attribute(start, b"start").unwrap_or_default(),
            },
            _ => return None,
        };
        Some(Self {
            kind,
            writer: Writer::new(Vec::new()),
            level,
            title: None,
            title_writer: None,
        })
    }

    fn is_programme(&self) -> bool {
        matches!(self.kind, CaptureKind::Programme { .. })
    }

    fn into_record(self) -> Record {
        let raw = self.writer.into_inner();
        match self.kind {
            CaptureKind::Channel { id } => Record::Channel(id.map(|id| ChannelRecord { id, raw })),
            CaptureKind::Programme { channel, start } => Record::Programme(ProgrammeRecord {
                channel_id: channel,
                start,
                title: self.title.map(|t| title_text(&t)).unwrap_or_default(),
                raw,
            }),
        }
    }
}

enum Record {
    /// `None` for a channel without an id
    Channel(Option<ChannelRecord>),
    Programme(ProgrammeRecord),
}

/// Text of a captured `<title>` body with entity references resolved and
/// CDATA sections unwrapped, so differently escaped spellings compare equal
fn title_text(raw: &[u8]) -> String {
    const CDATA_OPEN: &str = "<![CDATA[";
    const CDATA_CLOSE: &str = "]]>";

    let raw = String::from_utf8_lossy(raw);
    let mut text = String::with_capacity(raw.len());
    let mut rest: &str = &raw;
    while let Some(open) = rest.find(CDATA_OPEN) {
        push_unescaped(&mut text, &rest[..open]);
        let body = &rest[open + CDATA_OPEN.len()..];
        match body.find(CDATA_CLOSE) {
            Some(close) => {
                text.push_str(&body[..close]);
                rest = &body[close + CDATA_CLOSE.len()..];
            }
            None => {
                text.push_str(body);
                rest = "";
            }
        }
    }
    push_unescaped(&mut text, rest);
    text
}

fn push_unescaped(text: &mut String, escaped: &str) {
    match unescape(escaped) {
        Ok(unescaped) => text.push_str(&unescaped),
        // Unknown entity: keep it verbatim
        Err(_) => text.push_str(escaped),
    }
}

fn attribute(start: &BytesStart, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| std::str::from_utf8(&attr.value).ok().map(str::to_string))
}

fn scan_file<W: Write>(
    path: &Path,
    accumulator: &mut MergeAccumulator<W>,
    cancel: &CancellationToken,
) -> AppResult<FileTally> {
    let label = path.display().to_string();
    let parse_error = |message: String| AppError::from(SourceError::parse(label.clone(), message));

    let (_, input) = DecompressionService::open_decoded(path)
        .map_err(|e| parse_error(format!("cannot open: {e}")))?;
    let mut reader = Reader::from_reader(input);

    let mut tally = FileTally::default();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<ElementCapture> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(parse_error(format!(
                    "{e} (at byte {})",
                    reader.buffer_position()
                )));
            }
        };

        let mut finished = None;
        match &event {
            Event::Eof => {
                if depth > 0 {
                    return Err(parse_error("unexpected end of document".to_string()));
                }
                break;
            }
            Event::Start(start) => {
                if let Some(capture) = current.as_mut() {
                    capture
                        .writer
                        .write_event(event.borrow())
                        .map_err(|e| parse_error(e.to_string()))?;
                    if let Some(title) = capture.title_writer.as_mut() {
                        title
                            .write_event(event.borrow())
                            .map_err(|e| parse_error(e.to_string()))?;
                    } else if capture.is_programme()
                        && capture.title.is_none()
                        && depth == capture.level + 1
                        && start.name().as_ref() == b"title"
                    {
                        capture.title_writer = Some(Writer::new(Vec::new()));
                    }
                } else if depth == 1 {
                    if cancel.is_cancelled() {
                        return Err(AppError::cancelled("merge"));
                    }
                    if let Some(mut capture) = ElementCapture::begin(start, depth) {
                        capture
                            .writer
                            .write_event(event.borrow())
                            .map_err(|e| parse_error(e.to_string()))?;
                        current = Some(capture);
                    }
                }
                depth += 1;
            }
            Event::Empty(start) => {
                if let Some(capture) = current.as_mut() {
                    capture
                        .writer
                        .write_event(event.borrow())
                        .map_err(|e| parse_error(e.to_string()))?;
                    if let Some(title) = capture.title_writer.as_mut() {
                        title
                            .write_event(event.borrow())
                            .map_err(|e| parse_error(e.to_string()))?;
                    } else if capture.is_programme()
                        && capture.title.is_none()
                        && depth == capture.level + 1
                        && start.name().as_ref() == b"title"
                    {
                        capture.title = Some(Vec::new());
                    }
                } else if depth == 1 {
                    if cancel.is_cancelled() {
                        return Err(AppError::cancelled("merge"));
                    }
                    if let Some(mut capture) = ElementCapture::begin(start, depth) {
                        capture
                            .writer
                            .write_event(event.borrow())
                            .map_err(|e| parse_error(e.to_string()))?;
                        finished = Some(capture);
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some(capture) = current.as_mut() {
                    if let Some(mut title) = capture.title_writer.take() {
                        if depth == capture.level + 1 {
                            capture.title = Some(title.into_inner());
                        } else {
                            title
                                .write_event(event.borrow())
                                .map_err(|e| parse_error(e.to_string()))?;
                            capture.title_writer = Some(title);
                        }
                    }
                    capture
                        .writer
                        .write_event(event.borrow())
                        .map_err(|e| parse_error(e.to_string()))?;
                    if depth == capture.level {
                        finished = current.take();
                    }
                }
            }
            _ => {
                if let Some(capture) = current.as_mut() {
                    capture
                        .writer
                        .write_event(event.borrow())
                        .map_err(|e| parse_error(e.to_string()))?;
                    if let Some(title) = capture.title_writer.as_mut() {
                        title
                            .write_event(event.borrow())
                            .map_err(|e| parse_error(e.to_string()))?;
                    }
                }
            }
        }

        if let Some(capture) = finished {
            match capture.into_record() {
                Record::Channel(Some(channel)) => {
                    tally.channels_seen += 1;
                    if accumulator.consider_channel(channel) {
                        tally.channels_kept += 1;
                    }
                }
                Record::Channel(None) => {
                    tally.channels_seen += 1;
                }
                Record::Programme(programme) => {
                    tally.programmes_seen += 1;
                    if accumulator.consider_programme(programme)? {
                        tally.programmes_kept += 1;
                    }
                }
            }
        }

        buf.clear();
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    use crate::models::{CacheOrigin, SourceDescriptor};

    fn write_gz(dir: &Path, name: &str, xml: &str) -> CacheEntry {
        let path = dir.join(name);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        CacheEntry {
            source: SourceDescriptor {
                name: name.to_string(),
                remote_url: format!("http://localhost/{name}"),
                local_cache_path: path,
            },
            modified_at: Utc::now(),
            size_bytes: 0,
            origin: CacheOrigin::Fresh,
        }
    }

    fn read_output(path: &Path) -> String {
        let mut text = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    fn output() -> MergeOutput {
        MergeOutput {
            filename: "merged.xml.gz".to_string(),
            days_included: 3,
        }
    }

    const FEED_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1"><display-name>BBC One</display-name></channel>
  <channel id="itv1"><display-name>ITV1</display-name></channel>
  <programme channel="bbc1" start="20250101000000 +0000"><title lang="en">News</title></programme>
  <programme channel="itv1" start="20250101000000 +0000"><title>Quiz</title></programme>
</tv>"#;

    const FEED_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1"><display-name>BBC One HD</display-name></channel>
  <programme channel="bbc1" start="20250101000000 +0000"><title lang="en">News</title></programme>
</tv>"#;

    #[tokio::test]
    async fn test_merge_dedups_across_sources() {
        let dir = TempDir::new().unwrap();
        let a = write_gz(dir.path(), "a.xml.gz", FEED_A);
        let b = write_gz(dir.path(), "b.xml.gz", FEED_B);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));

        let result = engine
            .merge(&[a, b], &["bbc1".to_string()], output(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.channels_included, 1);
        assert_eq!(result.programs_included, 1);
        assert_eq!(result.days_included, 3);
        assert!(result.byte_size > 0);

        let xml = read_output(&result.output_path);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        // First-seen channel wins
        assert!(xml.contains("BBC One</display-name>"));
        assert!(!xml.contains("BBC One HD"));
        assert!(!xml.contains("itv1"));
        assert!(xml.contains("<title lang=\"en\">News</title>"));
    }

    #[tokio::test]
    async fn test_channels_precede_programmes() {
        let dir = TempDir::new().unwrap();
        let a = write_gz(dir.path(), "a.xml.gz", FEED_A);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));

        let keep = vec!["bbc1".to_string(), "itv1".to_string()];
        let result = engine
            .merge(&[a], &keep, output(), CancellationToken::new())
            .await
            .unwrap();

        let xml = read_output(&result.output_path);
        let last_channel = xml.rfind("<channel ").unwrap();
        let first_programme = xml.find("<programme ").unwrap();
        assert!(last_channel < first_programme);
        assert!(xml.trim_end().ends_with("</tv>"));
        assert_eq!(result.programs_included, 2);
    }

    #[tokio::test]
    async fn test_programme_without_title_uses_empty_key() {
        let dir = TempDir::new().unwrap();
        let feed = r#"<tv>
  <channel id="bbc1"/>
  <programme channel="bbc1" start="1"/>
  <programme channel="bbc1" start="1"><desc>untitled</desc></programme>
  <programme channel="bbc1" start="1"><title/></programme>
  <programme channel="bbc1" start="1"><title>Film</title></programme>
</tv>"#;
        let a = write_gz(dir.path(), "a.xml.gz", feed);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));

        let result = engine
            .merge(&[a], &["bbc1".to_string()], output(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.channels_included, 1);
        assert_eq!(result.programs_included, 2);
    }

    #[tokio::test]
    async fn test_broken_file_keeps_elements_before_error() {
        let dir = TempDir::new().unwrap();
        let broken = r#"<tv>
  <channel id="bbc1"/>
  <programme channel="bbc1" start="1"><title>One</title></programme>
  <programme channel="bbc1" start="2"><title>Two</wrong></programme>
  <programme channel="bbc1" start="3"><title>Three</title></programme>
</tv>"#;
        let a = write_gz(dir.path(), "broken.xml.gz", broken);
        let b = write_gz(dir.path(), "b.xml.gz", FEED_B);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));

        let result = engine
            .merge(&[a, b], &["bbc1".to_string()], output(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.channels_included, 1);
        // "One" from the broken file, "News" from the healthy one
        assert_eq!(result.programs_included, 2);
    }

    #[tokio::test]
    async fn test_cancelled_merge_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let a = write_gz(dir.path(), "a.xml.gz", FEED_A);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine
            .merge(&[a], &["bbc1".to_string()], output(), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled { .. }));
        assert!(!dir.path().join("tmp/merged.xml.gz").exists());
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = StreamingMergeEngine::new(dir.path());

        let err = engine
            .merge(&[], &["bbc1".to_string()], output(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Source(SourceError::NoneObtained)));

        let a = write_gz(dir.path(), "a.xml.gz", FEED_A);
        let err = engine
            .merge(&[a], &[], output(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_title_key_ignores_escaping_form() {
        let dir = TempDir::new().unwrap();
        let feed = r#"<tv>
  <channel id="bbc1"/>
  <programme channel="bbc1" start="1"><title>A &amp; B</title></programme>
  <programme channel="bbc1" start="1"><title>A &#38; B</title></programme>
  <programme channel="bbc1" start="1"><title><![CDATA[A & B]]></title></programme>
  <programme channel="bbc1" start="1"><title>A &amp;amp; B</title></programme>
</tv>"#;
        let a = write_gz(dir.path(), "a.xml.gz", feed);
        let engine = StreamingMergeEngine::new(dir.path().join("tmp"));

        let result = engine
            .merge(&[a], &["bbc1".to_string()], output(), CancellationToken::new())
            .await
            .unwrap();

        // The last title is literally "A &amp; B" and stays distinct
        assert_eq!(result.programs_included, 2);
    }

    #[test]
    fn test_title_text() {
        assert_eq!(title_text(b"Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(title_text(b"Tom &#x26; Jerry"), "Tom & Jerry");
        assert_eq!(title_text(b"<![CDATA[Tom & Jerry]]>"), "Tom & Jerry");
        assert_eq!(title_text(b"&lt;<![CDATA[&amp;]]>&gt;"), "<&amp;>");
        assert_eq!(title_text(b"News &unknown;"), "News &unknown;");
    }

    #[test]
    fn test_cancel_before_persist_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let output_path = dir.path().join("merged.xml.gz");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = write_document(
            dir.path(),
            &output_path,
            &[b"<channel id=\"bbc1\"/>".to_vec()],
            tempfile::tempfile_in(dir.path()).unwrap(),
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Cancelled { .. }));
        assert!(!output_path.exists());
        // The staging file is removed with it
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_temp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("merged.xml.gz"), vec![0u8; 2048]).unwrap();
        std::fs::write(dir.path().join("other.xml.gz"), vec![0u8; 1024]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let engine = StreamingMergeEngine::new(dir.path());
        let cleanup = engine.clear_temp_files().unwrap();

        assert_eq!(cleanup.deleted, 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("merged.xml.gz").exists());

        let missing = StreamingMergeEngine::new(dir.path().join("absent"));
        assert_eq!(missing.clear_temp_files().unwrap().deleted, 0);
    }
}
