//! First-seen-wins selection of channels and programmes across feeds

use std::collections::HashSet;
use std::io::Write;

/// A top-level `<channel>` element as it appeared in its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: String,
    pub raw: Vec<u8>,
}

/// A top-level `<programme>` element as it appeared in its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammeRecord {
    pub channel_id: String,
    pub start: String,
    /// Raw content of the first `<title>`, empty when there is none
    pub title: String,
    pub raw: Vec<u8>,
}

/// Collects kept elements in first-seen order.
///
/// Channels are held in memory (a guide has a few hundred at most). Kept
/// programmes go straight to `programmes` so their bodies are never retained.
pub struct MergeAccumulator<W: Write> {
    keep: HashSet<String>,
    seen_channels: HashSet<String>,
    channels: Vec<Vec<u8>>,
    programme_keys: HashSet<(String, String, String)>,
    programmes: W,
    programmes_kept: u64,
}

impl<W: Write> MergeAccumulator<W> {
    pub fn new<I, S>(keep_channel_ids: I, programmes: W) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: keep_channel_ids.into_iter().map(Into::into).collect(),
            seen_channels: HashSet::new(),
            channels: Vec::new(),
            programme_keys: HashSet::new(),
            programmes,
            programmes_kept: 0,
        }
    }

    /// Keep the channel if it is allow-listed and not already taken from an
    /// earlier feed.
    pub fn consider_channel(&mut self, record: ChannelRecord) -> bool {
        if !self.keep.contains(&record.id) || self.seen_channels.contains(&record.id) {
            return false;
        }
        self.seen_channels.insert(record.id);
        self.channels.push(record.raw);
        true
    }

    /// Keep the programme if its channel was kept and the
    /// `(channel, start, title)` key has not been seen yet.
    pub fn consider_programme(&mut self, record: ProgrammeRecord) -> std::io::Result<bool> {
        if !self.seen_channels.contains(&record.channel_id) {
            return Ok(false);
        }

        let key = (record.channel_id, record.start, record.title);
        if self.programme_keys.contains(&key) {
            return Ok(false);
        }

        self.programmes.write_all(&record.raw)?;
        self.programmes.write_all(b"\n")?;
        self.programme_keys.insert(key);
        self.programmes_kept += 1;
        Ok(true)
    }

    pub fn channels_kept(&self) -> u64 {
        self.channels.len() as u64
    }

    pub fn programmes_kept(&self) -> u64 {
        self.programmes_kept
    }

    /// Kept channel elements and the programme sink
    pub fn into_parts(self) -> (Vec<Vec<u8>>, W) {
        (self.channels, self.programmes)
    }
}
