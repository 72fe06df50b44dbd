//! Upstream feed catalogue: which folder on the feed server serves a given
//! timeframe and feed type, and where its files are cached locally.

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Iptv,
    Gracenote,
}

/// Number of days of guide data a merge covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Timeframe {
    ThreeDays,
    SevenDays,
    FourteenDays,
}

impl Timeframe {
    pub fn days(self) -> u32 {
        match self {
            Timeframe::ThreeDays => 3,
            Timeframe::SevenDays => 7,
            Timeframe::FourteenDays => 14,
        }
    }

    /// Folder on the feed server, relative to the base URL. The 14 day
    /// gracenote feed lives at the server root.
    pub fn folder(self, feed_type: FeedType) -> &'static str {
        match (self, feed_type) {
            (Timeframe::ThreeDays, FeedType::Iptv) => "3dayiptv",
            (Timeframe::ThreeDays, FeedType::Gracenote) => "3daygracenote",
            (Timeframe::SevenDays, FeedType::Iptv) => "7dayiptv",
            (Timeframe::SevenDays, FeedType::Gracenote) => "7daygracenote",
            (Timeframe::FourteenDays, FeedType::Iptv) => "iptv",
            (Timeframe::FourteenDays, FeedType::Gracenote) => "",
        }
    }

    pub fn remote_url(self, feed_type: FeedType, base_url: &str, source: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self.folder(feed_type) {
            "" => format!("{base}/{source}"),
            folder => format!("{base}/{folder}/{source}"),
        }
    }

    /// Per timeframe and feed type cache directory, so the same filename from
    /// two folders never collides
    pub fn cache_dir(self, feed_type: FeedType, cache_root: &Path) -> PathBuf {
        cache_root.join(format!("{}day_{}", self.days(), feed_type))
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = AppError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            3 => Ok(Timeframe::ThreeDays),
            7 => Ok(Timeframe::SevenDays),
            14 => Ok(Timeframe::FourteenDays),
            other => Err(AppError::validation(format!(
                "Invalid timeframe: {other} (must be 3, 7 or 14)"
            ))),
        }
    }
}

impl From<Timeframe> for u32 {
    fn from(timeframe: Timeframe) -> Self {
        timeframe.days()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.days())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days: u32 = s
            .trim()
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid timeframe: '{s}'")))?;
        Timeframe::try_from(days)
    }
}

impl std::fmt::Display for FeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedType::Iptv => write!(f, "iptv"),
            FeedType::Gracenote => write!(f, "gracenote"),
        }
    }
}

impl std::str::FromStr for FeedType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iptv" => Ok(FeedType::Iptv),
            "gracenote" => Ok(FeedType::Gracenote),
            _ => Err(AppError::validation(format!(
                "Invalid feed type: '{s}' (must be iptv or gracenote)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_mapping() {
        assert_eq!(Timeframe::ThreeDays.folder(FeedType::Iptv), "3dayiptv");
        assert_eq!(
            Timeframe::SevenDays.folder(FeedType::Gracenote),
            "7daygracenote"
        );
        assert_eq!(Timeframe::FourteenDays.folder(FeedType::Iptv), "iptv");
        assert_eq!(Timeframe::FourteenDays.folder(FeedType::Gracenote), "");
    }

    #[test]
    fn test_remote_url_handles_root_folder() {
        let url =
            Timeframe::FourteenDays.remote_url(FeedType::Gracenote, "https://host/", "uk.xml.gz");
        assert_eq!(url, "https://host/uk.xml.gz");

        let url = Timeframe::ThreeDays.remote_url(FeedType::Iptv, "https://host", "uk.xml.gz");
        assert_eq!(url, "https://host/3dayiptv/uk.xml.gz");
    }

    #[test]
    fn test_parse_timeframe_and_feed_type() {
        assert_eq!("7".parse::<Timeframe>().unwrap(), Timeframe::SevenDays);
        assert!("5".parse::<Timeframe>().unwrap_err().is_validation());
        assert!("seven".parse::<Timeframe>().is_err());
        assert_eq!("IPTV".parse::<FeedType>().unwrap(), FeedType::Iptv);
        assert!("cable".parse::<FeedType>().is_err());
    }

    #[test]
    fn test_cache_dir_is_partitioned() {
        let root = Path::new("/cache");
        assert_eq!(
            Timeframe::ThreeDays.cache_dir(FeedType::Gracenote, root),
            PathBuf::from("/cache/3day_gracenote")
        );
    }
}
