//! Filtering and de-duplicating merge of cached XMLTV feeds

pub mod accumulator;
pub mod engine;

pub use accumulator::{ChannelRecord, MergeAccumulator, ProgrammeRecord};
pub use engine::{MergeOutput, StreamingMergeEngine, TempCleanup};
