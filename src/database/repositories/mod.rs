//! SeaORM repository implementations

pub mod archive;
pub mod job_history;
pub mod settings;

pub use archive::{ArchiveRecord, ArchiveSeaOrmRepository};
pub use job_history::JobHistorySeaOrmRepository;
pub use settings::SettingsSeaOrmRepository;
