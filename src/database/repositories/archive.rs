//! SeaORM-based archive metadata repository

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

use crate::entities::{archives, prelude::Archives};
use crate::errors::AppResult;
use crate::models::ArchiveMeta;

/// Metadata row for one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub meta: ArchiveMeta,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct ArchiveSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ArchiveSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert or overwrite the row for `record.filename`
    pub async fn upsert(&self, record: &ArchiveRecord) -> AppResult<()> {
        let active = archives::ActiveModel {
            filename: Set(record.filename.clone()),
            created_at: Set(record.created_at.trunc_subsecs(0)),
            channels: Set(record.meta.channels as i64),
            programs: Set(record.meta.programs as i64),
            days_included: Set(record.meta.days_included as i32),
            size_bytes: Set(record.size_bytes as i64),
        };

        if Archives::find_by_id(record.filename.clone())
            .one(&*self.connection)
            .await?
            .is_some()
        {
            active.update(&*self.connection).await?;
        } else {
            active.insert(&*self.connection).await?;
        }
        Ok(())
    }

    pub async fn find(&self, filename: &str) -> AppResult<Option<ArchiveRecord>> {
        let model = Archives::find_by_id(filename.to_string())
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    pub async fn find_all(&self) -> AppResult<Vec<ArchiveRecord>> {
        let models = Archives::find().all(&*self.connection).await?;
        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    pub async fn delete(&self, filename: &str) -> AppResult<bool> {
        let result = Archives::delete_by_id(filename.to_string())
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    fn model_to_domain(model: archives::Model) -> ArchiveRecord {
        ArchiveRecord {
            filename: model.filename,
            created_at: model.created_at,
            meta: ArchiveMeta {
                channels: model.channels.max(0) as u64,
                programs: model.programs.max(0) as u64,
                days_included: model.days_included.max(0) as u32,
            },
            size_bytes: model.size_bytes.max(0) as u64,
        }
    }
}
