//! SeaORM-based key/value settings repository

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entities::{prelude::Settings, settings};
use crate::errors::AppResult;

#[derive(Clone)]
pub struct SettingsSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl SettingsSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let model = Settings::find_by_id(key.to_string())
            .one(&*self.connection)
            .await?;
        Ok(model.map(|m| m.value))
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let active = settings::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now()),
        };

        if Settings::find_by_id(key.to_string())
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

    /// Snapshot of every stored setting
    pub async fn all(&self) -> AppResult<BTreeMap<String, String>> {
        let models = Settings::find()
            .order_by_asc(settings::Column::Key)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(|m| (m.key, m.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let db = Database::in_memory().await.unwrap();
        let repo = SettingsSeaOrmRepository::new(db.connection());

        assert!(repo.get("merge_time").await.unwrap().is_none());
        repo.set("merge_time", "02:30").await.unwrap();
        repo.set("merge_time", "03:45").await.unwrap();
        repo.set("merge_schedule", "weekly").await.unwrap();

        assert_eq!(repo.get("merge_time").await.unwrap().as_deref(), Some("03:45"));
        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["merge_schedule"], "weekly");
    }
}
