use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_settings_table(manager).await?;
        self.create_job_history_table(manager).await?;
        self.create_archives_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(Archives::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    async fn create_settings_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Settings::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(Settings::Value).text().not_null())
                    .col(self.create_timestamp_column(manager, Settings::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_job_history_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(JobHistory::JobId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(JobHistory::Status).string().not_null())
                    .col(self.create_timestamp_column(manager, JobHistory::StartedAt))
                    .col(self.create_nullable_timestamp_column(manager, JobHistory::CompletedAt))
                    .col(ColumnDef::new(JobHistory::MergeFilename).string())
                    .col(ColumnDef::new(JobHistory::ChannelsIncluded).big_integer())
                    .col(ColumnDef::new(JobHistory::ProgramsIncluded).big_integer())
                    .col(ColumnDef::new(JobHistory::FileSize).string())
                    .col(ColumnDef::new(JobHistory::PeakMemoryMb).double())
                    .col(ColumnDef::new(JobHistory::DaysIncluded).integer())
                    .col(ColumnDef::new(JobHistory::ErrorMessage).text())
                    .col(ColumnDef::new(JobHistory::ExecutionTimeSeconds).double())
                    .to_owned(),
            )
            .await
    }

    async fn create_archives_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Archives::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Archives::Filename)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(self.create_timestamp_column(manager, Archives::CreatedAt))
                    .col(
                        ColumnDef::new(Archives::Channels)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Archives::Programs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Archives::DaysIncluded)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Archives::SizeBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_job_history_status")
                    .table(JobHistory::Table)
                    .col(JobHistory::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_history_started_at")
                    .table(JobHistory::Table)
                    .col(JobHistory::StartedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Settings {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobHistory {
    Table,
    Id,
    JobId,
    Status,
    StartedAt,
    CompletedAt,
    MergeFilename,
    ChannelsIncluded,
    ProgramsIncluded,
    FileSize,
    PeakMemoryMb,
    DaysIncluded,
    ErrorMessage,
    ExecutionTimeSeconds,
}

#[derive(DeriveIden)]
enum Archives {
    Table,
    Filename,
    CreatedAt,
    Channels,
    Programs,
    DaysIncluded,
    SizeBytes,
}
