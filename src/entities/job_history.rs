use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "job_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub job_id: String,
    pub status: String,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub merge_filename: Option<String>,
    pub channels_included: Option<i64>,
    pub programs_included: Option<i64>,
    pub file_size: Option<String>,
    pub peak_memory_mb: Option<f64>,
    pub days_included: Option<i32>,
    pub error_message: Option<String>,
    pub execution_time_seconds: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
