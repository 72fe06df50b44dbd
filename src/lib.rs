pub mod archive;
pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod job_scheduling;
pub mod merge;
pub mod models;
pub mod notifications;
pub mod settings;
pub mod sources;
pub mod utils;
