//! SeaORM entity definitions

pub mod archives;
pub mod job_history;
pub mod settings;

pub mod prelude {
    pub use super::archives::Entity as Archives;
    pub use super::job_history::Entity as JobHistory;
    pub use super::settings::Entity as Settings;
}
