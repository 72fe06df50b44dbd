//! Centralized error handling for the EPG merge service
//!
//! # Error Categories
//!
//! - **Database Errors**: SQLite operations, migrations, connection issues
//! - **Source Errors**: upstream downloads and XMLTV parsing
//! - **Validation Errors**: malformed settings and caller input
//!
//! # Usage
//!
//! ```rust
//! use epg_merge::errors::{AppError, AppResult};
//!
//! fn parse_timeframe(raw: &str) -> AppResult<u32> {
//!     raw.parse()
//!         .map_err(|_| AppError::validation(format!("invalid timeframe: {raw}")))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
