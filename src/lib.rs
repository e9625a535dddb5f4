//! Client library for the document-management service.
//!
//! The core is [`data::TabularView`]: a filtered, sorted and paginated view
//! over rows fetched from an async [`data::DataSource`]. The `api` module
//! provides sources backed by the HTTP API, and `dms-cli` drives everything
//! from a REPL.

pub mod api;
pub mod completer;
pub mod config;
pub mod data;
pub mod error;
pub mod services;
pub mod session;
pub mod table_display;
pub mod utils;

pub use error::{ApiError, ViewError};
