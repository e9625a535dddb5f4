//! Configuration module
//!
//! TOML settings for the server connection, table defaults, activity
//! polling and downloads.

pub mod config;

pub use config::{Config, API_URL_ENV};
