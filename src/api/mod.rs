//! HTTP access to the document-management backend

pub mod client;
pub mod download;
pub mod models;
pub mod sources;

pub use client::DmsApiClient;
pub use download::DownloadedFile;
pub use sources::{ActivityLogSource, DocumentsSource, UsersSource};
