//! gdrive_cli - A command line client for Google Drive.
//!
//! This library provides the pieces behind the `gdrive` binaries:
//! - building Drive search queries from filter flags
//! - listing folders recursively under synthesized logical paths
//! - dispatching independent per-item operations with a per-item report
//! - choosing export formats for Google Workspace documents
//!
//! # Example
//!
//! ```no_run
//! use gdrive_cli::{traversal, Authenticator, DriveClient, ListingQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DriveClient::new(Authenticator::with_token("ya29.token"));
//!
//!     let listing = traversal::traverse(&client, &ListingQuery::new()).await?;
//!     for group in listing.groups() {
//!         println!("{}: {} entries", group.path, group.entries.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod batch;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod format;
pub mod models;
pub mod query;
pub mod settings;
pub mod traversal;
pub mod upload;
pub mod url_parser;

// Re-exports for convenience
pub use api::DriveApi;
pub use auth::Authenticator;
pub use batch::{BatchReport, Dispatcher, Outcome};
pub use client::DriveClient;
pub use error::{DriveError, Result};
pub use models::RemoteEntry;
pub use query::{FileFilter, ListingQuery};
pub use url_parser::extract_id;
