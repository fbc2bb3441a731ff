//! gdrive-export - Mirror Google Drive folders as Office and PDF files
//!
//! Walks a Drive folder tree, recreates its folders locally and exports every
//! Google Doc, Sheet and Slides presentation twice: once in its Office format
//! (docx, xlsx, pptx) and once as PDF. Local modification times are set to
//! the remote ones, so later runs only re-export what changed.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`auth`]: Service account and token authentication
//! - [`drive`]: Drive data model and REST client
//! - [`staleness`]: Timestamp tolerance checks
//! - [`local`]: Directory creation, artifact writes and timestamps
//! - [`export`]: Per-document export pipeline
//! - [`sync`]: Folder tree traversal

pub mod auth;
pub mod config;
pub mod drive;
pub mod export;
pub mod local;
pub mod staleness;
pub mod sync;

pub use config::{Config, SyncOptions};
pub use drive::{DriveApi, DriveClient, RemoteNode};
pub use export::{ExportPipeline, ExportResult};
pub use staleness::Tolerance;
pub use sync::{SyncEngine, SyncSummary};
