//! filebox - personal file hosting with coordinated object storage and metadata
//!
//! This crate provides upload, listing, download, deletion and public sharing with:
//! - Swappable object storage backends (local filesystem, GCS)
//! - redb embedded catalog for file metadata (ACID, unique key indexes)
//! - A content scan gate (clamd) consulted before anything is stored
//! - REST API with multipart upload and streamed downloads

pub mod api;
pub mod config;
pub mod identity;
pub mod object_store;
pub mod scan;
pub mod service;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use identity::Identity;
use service::FileService;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn Identity>,
    pub files: FileService,
}
