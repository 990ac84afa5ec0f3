//! vaultsync library
//!
//! One-shot synchronization of a single local credential-database file to a
//! Google Drive folder: an OAuth2 credential manager plus a hash-based
//! change-detection sync engine.

pub mod auth;
pub mod drive;
pub mod error;
pub mod hash;
pub mod sync;

pub use error::{Result, SyncError};
