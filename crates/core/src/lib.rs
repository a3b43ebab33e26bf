#![warn(clippy::all, missing_docs)]

//! Core of the shoestock inventory client.
//!
//! This crate hosts the session store, the cached query and mutation
//! layer, the HTTP client for the inventory API, and the persistence
//! and configuration plumbing used by the command-line front end.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod preferences;
pub mod resource;
pub mod session;
pub mod storage;
pub mod validation;

pub use api::ApiClient;
pub use cache::{QueryCache, QueryOptions, QueryState, ResourceKey};
pub use config::AppConfig;
pub use context::AppContext;
pub use error::{ApiError, ValidationError};
pub use models::{Identity, Role};
pub use preferences::{Language, Preferences};
pub use resource::{Notification, ResourceLoader, ResourceSync, Severity};
pub use session::{AuthBackend, Session, SessionStore, SessionView};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
