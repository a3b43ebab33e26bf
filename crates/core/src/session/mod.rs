#![allow(missing_docs)]

//! Authenticated session: identity, tokens and their persistence.

mod models;
pub mod store;

pub use models::{AuthResponse, Credentials, Registration, Session, TokenPair};
pub use store::{AuthBackend, SessionStore, SessionView};
