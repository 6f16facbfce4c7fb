//! Targeting Console Core
//!
//! The editing core of a feature-flag admin console: the in-memory
//! targeting rule model and its mutation engine, the wire transform
//! between the backend document format and the editable format, the
//! change detector and diff renderer behind the publish-confirmation
//! dialog, and the version-history navigator. The backend is an opaque
//! HTTP collaborator reached through [`client::ApiClient`].

pub mod client;
pub mod config;
pub mod diff;
pub mod editor;
pub mod errors;
pub mod history;
pub mod models;
pub mod session;
pub mod transform;
pub mod validation;

#[cfg(test)]
mod tests;
