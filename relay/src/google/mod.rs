//! Google API Client Module
//!
//! Authenticated access to Google REST APIs using the caller's OAuth access
//! token. Used by native block handlers that need multi-step sequencing.

pub mod client;
pub mod common;
pub mod gmail;

pub use gmail::GmailApi;
