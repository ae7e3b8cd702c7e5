//! Autoscript intake wizard core.
//!
//! Step-gated form validation, media upload, email code verification and
//! generation job dispatch, embedded by a UI shell.

pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod form;
pub mod logging;
pub mod store;
pub mod submission;
pub mod upload;
pub mod validation;
pub mod verification;
pub mod wizard;

pub use error::{Error, Result};
