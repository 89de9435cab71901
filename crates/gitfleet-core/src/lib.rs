//! Core contracts shared across the GitFleet workspace.
//!
//! This crate holds the error taxonomy that every GitFleet operation speaks:
//! the fleet-side crates (`gitfleet-repo`) and the provider-side crates
//! (`gitfleet-providers`) each define richer local error types and convert
//! them into [`Error`] at the workspace boundary.
//!
//! Every error renders as a single line beginning with its kind name
//! (`NotFound: ...`, `TransportFailure: ...`), so callers can classify
//! failures textually even after the typed error has been flattened into a
//! string (per-file blame errors, per-URL cleanup errors, clone task state).

pub mod error;

pub use error::{Error, ErrorKind, Result};
