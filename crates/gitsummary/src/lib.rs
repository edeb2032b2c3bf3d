pub mod error;
pub mod extract;
pub mod services;
pub mod store;
pub mod vcs;

/// Test utilities for unit and integration testing.
/// Only available with cfg(test) or feature "testing".
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ExtractionError, FailureKind, SchemaValidationError, StoreError, VcsError};

/// Version of the producing tool, recorded in every artifact for provenance.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
