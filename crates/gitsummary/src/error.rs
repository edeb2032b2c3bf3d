//! Error taxonomy shared by the resolver, store, pipeline and analyzer.
//!
//! Input errors (`VcsError::InvalidRevision`, `VcsError::CommitNotFound`,
//! `StoreError::AmbiguousPrefix`, `StoreError::NotFound`) are surfaced to the
//! caller as-is. Extraction errors are recovered per commit by the analyzer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("cannot open git repository at {path}: {reason}")]
    Repository { path: String, reason: String },

    #[error("invalid revision '{revision}': {reason}")]
    InvalidRevision { revision: String, reason: String },

    #[error("commit not found: {commit_id}")]
    CommitNotFound { commit_id: String },

    #[error("git error while reading {context}: {source}")]
    Git {
        context: String,
        #[source]
        source: git2::Error,
    },
}

impl VcsError {
    pub(crate) fn git(context: impl Into<String>, source: git2::Error) -> Self {
        Self::Git {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaValidationError {
    #[error("intent_summary must not be empty")]
    EmptyIntentSummary,

    #[error(
        "unknown category '{0}' (expected one of {expected})",
        expected = "feature, fix, security, performance, refactor, chore"
    )]
    UnknownCategory(String),

    #[error(
        "unknown impact scope '{0}' (expected one of {expected})",
        expected = "public_api, internal, dependency, config, docs, test, unknown"
    )]
    UnknownImpactScope(String),

    #[error("unknown extraction mode '{0}' (expected heuristic, llm or hybrid)")]
    UnknownExtractionMode(String),

    #[error("confidence_score {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("qualitative score '{name}' is {score}, expected 0..=10")]
    QualitativeScoreOutOfRange { name: &'static str, score: u8 },

    #[error("invalid commit id '{0}': expected a full hexadecimal object id")]
    InvalidCommitId(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact already exists for commit {commit_id} (use force to overwrite)")]
    AlreadyExists { commit_id: String },

    #[error("stored artifact for commit {commit_id} is corrupt: {reason}")]
    Corrupt { commit_id: String, reason: String },

    #[error("prefix '{prefix}' is ambiguous: matches {}", candidates.join(", "))]
    AmbiguousPrefix {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("no commit or artifact matches '{prefix}'")]
    NotFound { prefix: String },

    #[error("invalid prefix '{prefix}': expected at least {min_len} hexadecimal characters")]
    InvalidPrefix { prefix: String, min_len: usize },

    #[error("failed to serialize artifact for commit {commit_id}: {reason}")]
    Serialize { commit_id: String, reason: String },

    #[error("notes backend error ({context}): {source}")]
    Backend {
        context: String,
        #[source]
        source: git2::Error,
    },
}

impl StoreError {
    pub(crate) fn backend(context: impl Into<String>, source: git2::Error) -> Self {
        Self::Backend {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extractor '{extractor}' failed: {message}")]
    Failed { extractor: String, message: String },

    #[error("extractor '{extractor}' timed out after {secs}s")]
    Timeout { extractor: String, secs: u64 },

    #[error("extractor '{extractor}' is unavailable: {reason}")]
    Unavailable { extractor: String, reason: String },

    #[error("all extractors failed for commit {commit_id}: {}", reasons.join("; "))]
    AllFailed {
        commit_id: String,
        reasons: Vec<String>,
    },

    #[error("extracted artifact for commit {commit_id} is invalid: {source}")]
    Schema {
        commit_id: String,
        #[source]
        source: SchemaValidationError,
    },
}

/// Classification of a single commit's failure inside a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CommitNotFound,
    ExtractionFailed,
    SchemaValidation,
    AlreadyExists,
    Storage,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::CommitNotFound => "commit_not_found",
            FailureKind::ExtractionFailed => "extraction_failed",
            FailureKind::SchemaValidation => "schema_validation",
            FailureKind::AlreadyExists => "already_exists",
            FailureKind::Storage => "storage",
        };
        write!(f, "{}", s)
    }
}

impl From<&VcsError> for FailureKind {
    fn from(err: &VcsError) -> Self {
        match err {
            VcsError::CommitNotFound { .. } | VcsError::InvalidRevision { .. } => {
                FailureKind::CommitNotFound
            },
            VcsError::Repository { .. } | VcsError::Git { .. } => FailureKind::Storage,
        }
    }
}

impl From<&StoreError> for FailureKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { .. } => FailureKind::AlreadyExists,
            _ => FailureKind::Storage,
        }
    }
}

impl From<&ExtractionError> for FailureKind {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::Schema { .. } => FailureKind::SchemaValidation,
            _ => FailureKind::ExtractionFailed,
        }
    }
}
