//! Artifact persistence.
//!
//! Exactly one artifact is current per commit. Artifacts live in a git notes
//! ref (default `refs/notes/intent`), keyed by the annotated commit; the note
//! blob id doubles as the artifact's content-addressed identifier. The notes
//! ref is not pushed or fetched by default, so sharing requires an explicit
//! `git push <remote> refs/notes/intent` / fetch refspec. Concurrent writers to
//! the same commit follow last-write-wins.

pub mod notes;

pub use notes::NotesStore;

use crate::error::StoreError;
use crate::services::types::Artifact;
use std::collections::{BTreeSet, HashMap};

/// Shortest prefix accepted by [`ArtifactStore::resolve_prefix`].
pub const MIN_PREFIX_LEN: usize = 4;

/// Keyed, idempotent storage of one artifact per commit.
pub trait ArtifactStore: Send + Sync {
    /// Write the artifact for `artifact.commit_id()`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when an entry exists and
    /// `force` is false. With `force` the previous entry is replaced wholesale.
    fn save(&self, artifact: &Artifact, force: bool) -> Result<(), StoreError>;

    /// `Ok(None)` when the commit has not been analyzed.
    fn load(&self, commit_id: &str) -> Result<Option<Artifact>, StoreError>;

    fn exists(&self, commit_id: &str) -> Result<bool, StoreError>;

    /// Load the ids that have entries; missing ids are absent from the map.
    fn load_batch(&self, commit_ids: &[String]) -> Result<HashMap<String, Artifact>, StoreError> {
        let mut found = HashMap::with_capacity(commit_ids.len());
        for commit_id in commit_ids {
            if let Some(artifact) = self.load(commit_id)? {
                found.insert(commit_id.clone(), artifact);
            }
        }
        Ok(found)
    }

    /// Resolve a prefix of a commit id or artifact id to the full commit id.
    fn resolve_prefix(&self, prefix: &str) -> Result<String, StoreError>;

    /// Analysis status per commit, in input order.
    fn list_analyzed(&self, commit_ids: &[String]) -> Result<Vec<(String, bool)>, StoreError> {
        commit_ids
            .iter()
            .map(|id| Ok((id.clone(), self.exists(id)?)))
            .collect()
    }
}

/// One stored entry as seen by prefix resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCandidate {
    pub commit_id: String,
    pub artifact_id: Option<String>,
}

/// Resolve `prefix` against a set of stored entries.
///
/// A candidate matches when either its commit id or its artifact id starts
/// with the prefix. Several matches that point at the same commit are not
/// ambiguous.
pub fn resolve_prefix_in<I>(candidates: I, prefix: &str) -> Result<String, StoreError>
where
    I: IntoIterator<Item = PrefixCandidate>,
{
    let needle = prefix.trim().to_lowercase();
    if needle.len() < MIN_PREFIX_LEN || !needle.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidPrefix {
            prefix: prefix.to_string(),
            min_len: MIN_PREFIX_LEN,
        });
    }

    let matches: BTreeSet<String> = candidates
        .into_iter()
        .filter(|c| {
            c.commit_id.starts_with(&needle)
                || c.artifact_id
                    .as_deref()
                    .is_some_and(|id| id.starts_with(&needle))
        })
        .map(|c| c.commit_id)
        .collect();

    let mut iter = matches.into_iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(StoreError::NotFound {
            prefix: prefix.to_string(),
        }),
        (Some(only), None) => Ok(only),
        (Some(first), Some(second)) => {
            let mut candidates = vec![first, second];
            candidates.extend(iter);
            Err(StoreError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                candidates,
            })
        },
    }
}

/// Serialize an artifact to the YAML note body.
pub fn encode(artifact: &Artifact) -> Result<String, StoreError> {
    serde_yaml::to_string(artifact).map_err(|e| StoreError::Serialize {
        commit_id: artifact.commit_id().to_string(),
        reason: e.to_string(),
    })
}

/// Parse and validate a note body stored on `commit_id`.
///
/// Anything that does not decode into a valid artifact for that exact
/// commit is corrupt; no field is silently defaulted except the list of
/// highlights. Unknown keys are ignored so newer writers stay readable.
pub fn decode(commit_id: &str, content: &str) -> Result<Artifact, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        commit_id: commit_id.to_string(),
        reason,
    };

    let artifact: Artifact = serde_yaml::from_str(content).map_err(|e| corrupt(e.to_string()))?;
    artifact.validate().map_err(|e| corrupt(e.to_string()))?;

    if !artifact.commit_id().eq_ignore_ascii_case(commit_id) {
        return Err(corrupt(format!(
            "note describes commit {} instead",
            artifact.commit_id()
        )));
    }

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::types::{ArtifactDraft, Category, ImpactScope};

    fn candidate(commit_id: &str, artifact_id: Option<&str>) -> PrefixCandidate {
        PrefixCandidate {
            commit_id: commit_id.to_string(),
            artifact_id: artifact_id.map(str::to_string),
        }
    }

    mod prefix {
        use super::*;

        const A: &str = "abcd1f0000000000000000000000000000000000";
        const B: &str = "abcd2f0000000000000000000000000000000000";

        #[test]
        fn shared_four_char_prefix_is_ambiguous() {
            let err = resolve_prefix_in(vec![candidate(A, None), candidate(B, None)], "abcd")
                .unwrap_err();
            match err {
                StoreError::AmbiguousPrefix { candidates, .. } => {
                    assert_eq!(candidates, vec![A.to_string(), B.to_string()]);
                },
                other => panic!("expected AmbiguousPrefix, got {:?}", other),
            }
        }

        #[test]
        fn longer_unique_prefix_resolves() {
            let resolved =
                resolve_prefix_in(vec![candidate(A, None), candidate(B, None)], "abcd2f").unwrap();
            assert_eq!(resolved, B);
        }

        #[test]
        fn artifact_id_prefix_resolves_to_commit() {
            let resolved = resolve_prefix_in(
                vec![
                    candidate(A, Some("9999aa0000000000000000000000000000000000")),
                    candidate(B, Some("7777bb0000000000000000000000000000000000")),
                ],
                "7777",
            )
            .unwrap();
            assert_eq!(resolved, B);
        }

        #[test]
        fn commit_and_artifact_matching_same_entry_is_not_ambiguous() {
            let resolved =
                resolve_prefix_in(vec![candidate(A, Some("abcd1f99"))], "abcd1f").unwrap();
            assert_eq!(resolved, A);
        }

        #[test]
        fn no_match_is_not_found() {
            let err = resolve_prefix_in(vec![candidate(A, None)], "ffff").unwrap_err();
            assert!(matches!(err, StoreError::NotFound { .. }));
        }

        #[test]
        fn short_or_non_hex_prefix_is_invalid() {
            assert!(matches!(
                resolve_prefix_in(vec![candidate(A, None)], "abc"),
                Err(StoreError::InvalidPrefix { .. })
            ));
            assert!(matches!(
                resolve_prefix_in(vec![candidate(A, None)], "HEAD~1"),
                Err(StoreError::InvalidPrefix { .. })
            ));
        }

        #[test]
        fn prefix_is_case_insensitive() {
            assert_eq!(resolve_prefix_in(vec![candidate(A, None)], "ABCD1").unwrap(), A);
        }
    }

    mod codec {
        use super::*;

        const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

        fn artifact() -> Artifact {
            let mut draft = ArtifactDraft::new(
                COMMIT,
                "Add retry to fetch",
                Category::Feature,
                ImpactScope::Internal,
            );
            draft.technical_highlights = vec!["Exponential backoff".to_string()];
            Artifact::from_draft(draft).unwrap()
        }

        #[test]
        fn round_trip() {
            let original = artifact();
            let decoded = decode(COMMIT, &encode(&original).unwrap()).unwrap();
            assert_eq!(decoded, original);
        }

        #[test]
        fn garbage_is_corrupt() {
            let err = decode(COMMIT, "just some text a human wrote").unwrap_err();
            assert!(matches!(err, StoreError::Corrupt { .. }));
        }

        #[test]
        fn invalid_enum_is_corrupt() {
            let yaml = encode(&artifact())
                .unwrap()
                .replace("category: feature", "category: wizardry");
            assert!(matches!(decode(COMMIT, &yaml), Err(StoreError::Corrupt { .. })));
        }

        #[test]
        fn empty_intent_is_corrupt() {
            let yaml = encode(&artifact())
                .unwrap()
                .replace("intent_summary: Add retry to fetch", "intent_summary: ''");
            assert!(matches!(decode(COMMIT, &yaml), Err(StoreError::Corrupt { .. })));
        }

        #[test]
        fn mismatched_commit_is_corrupt() {
            let other = "f".repeat(40);
            assert!(matches!(
                decode(&other, &encode(&artifact()).unwrap()),
                Err(StoreError::Corrupt { .. })
            ));
        }

        #[test]
        fn unknown_keys_are_tolerated() {
            let yaml = format!("{}reviewed_by: someone\n", encode(&artifact()).unwrap());
            assert!(decode(COMMIT, &yaml).is_ok());
        }
    }
}
