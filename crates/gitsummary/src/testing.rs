//! Test utilities for the gitsummary crate
//!
//! Reusable doubles for the [`ArtifactStore`] and [`Extractor`] seams, shared by
//! unit tests and the integration tests under `tests/`.

use crate::error::{ExtractionError, StoreError};
use crate::extract::{ExtractionResult, Extractor, ExtractorKind, HeuristicExtractor};
use crate::services::types::Artifact;
use crate::store::{resolve_prefix_in, ArtifactStore, PrefixCandidate};
use crate::vcs::{CommitDiff, CommitInfo};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory artifact store.
///
/// Each save gets a fresh sequential artifact id, so a forced overwrite
/// changes the id the same way a rewritten git note does.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, (String, Artifact)>>,
    failing: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    saves: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every save for `commit_id` fail with a backend-style error.
    pub fn fail_saves_for(&self, commit_id: &str) {
        self.failing.lock().unwrap().insert(commit_id.to_string());
    }

    /// Number of successful saves so far
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn artifact_id(&self, commit_id: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(commit_id)
            .map(|(id, _)| id.clone())
    }
}

impl ArtifactStore for InMemoryStore {
    fn save(&self, artifact: &Artifact, force: bool) -> Result<(), StoreError> {
        let commit_id = artifact.commit_id().to_string();
        if self.failing.lock().unwrap().contains(&commit_id) {
            return Err(StoreError::Serialize {
                commit_id,
                reason: "simulated write failure".to_string(),
            });
        }

        let mut entries = self.entries.lock().unwrap();
        if !force && entries.contains_key(&commit_id) {
            return Err(StoreError::AlreadyExists { commit_id });
        }
        let id = format!("{:040x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        entries.insert(commit_id, (id, artifact.clone()));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, commit_id: &str) -> Result<Option<Artifact>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(commit_id)
            .map(|(_, a)| a.clone()))
    }

    fn exists(&self, commit_id: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().unwrap().contains_key(commit_id))
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<String, StoreError> {
        let candidates: Vec<PrefixCandidate> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(commit_id, (artifact_id, _))| PrefixCandidate {
                commit_id: commit_id.clone(),
                artifact_id: Some(artifact_id.clone()),
            })
            .collect();
        resolve_prefix_in(candidates, prefix)
    }
}

/// Extractor that returns a fixed result and counts its calls.
pub struct ScriptedExtractor {
    name: String,
    kind: ExtractorKind,
    qualitative: bool,
    result: ExtractionResult,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(name: &str, kind: ExtractorKind, result: ExtractionResult) -> Self {
        Self {
            name: name.to_string(),
            kind,
            qualitative: false,
            result,
            calls: AtomicUsize::new(0),
        }
    }

    /// Declare support for qualitative scores
    pub fn with_qualitative(mut self) -> Self {
        self.qualitative = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        _commit: &CommitInfo,
        _diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ExtractorKind {
        self.kind
    }

    fn supports_qualitative(&self) -> bool {
        self.qualitative
    }
}

/// Extractor that fails, either for every commit or only for selected ones.
/// Commits it does not fail for are handled by the heuristic rules.
pub struct FailingExtractor {
    name: String,
    kind: ExtractorKind,
    fail_for: Option<HashSet<String>>,
    heuristic: HeuristicExtractor,
}

impl FailingExtractor {
    pub fn always(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ExtractorKind::Llm,
            fail_for: None,
            heuristic: HeuristicExtractor::new(),
        }
    }

    pub fn for_commits<I, S>(name: &str, commit_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_for: Some(commit_ids.into_iter().map(Into::into).collect()),
            ..Self::always(name)
        }
    }
}

#[async_trait::async_trait]
impl Extractor for FailingExtractor {
    async fn extract(
        &self,
        commit: &CommitInfo,
        diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        let fails = self
            .fail_for
            .as_ref()
            .is_none_or(|ids| ids.contains(&commit.commit_id));
        if fails {
            return Err(ExtractionError::Failed {
                extractor: self.name.clone(),
                message: "provider returned HTTP 500".to_string(),
            });
        }
        self.heuristic.extract(commit, diff).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ExtractorKind {
        self.kind
    }
}

/// Extractor that sleeps before answering, for timeout tests.
pub struct SlowExtractor {
    name: String,
    delay: Duration,
}

impl SlowExtractor {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait::async_trait]
impl Extractor for SlowExtractor {
    async fn extract(
        &self,
        _commit: &CommitInfo,
        _diff: &CommitDiff,
    ) -> Result<ExtractionResult, ExtractionError> {
        tokio::time::sleep(self.delay).await;
        Ok(ExtractionResult::default())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Llm
    }
}
