use super::pipeline::ExtractionPipeline;
use super::types::Artifact;
use crate::error::{FailureKind, VcsError};
use crate::store::ArtifactStore;
use crate::vcs::VcsReader;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Flags for one batch run
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Overwrite existing artifacts
    pub force: bool,
    /// Re-run extraction for commits that already have an artifact
    pub reanalyze_existing: bool,
    /// Extract but never write; artifacts are returned in `previews`
    pub dry_run: bool,
}

impl AnalyzeOptions {
    fn overwrites(&self) -> bool {
        self.force || self.reanalyze_existing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCommit {
    pub commit_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCommit {
    pub commit_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one batch run. Lists follow resolver order (newest first).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisRunResult {
    pub analyzed: Vec<String>,
    pub skipped: Vec<SkippedCommit>,
    pub failed: Vec<FailedCommit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<Artifact>,
}

impl AnalysisRunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.analyzed.len() + self.skipped.len() + self.failed.len() + self.previews.len()
    }

    fn fail(&mut self, commit_id: &str, kind: FailureKind, message: String) {
        warn!(commit = %commit_id, kind = %kind, error = %message, "Commit analysis failed");
        self.failed.push(FailedCommit {
            commit_id: commit_id.to_string(),
            kind,
            message,
        });
    }
}

/// Drives resolver, reader, pipeline and store across a revision range.
///
/// Commits are processed one at a time in resolver order. Each commit is
/// written on its own, so an interrupted run leaves every earlier artifact
/// intact. A single commit's failure never aborts the batch; only an
/// unresolvable revision does.
pub struct AnalyzerService {
    vcs: Arc<dyn VcsReader>,
    store: Arc<dyn ArtifactStore>,
    pipeline: ExtractionPipeline,
}

impl AnalyzerService {
    pub fn new(
        vcs: Arc<dyn VcsReader>,
        store: Arc<dyn ArtifactStore>,
        pipeline: ExtractionPipeline,
    ) -> Self {
        Self {
            vcs,
            store,
            pipeline,
        }
    }

    pub async fn analyze_range(
        &self,
        revision: &str,
        options: AnalyzeOptions,
    ) -> Result<AnalysisRunResult, VcsError> {
        let commit_ids = self.vcs.resolve(revision)?;
        info!(revision, commits = commit_ids.len(), "Analyzing range");
        Ok(self.analyze_commits(&commit_ids, options).await)
    }

    pub async fn analyze_commits(
        &self,
        commit_ids: &[String],
        options: AnalyzeOptions,
    ) -> AnalysisRunResult {
        let mut result = AnalysisRunResult::default();

        for commit_id in commit_ids {
            let exists = match self.store.exists(commit_id) {
                Ok(exists) => exists,
                Err(e) => {
                    result.fail(commit_id, FailureKind::from(&e), e.to_string());
                    continue;
                },
            };

            if exists && !options.overwrites() {
                debug!(commit = %commit_id, "Artifact exists, skipping");
                result.skipped.push(SkippedCommit {
                    commit_id: commit_id.clone(),
                    reason: "already analyzed".to_string(),
                });
                continue;
            }

            let (commit, diff) = match self.vcs.read_commit(commit_id) {
                Ok(read) => read,
                Err(e) => {
                    result.fail(commit_id, FailureKind::from(&e), e.to_string());
                    continue;
                },
            };

            let artifact = match self.pipeline.run(&commit, &diff).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    result.fail(commit_id, FailureKind::from(&e), e.to_string());
                    continue;
                },
            };

            if options.dry_run {
                debug!(commit = %commit.short_id, "Dry run, not writing");
                result.previews.push(artifact);
                continue;
            }

            match self.store.save(&artifact, exists) {
                Ok(()) => {
                    info!(
                        commit = %commit.short_id,
                        category = %artifact.category(),
                        mode = %artifact.analysis_meta().mode,
                        overwritten = exists,
                        "Stored artifact"
                    );
                    result.analyzed.push(commit_id.clone());
                },
                Err(e) => result.fail(commit_id, FailureKind::from(&e), e.to_string()),
            }
        }

        info!(
            analyzed = result.analyzed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            previews = result.previews.len(),
            "Analysis finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, HeuristicExtractor};
    use crate::testing::{FailingExtractor, InMemoryStore};
    use crate::vcs::{CommitDiff, CommitInfo, MockVcsReader};
    use chrono::Utc;
    use std::time::Duration;

    fn id(n: u8) -> String {
        format!("{:02x}", n).repeat(20)
    }

    fn info(commit_id: &str, message: &str) -> CommitInfo {
        CommitInfo {
            commit_id: commit_id.to_string(),
            short_id: commit_id[..7].to_string(),
            author_name: "Test".to_string(),
            author_email: "test@example.com".to_string(),
            timestamp: Utc::now(),
            summary_line: message.to_string(),
            full_message: message.to_string(),
            parent_ids: vec![],
        }
    }

    fn mock_vcs(ids: Vec<String>) -> MockVcsReader {
        let mut vcs = MockVcsReader::new();
        let resolved = ids.clone();
        vcs.expect_resolve().returning(move |_| Ok(resolved.clone()));
        vcs.expect_read_commit().returning(move |commit_id| {
            if ids.iter().any(|i| i == commit_id) {
                Ok((info(commit_id, "fix: something"), CommitDiff::default()))
            } else {
                Err(VcsError::CommitNotFound {
                    commit_id: commit_id.to_string(),
                })
            }
        });
        vcs
    }

    fn service(
        vcs: MockVcsReader,
        store: Arc<InMemoryStore>,
        extractors: Vec<Arc<dyn Extractor>>,
    ) -> AnalyzerService {
        AnalyzerService::new(
            Arc::new(vcs),
            store,
            ExtractionPipeline::new(extractors, Duration::from_secs(5)),
        )
    }

    fn heuristic() -> Vec<Arc<dyn Extractor>> {
        vec![Arc::new(HeuristicExtractor::new())]
    }

    #[tokio::test]
    async fn second_run_skips_existing() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(mock_vcs(vec![id(1), id(2)]), store.clone(), heuristic());

        let first = svc.analyze_range("HEAD~2..HEAD", AnalyzeOptions::default()).await.unwrap();
        assert_eq!(first.analyzed, vec![id(1), id(2)]);

        let second = svc.analyze_range("HEAD~2..HEAD", AnalyzeOptions::default()).await.unwrap();
        assert!(second.analyzed.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(store.saves(), 2);
    }

    #[tokio::test]
    async fn force_and_reanalyze_overwrite() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(mock_vcs(vec![id(1)]), store.clone(), heuristic());
        svc.analyze_range("x", AnalyzeOptions::default()).await.unwrap();

        let forced = AnalyzeOptions {
            force: true,
            ..Default::default()
        };
        assert_eq!(svc.analyze_range("x", forced).await.unwrap().analyzed, vec![id(1)]);

        let reanalyze = AnalyzeOptions {
            reanalyze_existing: true,
            ..Default::default()
        };
        assert_eq!(svc.analyze_range("x", reanalyze).await.unwrap().analyzed, vec![id(1)]);
        assert_eq!(store.saves(), 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_writes() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(mock_vcs(vec![id(1), id(2)]), store.clone(), heuristic());
        let options = AnalyzeOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = svc.analyze_range("x", options).await.unwrap();

        assert!(result.analyzed.is_empty());
        assert_eq!(result.previews.len(), 2);
        assert_eq!(result.previews[0].commit_id(), id(1));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn one_failing_commit_does_not_abort_batch() {
        let store = Arc::new(InMemoryStore::new());
        let ids = vec![id(1), id(2), id(3)];
        let svc = service(
            mock_vcs(ids.clone()),
            store.clone(),
            vec![Arc::new(FailingExtractor::for_commits("llm", [id(2)]))],
        );

        let result = svc.analyze_range("x", AnalyzeOptions::default()).await.unwrap();

        assert_eq!(result.analyzed, vec![id(1), id(3)]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].commit_id, id(2));
        assert_eq!(result.failed[0].kind, FailureKind::ExtractionFailed);
        assert!(!result.is_success());
        assert!(!store.exists(&id(2)).unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn all_failures_still_complete() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(
            mock_vcs(vec![id(1), id(2)]),
            store.clone(),
            vec![Arc::new(FailingExtractor::always("llm"))],
        );
        let result = svc.analyze_range("x", AnalyzeOptions::default()).await.unwrap();
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.total(), 2);
    }

    #[tokio::test]
    async fn missing_commit_is_classified() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(mock_vcs(vec![id(1)]), store, heuristic());
        let result = svc
            .analyze_commits(&[id(1), id(9)], AnalyzeOptions::default())
            .await;
        assert_eq!(result.analyzed, vec![id(1)]);
        assert_eq!(result.failed[0].kind, FailureKind::CommitNotFound);
        assert!(result.failed[0].message.contains(&id(9)));
    }

    #[tokio::test]
    async fn storage_failure_is_classified() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_saves_for(&id(1));
        let svc = service(mock_vcs(vec![id(1)]), store, heuristic());
        let result = svc.analyze_range("x", AnalyzeOptions::default()).await.unwrap();
        assert_eq!(result.failed[0].kind, FailureKind::Storage);
    }

    #[tokio::test]
    async fn empty_range_gives_empty_result() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(mock_vcs(vec![]), store, heuristic());
        let result = svc.analyze_range("HEAD..HEAD", AnalyzeOptions::default()).await.unwrap();
        assert_eq!(result.total(), 0);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn invalid_revision_aborts_run() {
        let mut vcs = MockVcsReader::new();
        vcs.expect_resolve().returning(|rev| {
            Err(VcsError::InvalidRevision {
                revision: rev.to_string(),
                reason: "unknown".to_string(),
            })
        });
        let svc = service(vcs, Arc::new(InMemoryStore::new()), heuristic());
        let err = svc.analyze_range("nope", AnalyzeOptions::default()).await.unwrap_err();
        assert!(matches!(err, VcsError::InvalidRevision { .. }));
    }
}
