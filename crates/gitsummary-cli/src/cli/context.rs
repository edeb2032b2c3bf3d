use anyhow::{Context, Result};
use gitsummary::services::{ConfigService, ProjectConfig};
use gitsummary::store::NotesStore;
use gitsummary::vcs::{GitRepository, VcsReader};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Repository, configuration and store opened for one command.
pub struct RepoContext {
    pub config: ProjectConfig,
    pub vcs: Arc<GitRepository>,
    pub store: Arc<NotesStore>,
}

impl RepoContext {
    pub fn open(path: &Path) -> Result<Self> {
        let vcs = GitRepository::discover(path)?;
        let root = vcs.root().to_path_buf();
        let config = ConfigService::new(&root)
            .load()
            .with_context(|| format!("Failed to load configuration for {}", root.display()))?;
        let store = NotesStore::open(&root, &config.storage.notes_ref)?;

        debug!(
            root = %root.display(),
            notes_ref = %config.storage.notes_ref,
            extractors = ?config.analysis.extractors,
            "Opened repository"
        );

        Ok(Self {
            config,
            vcs: Arc::new(vcs),
            store: Arc::new(store),
        })
    }

    /// Commit ids for a revision or range, newest first
    pub fn resolve(&self, revision: &str) -> Result<Vec<String>> {
        Ok(self.vcs.resolve(revision)?)
    }
}

/// First eight characters of a commit id
pub fn short(commit_id: &str) -> &str {
    commit_id.get(..8).unwrap_or(commit_id)
}
