// Shared git fixtures for integration tests
#![allow(dead_code)]

use git2::{Oid, Repository, Signature};
use gitsummary::services::ExtractionPipeline;
use gitsummary::extract::{Extractor, HeuristicExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const NOTES_REF: &str = "refs/notes/intent";

/// Create a temporary git repository with a configured user
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Write files, stage them and commit on HEAD
pub fn add_commit(repo: &Repository, files: &[(&str, &str)], message: &str) -> Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let mut index = repo.index().unwrap();

    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }

    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Repository with a base commit followed by c1 (fix in auth.py) and c2 (readme docs).
pub fn fix_and_docs_repo() -> (TempDir, PathBuf, Oid, Oid, Oid) {
    let (dir, path, repo) = create_test_repo();
    let base = add_commit(
        &repo,
        &[
            ("auth.py", "def login(user):\n    return user.name\n"),
            ("README.md", "# app\n"),
        ],
        "chore: initial import",
    );
    let c1 = add_commit(
        &repo,
        &[(
            "auth.py",
            "def login(user):\n    if user is None:\n        return None\n    return user.name\n",
        )],
        "fix: null check",
    );
    let c2 = add_commit(
        &repo,
        &[("README.md", "# app\n\nUsage notes.\n")],
        "docs: update readme",
    );
    (dir, path, base, c1, c2)
}

pub fn heuristic_pipeline() -> ExtractionPipeline {
    let extractors: Vec<Arc<dyn Extractor>> = vec![Arc::new(HeuristicExtractor::new())];
    ExtractionPipeline::new(extractors, Duration::from_secs(5))
}
