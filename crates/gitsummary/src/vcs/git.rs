use super::{CommitDiff, CommitInfo, FileChange, FileStatus, VcsReader};
use crate::error::VcsError;
use chrono::{DateTime, Utc};
use git2::{Delta, DiffFindOptions, DiffOptions, Oid, Patch, Repository, RevparseMode, Sort};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Revision resolver and commit reader backed by libgit2.
pub struct GitRepository {
    root: PathBuf,
    repo: Mutex<Repository>,
}

impl GitRepository {
    /// Open the repository containing `path` (walks up to the enclosing work tree).
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(path).map_err(|e| VcsError::Repository {
            path: path.display().to_string(),
            reason: e.message().to_string(),
        })?;
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        Ok(Self {
            root,
            repo: Mutex::new(repo),
        })
    }

    /// Work tree root (or the git dir for bare repositories).
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn invalid(revision: &str, err: git2::Error) -> VcsError {
        VcsError::InvalidRevision {
            revision: revision.to_string(),
            reason: err.message().to_string(),
        }
    }

    fn find_commit<'r>(
        repo: &'r Repository,
        commit_id: &str,
    ) -> Result<git2::Commit<'r>, VcsError> {
        let not_found = || VcsError::CommitNotFound {
            commit_id: commit_id.to_string(),
        };
        let oid = Oid::from_str(commit_id).map_err(|_| not_found())?;
        repo.find_commit(oid).map_err(|_| not_found())
    }

    fn to_info(commit: &git2::Commit<'_>) -> CommitInfo {
        let author = commit.author();
        let commit_id = commit.id().to_string();
        let short_id = commit
            .as_object()
            .short_id()
            .ok()
            .and_then(|buf| buf.as_str().map(str::to_string))
            .unwrap_or_else(|| commit_id.chars().take(7).collect());
        let timestamp =
            DateTime::<Utc>::from_timestamp(author.when().seconds(), 0).unwrap_or_default();

        CommitInfo {
            commit_id,
            short_id,
            author_name: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            timestamp,
            summary_line: commit.summary().unwrap_or("").trim().to_string(),
            full_message: commit.message().unwrap_or("").trim_end().to_string(),
            parent_ids: commit.parent_ids().map(|id| id.to_string()).collect(),
        }
    }

    fn diff_commit(repo: &Repository, commit: &git2::Commit<'_>) -> Result<CommitDiff, VcsError> {
        let commit_id = commit.id().to_string();
        let ctx = |what: &str| format!("{} of {}", what, commit_id);

        let tree = commit.tree().map_err(|e| VcsError::git(ctx("tree"), e))?;
        let parent_tree = if commit.parent_count() > 0 {
            let parent = commit
                .parent(0)
                .map_err(|e| VcsError::git(ctx("first parent"), e))?;
            Some(parent.tree().map_err(|e| VcsError::git(ctx("parent tree"), e))?)
        } else {
            None
        };

        let mut opts = DiffOptions::new();
        let mut diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .map_err(|e| VcsError::git(ctx("diff"), e))?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))
            .map_err(|e| VcsError::git(ctx("rename detection"), e))?;

        let mut files = Vec::new();
        let mut patch_text = String::new();

        for (idx, delta) in diff.deltas().enumerate() {
            let status = match delta.status() {
                Delta::Added | Delta::Untracked => FileStatus::Added,
                Delta::Deleted => FileStatus::Deleted,
                Delta::Renamed => FileStatus::Renamed,
                Delta::Copied => FileStatus::Copied,
                Delta::Typechange => FileStatus::TypeChanged,
                _ => FileStatus::Modified,
            };
            let new_path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
            let path = new_path.clone().or_else(|| old_path.clone()).unwrap_or_default();

            let (insertions, deletions) = match Patch::from_diff(&diff, idx)
                .map_err(|e| VcsError::git(ctx("patch"), e))?
            {
                Some(mut patch) => {
                    let (_, added, removed) = patch
                        .line_stats()
                        .map_err(|e| VcsError::git(ctx("line stats"), e))?;
                    let buf = patch
                        .to_buf()
                        .map_err(|e| VcsError::git(ctx("patch text"), e))?;
                    patch_text.push_str(&String::from_utf8_lossy(&buf));
                    (added, removed)
                },
                None => (0, 0),
            };

            files.push(FileChange {
                path,
                old_path: match status {
                    FileStatus::Renamed | FileStatus::Copied => old_path,
                    _ => None,
                },
                status,
                insertions,
                deletions,
            });
        }

        Ok(CommitDiff {
            files,
            patch: patch_text,
        })
    }
}

impl VcsReader for GitRepository {
    fn resolve(&self, revision: &str) -> Result<Vec<String>, VcsError> {
        let revision = revision.trim();
        if revision.is_empty() {
            return Err(VcsError::InvalidRevision {
                revision: String::new(),
                reason: "empty revision".to_string(),
            });
        }

        let repo = self.repo();
        let spec = repo
            .revparse(revision)
            .map_err(|e| Self::invalid(revision, e))?;

        if spec.mode().contains(RevparseMode::SINGLE) {
            let object = spec.from().ok_or_else(|| VcsError::InvalidRevision {
                revision: revision.to_string(),
                reason: "revision resolved to nothing".to_string(),
            })?;
            let commit = object
                .peel_to_commit()
                .map_err(|e| Self::invalid(revision, e))?;
            return Ok(vec![commit.id().to_string()]);
        }

        let (Some(from), Some(to)) = (spec.from(), spec.to()) else {
            return Err(VcsError::InvalidRevision {
                revision: revision.to_string(),
                reason: "range is missing an endpoint".to_string(),
            });
        };
        let from = from
            .peel_to_commit()
            .map_err(|e| Self::invalid(revision, e))?
            .id();
        let to = to
            .peel_to_commit()
            .map_err(|e| Self::invalid(revision, e))?
            .id();

        let ctx = format!("history for {}", revision);
        let mut walk = repo.revwalk().map_err(|e| VcsError::git(&ctx, e))?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| VcsError::git(&ctx, e))?;
        walk.push(to).map_err(|e| VcsError::git(&ctx, e))?;

        if spec.mode().contains(RevparseMode::MERGE_BASE) {
            // A...B: commits reachable from either side but not from both
            walk.push(from).map_err(|e| VcsError::git(&ctx, e))?;
            if let Ok(base) = repo.merge_base(from, to) {
                walk.hide(base).map_err(|e| VcsError::git(&ctx, e))?;
            }
        } else {
            walk.hide(from).map_err(|e| VcsError::git(&ctx, e))?;
        }

        walk.map(|oid| {
            oid.map(|id| id.to_string())
                .map_err(|e| VcsError::git(&ctx, e))
        })
        .collect()
    }

    fn commit_info(&self, commit_id: &str) -> Result<CommitInfo, VcsError> {
        let repo = self.repo();
        let commit = Self::find_commit(&repo, commit_id)?;
        Ok(Self::to_info(&commit))
    }

    fn read_commit(&self, commit_id: &str) -> Result<(CommitInfo, CommitDiff), VcsError> {
        let repo = self.repo();
        let commit = Self::find_commit(&repo, commit_id)?;
        let info = Self::to_info(&commit);
        let diff = Self::diff_commit(&repo, &commit)?;
        Ok((info, diff))
    }
}
