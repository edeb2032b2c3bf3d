pub mod git;

pub use git::GitRepository;

use crate::error::VcsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a single commit, as read from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub commit_id: String,
    pub short_id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub summary_line: String,
    pub full_message: String,
    pub parent_ids: Vec<String>,
}

impl CommitInfo {
    /// Message body without the summary line.
    pub fn body(&self) -> &str {
        self.full_message
            .split_once('\n')
            .map(|(_, rest)| rest.trim())
            .unwrap_or("")
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }
}

/// How a file was touched by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::TypeChanged => "type_changed",
        };
        write!(f, "{}", s)
    }
}

/// Per-file diff statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub insertions: usize,
    pub deletions: usize,
}

/// Diff of a commit against its first parent (or the empty tree for root commits).
///
/// No size limit is applied: very large patches are passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDiff {
    pub files: Vec<FileChange>,
    pub patch: String,
}

impl CommitDiff {
    pub fn insertions(&self) -> usize {
        self.files.iter().map(|f| f.insertions).sum()
    }

    pub fn deletions(&self) -> usize {
        self.files.iter().map(|f| f.deletions).sum()
    }

    pub fn file_paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// Read-only access to commit history.
///
/// Implementations must keep the three failure modes distinguishable:
/// an unknown revision is `VcsError::InvalidRevision`, a valid but empty
/// range is `Ok(vec![])`, and an unresolvable commit id is
/// `VcsError::CommitNotFound`.
#[cfg_attr(test, mockall::automock)]
pub trait VcsReader: Send + Sync {
    /// Resolve a single revision or an `A..B` / `A...B` range into full commit
    /// ids, newest first. A single revision yields exactly that commit.
    fn resolve(&self, revision: &str) -> Result<Vec<String>, VcsError>;

    /// Commit metadata without computing a diff.
    fn commit_info(&self, commit_id: &str) -> Result<CommitInfo, VcsError>;

    /// Commit metadata plus its diff summary and patch text.
    fn read_commit(&self, commit_id: &str) -> Result<(CommitInfo, CommitDiff), VcsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(message: &str, parents: usize) -> CommitInfo {
        CommitInfo {
            commit_id: "a".repeat(40),
            short_id: "aaaaaaa".to_string(),
            author_name: "Test".to_string(),
            author_email: "test@example.com".to_string(),
            timestamp: Utc::now(),
            summary_line: message.lines().next().unwrap_or("").to_string(),
            full_message: message.to_string(),
            parent_ids: (0..parents).map(|i| format!("{:040}", i)).collect(),
        }
    }

    #[test]
    fn body_excludes_summary_line() {
        let info = commit("fix: thing\n\nLonger explanation\nsecond line", 1);
        assert_eq!(info.body(), "Longer explanation\nsecond line");
    }

    #[test]
    fn body_empty_for_single_line_message() {
        assert_eq!(commit("chore: bump", 1).body(), "");
    }

    #[test]
    fn merge_detection_uses_parent_count() {
        assert!(!commit("x", 1).is_merge());
        assert!(commit("x", 2).is_merge());
    }

    #[test]
    fn diff_totals_sum_files() {
        let diff = CommitDiff {
            files: vec![
                FileChange {
                    path: "a.rs".into(),
                    old_path: None,
                    status: FileStatus::Modified,
                    insertions: 3,
                    deletions: 1,
                },
                FileChange {
                    path: "b.rs".into(),
                    old_path: None,
                    status: FileStatus::Added,
                    insertions: 10,
                    deletions: 0,
                },
            ],
            patch: String::new(),
        };
        assert_eq!(diff.insertions(), 13);
        assert_eq!(diff.deletions(), 1);
        assert_eq!(diff.file_paths(), vec!["a.rs", "b.rs"]);
    }
}
