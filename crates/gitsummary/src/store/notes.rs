use super::{decode, encode, resolve_prefix_in, ArtifactStore, PrefixCandidate};
use crate::error::StoreError;
use crate::services::types::Artifact;
use git2::{ErrorCode, Oid, Repository, Signature};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// [`ArtifactStore`] backed by a git notes ref.
///
/// Notes are anchored by a ref, so `git gc` never reclaims them, and they
/// leave commit ids untouched.
pub struct NotesStore {
    repo: Mutex<Repository>,
    notes_ref: String,
}

impl NotesStore {
    /// Open the repository containing `path`, storing notes under `notes_ref`.
    pub fn open(path: &Path, notes_ref: &str) -> Result<Self, StoreError> {
        let repo = Repository::discover(path)
            .map_err(|e| StoreError::backend(format!("open {}", path.display()), e))?;
        Ok(Self::from_repository(repo, notes_ref))
    }

    pub fn from_repository(repo: Repository, notes_ref: &str) -> Self {
        Self {
            repo: Mutex::new(repo),
            notes_ref: notes_ref.to_string(),
        }
    }

    pub fn notes_ref(&self) -> &str {
        &self.notes_ref
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Content-addressed id of the stored artifact (the note blob id).
    pub fn artifact_id(&self, commit_id: &str) -> Result<Option<String>, StoreError> {
        let Ok(oid) = Oid::from_str(commit_id) else {
            return Ok(None);
        };
        let repo = self.repo();
        let result = match repo.find_note(Some(&self.notes_ref), oid) {
            Ok(note) => Ok(Some(note.id().to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(StoreError::backend(format!("read note for {}", commit_id), e)),
        };
        result
    }

    /// Every stored entry. A missing notes ref means no entries.
    pub fn entries(&self) -> Result<Vec<PrefixCandidate>, StoreError> {
        let repo = self.repo();
        let notes = match repo.notes(Some(&self.notes_ref)) {
            Ok(notes) => notes,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::backend(format!("list {}", self.notes_ref), e)),
        };

        let mut entries = Vec::new();
        for item in notes {
            let (note_id, annotated_id) =
                item.map_err(|e| StoreError::backend(format!("list {}", self.notes_ref), e))?;
            entries.push(PrefixCandidate {
                commit_id: annotated_id.to_string(),
                artifact_id: Some(note_id.to_string()),
            });
        }
        Ok(entries)
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>, StoreError> {
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Signature::now("gitsummary", "gitsummary@localhost")
                .map_err(|e| StoreError::backend("build note signature", e)),
        }
    }
}

impl ArtifactStore for NotesStore {
    fn save(&self, artifact: &Artifact, force: bool) -> Result<(), StoreError> {
        let commit_id = artifact.commit_id();
        let oid = Oid::from_str(commit_id)
            .map_err(|e| StoreError::backend(format!("parse commit id {}", commit_id), e))?;

        if !force && self.exists(commit_id)? {
            return Err(StoreError::AlreadyExists {
                commit_id: commit_id.to_string(),
            });
        }

        let content = encode(artifact)?;
        let repo = self.repo();
        let sig = Self::signature(&repo)?;
        let note_id = repo
            .note(&sig, &sig, Some(&self.notes_ref), oid, &content, force)
            .map_err(|e| match e.code() {
                ErrorCode::Exists => StoreError::AlreadyExists {
                    commit_id: commit_id.to_string(),
                },
                _ => StoreError::backend(format!("write note for {}", commit_id), e),
            })?;

        debug!(
            commit = %commit_id,
            note = %note_id,
            notes_ref = %self.notes_ref,
            force,
            "Wrote artifact note"
        );
        Ok(())
    }

    fn load(&self, commit_id: &str) -> Result<Option<Artifact>, StoreError> {
        let Ok(oid) = Oid::from_str(commit_id) else {
            return Ok(None);
        };
        let repo = self.repo();
        let note = match repo.find_note(Some(&self.notes_ref), oid) {
            Ok(note) => note,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::backend(
                    format!("read note for {}", commit_id),
                    e,
                ))
            },
        };

        let content = note.message().ok_or_else(|| StoreError::Corrupt {
            commit_id: commit_id.to_string(),
            reason: "note is not valid UTF-8".to_string(),
        })?;
        decode(commit_id, content).map(Some)
    }

    fn exists(&self, commit_id: &str) -> Result<bool, StoreError> {
        Ok(self.artifact_id(commit_id)?.is_some())
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<String, StoreError> {
        resolve_prefix_in(self.entries()?, prefix)
    }
}
