//! Advisory local record of upload sessions.
//!
//! One JSON file per object under a session directory (by convention
//! `.barge-upload/` beside the file being uploaded). The record only exists
//! to let a restarted client name the session it previously opened; the
//! coordinator's state is always authoritative, and a missing or stale
//! record merely degrades to a fresh initiate or a conflict error.

use barge_core::{ObjectId, UploadId, UploadSpecification};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory name used next to upload sources.
pub const SESSION_DIR_NAME: &str = ".barge-upload";

/// File-per-object session records with an explicit lifecycle:
/// [`save`](Self::save) at initiate, [`close`](Self::close) after finalize.
#[derive(Clone, Debug)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The conventional store for uploads of `file`: a `.barge-upload/`
    /// directory in the file's parent directory.
    pub fn beside(file: &Path) -> Self {
        let parent = file.parent().unwrap_or_else(|| Path::new("."));
        Self::new(parent.join(SESSION_DIR_NAME))
    }

    fn record_path(&self, object_id: &ObjectId) -> PathBuf {
        self.root.join(format!("{object_id}.json"))
    }

    /// Persist the session record for the specification's object.
    pub fn save(&self, spec: &UploadSpecification) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let json = serde_json::to_vec_pretty(spec)?;
        std::fs::write(self.record_path(&spec.object_id), json)
    }

    /// The locally recorded upload id, if a readable record exists. A
    /// corrupt record is treated as absent; the record is advisory.
    pub fn fetch_upload_id(&self, object_id: &ObjectId) -> io::Result<Option<UploadId>> {
        let path = self.record_path(object_id);
        let json = match std::fs::read(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        match serde_json::from_slice::<UploadSpecification>(&json) {
            Ok(spec) => Ok(Some(spec.upload_id)),
            Err(err) => {
                warn!(object_id = %object_id, error = %err, "unreadable session record; ignoring");
                Ok(None)
            }
        }
    }

    /// Remove the record once the upload has been finalized or abandoned.
    pub fn close(&self, object_id: &ObjectId) -> io::Result<()> {
        match std::fs::remove_file(self.record_path(object_id)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        // Leave no empty directory behind; other records keep it alive.
        let _ = std::fs::remove_dir(&self.root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barge_core::Part;
    use tempfile::TempDir;

    fn spec(object_id: &str, upload_id: &str) -> UploadSpecification {
        UploadSpecification::new(
            format!("data/{object_id}"),
            ObjectId::from(object_id),
            UploadId::from(upload_id),
            vec![Part::new(1, 0, 100)],
        )
    }

    #[test]
    fn test_save_fetch_close_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(SESSION_DIR_NAME));
        let object_id = ObjectId::from("obj-1");

        assert!(store.fetch_upload_id(&object_id).unwrap().is_none());

        store.save(&spec("obj-1", "up-1")).unwrap();
        let fetched = store.fetch_upload_id(&object_id).unwrap().unwrap();
        assert!(fetched.matches(&UploadId::from("up-1")));

        store.close(&object_id).unwrap();
        assert!(store.fetch_upload_id(&object_id).unwrap().is_none());
        // Closing twice is fine.
        store.close(&object_id).unwrap();
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(dir.path().join("obj-1.json"), b"not json").unwrap();
        assert!(store
            .fetch_upload_id(&ObjectId::from("obj-1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_beside_points_into_parent_directory() {
        let store = SessionStore::beside(Path::new("/tmp/uploads/big.bin"));
        assert_eq!(
            store.record_path(&ObjectId::from("obj-1")),
            PathBuf::from("/tmp/uploads/.barge-upload/obj-1.json")
        );
    }
}
