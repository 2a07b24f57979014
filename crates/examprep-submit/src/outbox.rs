//! File outbox: one JSON file per submitted attempt.
//!
//! Files are written under a temporary name and renamed into place, so a
//! reader polling the directory never sees a half-written payload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use examprep_core::results::SubmissionPayload;
use examprep_core::traits::ResultSink;

use crate::error::SinkError;

/// Writes each submission to `<dir>/<test_id>-<attempt_id>.json`.
#[derive(Debug, Clone)]
pub struct FileOutbox {
    dir: PathBuf,
}

impl FileOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a payload lands in this outbox.
    pub fn path_for(&self, payload: &SubmissionPayload) -> PathBuf {
        let test_id: String = payload
            .test_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir
            .join(format!("{test_id}-{}.json", payload.attempt_id))
    }

    async fn write(&self, payload: &SubmissionPayload) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;

        let path = self.path_for(payload);
        if tokio::fs::try_exists(&path).await.map_err(io_err(&path))? {
            return Err(SinkError::Rejected(format!(
                "attempt {} is already in the outbox",
                payload.attempt_id
            )));
        }

        let json = serde_json::to_vec_pretty(payload)?;
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            discard_tmp(&tmp).await;
            return Err(io_err(&tmp)(e));
        }
        move_into_place(&tmp, &path).await?;
        Ok(path)
    }
}

/// Rename a finished temp file to its final name, removing it on failure.
async fn move_into_place(tmp: &Path, path: &Path) -> Result<(), SinkError> {
    if let Err(e) = tokio::fs::rename(tmp, path).await {
        discard_tmp(tmp).await;
        return Err(io_err(path)(e));
    }
    Ok(())
}

async fn discard_tmp(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %tmp.display(), "failed to remove temp file: {e}");
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError {
    let path = path.to_path_buf();
    move |source| SinkError::Io { path, source }
}

#[async_trait]
impl ResultSink for FileOutbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<()> {
        let path = self.write(payload).await?;
        tracing::debug!(path = %path.display(), "submission written to outbox");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examprep_core::results::{AttemptResult, SubmitTrigger};

    fn payload(test_id: &str) -> SubmissionPayload {
        let result = AttemptResult {
            test_id: test_id.into(),
            score: 2,
            total_questions: 3,
            percentage: 67,
            points: 8,
            time_spent_secs: 95,
            answers: vec![],
        };
        SubmissionPayload::new(result, SubmitTrigger::Timer, Some("u-1".into()))
    }

    #[tokio::test]
    async fn writes_one_file_per_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = FileOutbox::new(dir.path().join("outbox"));
        let p = payload("mock-1");

        outbox.submit(&p).await.unwrap();

        let path = outbox.path_for(&p);
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("mock-1-"));
        let loaded = SubmissionPayload::load_json(&path).unwrap();
        assert_eq!(loaded.attempt_id, p.attempt_id);
        assert_eq!(loaded.result.points, 8);
        assert_eq!(loaded.learner_id.as_deref(), Some("u-1"));

        let leftovers: Vec<_> = std::fs::read_dir(outbox.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn same_attempt_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = FileOutbox::new(dir.path());
        let p = payload("mock-1");

        outbox.submit(&p).await.unwrap();
        let err = outbox.submit(&p).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("t-1.json.tmp");
        let target = dir.path().join("t-1.json");
        std::fs::write(&tmp, b"{}").unwrap();
        // A non-empty directory cannot be replaced by a file.
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"").unwrap();

        let err = move_into_place(&tmp, &target).await.unwrap_err();
        assert!(matches!(err, SinkError::Io { ref path, .. } if path == &target));
        assert!(!tmp.exists());
        assert!(target.join("keep").exists());
    }

    #[tokio::test]
    async fn unwritable_outbox_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let outbox = FileOutbox::new(blocker.join("outbox"));
        let err = outbox.submit(&payload("mock-1")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::Io { .. })
        ));
    }

    #[test]
    fn unsafe_test_ids_are_sanitized() {
        let outbox = FileOutbox::new("/tmp/outbox");
        let p = payload("../chapter 3/quiz");
        let path = outbox.path_for(&p);
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/outbox"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("___chapter_3_quiz-"));
    }
}
