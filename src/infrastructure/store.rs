use crate::core::submission::{DeliveryError, Submission, SubmissionSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Submission log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Submission log encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub user_id: u64,
    pub telegram_username: Option<String>,
    pub provided_name: String,
    pub deal_info: String,
    pub screenshot_file_id: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Submission> for SubmissionRecord {
    fn from(submission: &Submission) -> Self {
        Self {
            user_id: submission.user_id.0,
            telegram_username: submission.username.clone(),
            provided_name: submission.name.clone(),
            deal_info: submission.deal.clone(),
            screenshot_file_id: submission.screenshot.file_id.clone(),
            timestamp: submission.submitted_at,
        }
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_all(&self) -> Result<Vec<SubmissionRecord>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn append_record(&self, record: SubmissionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut records = match self.load_all().await {
            Ok(records) => records,
            Err(StoreError::Json(e)) => {
                let backup = self.quarantine().await?;
                log::error!(
                    "Submission log {} is unreadable ({}); moved to {} and starting fresh.",
                    self.path.display(),
                    e,
                    backup.display()
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        records.push(record);
        self.write_all(&records).await
    }

    async fn write_all(&self, records: &[SubmissionRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = sibling(&self.path, "tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let backup = sibling(&self.path, &format!("corrupt-{}", Utc::now().timestamp()));
        fs::rename(&self.path, &backup).await?;
        Ok(backup)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}", suffix));
    path.with_file_name(name)
}

#[async_trait::async_trait]
impl SubmissionSink for JsonFileStore {
    async fn append(&self, submission: &Submission) -> Result<(), DeliveryError> {
        Ok(self.append_record(SubmissionRecord::from(submission)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission::ScreenshotRef;
    use std::sync::Arc;
    use teloxide::types::UserId;

    fn submission(user: u64, name: &str) -> Submission {
        Submission {
            user_id: UserId(user),
            username: None,
            name: name.to_string(),
            deal: format!("deal from {}", name),
            screenshot: ScreenshotRef {
                file_id: format!("file-{}", user),
                file_unique_id: format!("uniq-{}", user),
            },
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("loot_submissions.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appends_keep_earlier_records_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("loot_submissions.json"));
        store.append(&submission(1, "राहुल")).await.unwrap();
        store.append(&submission(2, "Asha")).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].provided_name, "राहुल");
        assert_eq!(records[1].screenshot_file_id, "file-2");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("राहुल"));
        assert!(raw.contains("\"deal_info\""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_all_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("log.json")));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(&submission(i, &format!("user{}", i))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut ids: Vec<u64> = store.load_all().await.unwrap().iter().map(|r| r.user_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn corrupt_log_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "[{ not json").unwrap();
        let store = JsonFileStore::new(&path);

        store.append(&submission(5, "Nina")).await.unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 1);
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("log.json.corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).unwrap(), "[{ not json");
    }
}
