use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRef {
    pub file_id: String,
    pub file_unique_id: String,
}

impl ScreenshotRef {
    pub fn best_of(variants: &[ImageVariant]) -> Option<Self> {
        variants
            .iter()
            .max_by_key(|v| (u64::from(v.width) * u64::from(v.height), v.file_size))
            .map(|v| ScreenshotRef {
                file_id: v.file_id.clone(),
                file_unique_id: v.file_unique_id.clone(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
    pub deal: String,
    pub screenshot: ScreenshotRef,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("Persistence failed: {0}")]
    Store(#[from] crate::infrastructure::store::StoreError),
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait::async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn append(&self, submission: &Submission) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, width: u32, height: u32, file_size: u32) -> ImageVariant {
        ImageVariant {
            file_id: id.to_string(),
            file_unique_id: format!("u-{}", id),
            width,
            height,
            file_size,
        }
    }

    #[test]
    fn best_of_picks_largest_area() {
        let variants = vec![
            variant("small", 90, 160, 1_000),
            variant("large", 720, 1280, 90_000),
            variant("medium", 320, 568, 20_000),
        ];
        let best = ScreenshotRef::best_of(&variants).unwrap();
        assert_eq!(best.file_id, "large");
        assert_eq!(best.file_unique_id, "u-large");
    }

    #[test]
    fn best_of_breaks_ties_by_file_size() {
        let variants = vec![variant("a", 100, 100, 10), variant("b", 100, 100, 20)];
        assert_eq!(ScreenshotRef::best_of(&variants).unwrap().file_id, "b");
    }

    #[test]
    fn best_of_empty_is_none() {
        assert!(ScreenshotRef::best_of(&[]).is_none());
    }
}
