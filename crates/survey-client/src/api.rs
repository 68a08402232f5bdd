use async_trait::async_trait;
use survey::{DatasetInfo, Progress, Rating, ServedSample};

/// Survey endpoints the session needs.
#[async_trait]
pub trait SurveyApi: Send + Sync {
    async fn dataset_info(&self) -> crate::Result<DatasetInfo>;
    async fn sample(&self, position: usize) -> crate::Result<ServedSample>;
    async fn ratings(&self) -> crate::Result<Vec<Rating>>;
    async fn submit_rating(&self, content_hash: &str, label: bool) -> crate::Result<()>;
    async fn progress(&self) -> crate::Result<Progress>;
}
