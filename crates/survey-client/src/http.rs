use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use survey::{DatasetInfo, Progress, Rating, RatingSubmission, ServedSample};

use crate::{ClientError, Result, SurveyApi};

pub struct HttpSurveyApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSurveyApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:3001/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// URL the rating export can be downloaded from.
    pub fn download_url(&self) -> String {
        self.url("/ratings/download")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        Ok(check(resp).await?.json().await?)
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<serde_json::Value>().await {
        Ok(body) => body["error"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string(),
        Err(_) => status.to_string(),
    };
    Err(ClientError::Status { status: status.as_u16(), message })
}

#[async_trait]
impl SurveyApi for HttpSurveyApi {
    async fn dataset_info(&self) -> Result<DatasetInfo> {
        self.get_json("/dataset/info").await
    }

    async fn sample(&self, position: usize) -> Result<ServedSample> {
        self.get_json(&format!("/samples/{position}")).await
    }

    async fn ratings(&self) -> Result<Vec<Rating>> {
        self.get_json("/ratings").await
    }

    async fn submit_rating(&self, content_hash: &str, label: bool) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/ratings"))
            .json(&RatingSubmission::new(content_hash, label))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn progress(&self) -> Result<Progress> {
        self.get_json("/ratings/progress").await
    }
}
