use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{Draft, DraftStore, DraftStoreError, DraftType, sort_drafts};

/// JSON-over-HTTP draft store client.
///
/// - `GET {base}/speakers/{id}/drafts?types=AD,LD&limit=5` → `[Draft]`
/// - `GET {base}/drafts/{id}` → [`Draft`] (404 means unknown)
#[derive(Debug, Clone)]
pub struct HttpDraftStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDraftStore {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(base_url: &str) -> Result<Self, DraftStoreError> {
        let base_url = Url::parse(base_url).map_err(|e| DraftStoreError::RequestFailed {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DraftStoreError::RequestFailed {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DraftStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DraftStoreError::RequestFailed {
                url: self.base_url.to_string(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<Option<reqwest::Response>, DraftStoreError> {
        debug!(%url, "Draft store request");
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            DraftStoreError::RequestFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(DraftStoreError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl DraftStore for HttpDraftStore {
    async fn get_drafts_for_speaker(
        &self,
        speaker_id: &str,
        types: &[DraftType],
        limit: Option<usize>,
    ) -> Result<Vec<Draft>, DraftStoreError> {
        let mut url = self.url(&["speakers", speaker_id, "drafts"])?;
        {
            let mut query = url.query_pairs_mut();
            let types: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            query.append_pair("types", &types.join(","));
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }

        let Some(response) = self.send(url).await? else {
            return Ok(Vec::new());
        };

        let mut drafts: Vec<Draft> = response
            .json()
            .await
            .map_err(|e| DraftStoreError::InvalidResponse(e.to_string()))?;
        sort_drafts(&mut drafts);
        Ok(drafts)
    }

    async fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, DraftStoreError> {
        let url = self.url(&["drafts", draft_id])?;
        match self.send(url).await? {
            Some(response) => response
                .json::<Draft>()
                .await
                .map(Some)
                .map_err(|e| DraftStoreError::InvalidResponse(e.to_string())),
            None => Ok(None),
        }
    }
}
