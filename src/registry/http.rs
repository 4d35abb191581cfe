use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{BucketChangeRequest, RegistryError, Speaker, SpeakerRegistry};

/// JSON-over-HTTP registry client.
///
/// - `GET  {base}/speakers/{id}` → [`Speaker`] (404 means unknown)
/// - `POST {base}/speakers/{id}/bucket-changes` with a [`BucketChangeRequest`] body
#[derive(Debug, Clone)]
pub struct HttpSpeakerRegistry {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSpeakerRegistry {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url).map_err(|e| RegistryError::RequestFailed {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::RequestFailed {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn speaker_url(&self, id: &str, suffix: Option<&str>) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|_| RegistryError::RequestFailed {
                        url: self.base_url.to_string(),
                        message: "base URL cannot carry a path".to_string(),
                    })?;
            segments.pop_if_empty().push("speakers").push(id);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SpeakerRegistry for HttpSpeakerRegistry {
    async fn get_speaker(&self, id: &str) -> Result<Option<Speaker>, RegistryError> {
        let url = self.speaker_url(id, None)?;
        debug!(%url, "Fetching speaker");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            RegistryError::RequestFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Speaker>()
                .await
                .map(Some)
                .map_err(|e| RegistryError::InvalidResponse(e.to_string())),
            status => Err(RegistryError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn propose_bucket_change(
        &self,
        change: BucketChangeRequest,
    ) -> Result<(), RegistryError> {
        let url = self.speaker_url(&change.speaker_id, Some("bucket-changes"))?;

        let response = self
            .client
            .post(url.clone())
            .json(&change)
            .send()
            .await
            .map_err(|e| RegistryError::RequestFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::SpeakerNotFound {
                speaker_id: change.speaker_id,
            }),
            status if status.is_success() => Ok(()),
            status => Err(RegistryError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
