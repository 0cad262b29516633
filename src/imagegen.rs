use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Generator as GeneratorCfg;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid generator url: {0}")]
    Url(String),
    #[error("generator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generator returned status {0}")]
    Status(StatusCode),
    /// The service answers errors with a tiny placeholder image.
    #[error("generator returned only {0} bytes")]
    TooSmall(usize),
}

/// Text-to-image backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, GenerateError>;
}

/// GETs `<base_url>/<percent-encoded prompt>` and returns the body bytes.
#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    http: Client,
    base_url: Url,
    min_image_bytes: usize,
}

impl HttpImageGenerator {
    pub fn from_config(cfg: &GeneratorCfg) -> Result<Self, GenerateError> {
        let base_url =
            Url::parse(&cfg.base_url).map_err(|e| GenerateError::Url(e.to_string()))?;
        let http = Client::builder()
            .user_agent("artbot/0.1")
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url,
            min_image_bytes: cfg.min_image_bytes,
        })
    }

    /// The prompt becomes a single path segment, so `/`, `?` and `#` are escaped too.
    pub fn prompt_url(&self, prompt: &str) -> Result<Url, GenerateError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GenerateError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .push(prompt);
        Ok(url)
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, GenerateError> {
        let url = self.prompt_url(prompt)?;
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if status != StatusCode::OK {
            warn!(%status, "image generator error");
            return Err(GenerateError::Status(status));
        }
        let body = res.bytes().await?;
        if body.len() <= self.min_image_bytes {
            warn!(bytes = body.len(), "image generator returned a placeholder");
            return Err(GenerateError::TooSmall(body.len()));
        }
        info!(bytes = body.len(), "image generated");
        Ok(body.to_vec())
    }
}
