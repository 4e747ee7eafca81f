//! Text-to-speech over HTTP

use async_trait::async_trait;

use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Turns text into playable audio bytes
#[async_trait]
pub trait SpeechFetcher: Send + Sync {
    /// Synthesize `text`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails for any reason
    async fn fetch(&self, text: &str) -> Result<Vec<u8>>;
}

/// Fetches audio from a speech synthesis endpoint
///
/// POSTs `{"text": ...}` and expects raw audio bytes back with HTTP 200.
pub struct HttpSpeechFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechFetcher {
    /// Create a fetcher for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::Config("speech endpoint URL required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl SpeechFetcher for HttpSpeechFetcher {
    async fn fetch(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
        }

        let response = self
            .client
            .post(&self.url)
            .json(&TtsRequest { text })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("TTS endpoint returned {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::Fetch("TTS endpoint returned no audio".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "speech fetched");
        Ok(audio.to_vec())
    }
}
