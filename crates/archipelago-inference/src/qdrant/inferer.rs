//! Triton inference server client for text embeddings.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, instrument};

use archipelago_core::{EmbeddingInferer, Error, Result};

use super::types::{InferRequest, InferResponse};
use crate::config::TagGraphConfig;

/// Embeds short texts through `POST /v2/models/{model}/infer`.
pub struct TritonInferer {
    client: Client,
    infer_url: String,
    model: String,
}

impl TritonInferer {
    pub fn new(config: &TagGraphConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Share a client with the tag graph.
    pub fn with_client(client: Client, config: &TagGraphConfig) -> Self {
        let infer_url = format!(
            "{}/v2/models/{}/infer",
            config.inferer_url.trim_end_matches('/'),
            config.inferer_model
        );
        info!(
            subsystem = "inference",
            component = "inferer",
            url = %infer_url,
            "Initializing Triton inferer"
        );
        Self {
            client,
            infer_url,
            model: config.inferer_model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingInferer for TritonInferer {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "inferer", op = "infer", model = %self.model, text_len = text.len()))]
    async fn infer(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.infer_url)
            .json(&InferRequest::single_text(text))
            .send()
            .await
            .map_err(|e| Error::Request(format!("Inferer request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Inferer returned {}",
                response.status()
            )));
        }

        let body: InferResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse inferer response: {}", e)))?;

        body.outputs
            .into_iter()
            .next()
            .map(|o| o.data)
            .ok_or_else(|| Error::Request("Inferer response contains zero outputs".to_string()))
    }
}
