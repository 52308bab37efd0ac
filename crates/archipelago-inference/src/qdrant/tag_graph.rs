//! Qdrant-backed tag graph.
//!
//! Tags are shared between users, so each (tag, user) pair is its own point
//! with payload `{tag, tag_id, user_id}`. Closest-tag lookups are restricted
//! to the caller's points; deleting a tag removes every user's point.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use archipelago_core::{EmbeddingInferer, Error, Result, Tag, TagGraph};

use super::inferer::TritonInferer;
use super::types::*;
use crate::config::TagGraphConfig;

pub struct QdrantTagGraph {
    client: Client,
    points_url: String,
    inferer: Arc<dyn EmbeddingInferer>,
}

impl QdrantTagGraph {
    /// Graph with a Triton inferer built from the same config.
    pub fn new(config: &TagGraphConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        let inferer = Arc::new(TritonInferer::with_client(client.clone(), config));
        Ok(Self::with_inferer(client, config, inferer))
    }

    pub fn with_inferer(
        client: Client,
        config: &TagGraphConfig,
        inferer: Arc<dyn EmbeddingInferer>,
    ) -> Self {
        let points_url = format!(
            "{}/collections/{}/points",
            config.qdrant_url.trim_end_matches('/'),
            config.collection
        );
        info!(
            subsystem = "inference",
            component = "tag_graph",
            url = %points_url,
            "Initializing Qdrant tag graph"
        );
        Self {
            client,
            points_url,
            inferer,
        }
    }

    /// Send a request and unwrap the Qdrant envelope.
    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Request(format!("Qdrant request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<QdrantResponse<Value>>()
                .await
                .map(|b| b.error_message())
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Request(format!(
                "Qdrant returned {}: {}",
                status, message
            )));
        }

        let body: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse Qdrant response: {}", e)))?;
        if !body.is_ok() {
            return Err(Error::Request(format!(
                "Qdrant returned error: {}",
                body.error_message()
            )));
        }
        Ok(body.result)
    }
}

fn hit_tag_id(hit: &ScoredPoint) -> Result<Uuid> {
    hit.payload
        .as_ref()
        .and_then(|p| p.tag_id)
        .ok_or_else(|| Error::Serialization(format!("Qdrant point {} has no tag_id", hit.id)))
}

#[async_trait]
impl TagGraph for QdrantTagGraph {
    #[instrument(skip_all, fields(subsystem = "inference", component = "tag_graph", op = "upsert_tag", tag_id = %tag.id, user_id = %user_id))]
    async fn upsert_tag(&self, tag: &Tag, user_id: Uuid) -> Result<()> {
        let vector = self.inferer.infer(&tag.name).await?;
        let request = UpsertPointsRequest {
            points: vec![Point {
                id: point_id(tag.id, user_id),
                payload: PointPayload {
                    tag: tag.name.clone(),
                    tag_id: tag.id,
                    user_id,
                },
                vector,
            }],
        };

        self.send::<Value>(
            self.client
                .put(format!("{}?wait=true", self.points_url))
                .json(&request),
        )
        .await?;
        debug!("Tag point upserted");
        Ok(())
    }

    #[instrument(skip_all, fields(subsystem = "inference", component = "tag_graph", op = "closest_tags", tag_id = %tag.id, user_id = %user_id, limit = limit))]
    async fn closest_tags(&self, tag: &Tag, user_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.inferer.infer(&tag.name).await?;
        // One extra hit: the tag's own point is the closest match.
        let request = SearchRequest {
            vector,
            limit: limit + 1,
            filter: Filter::owned_by(user_id),
            with_payload: true,
        };

        let hits: Vec<ScoredPoint> = self
            .send(
                self.client
                    .post(format!("{}/search", self.points_url))
                    .json(&request),
            )
            .await?
            .unwrap_or_default();

        let mut ids = Vec::with_capacity(limit);
        for hit in &hits {
            let id = hit_tag_id(hit)?;
            if id != tag.id && ids.len() < limit {
                ids.push(id);
            }
        }
        debug!(result_count = ids.len(), "Closest tags found");
        Ok(ids)
    }

    #[instrument(skip_all, fields(subsystem = "inference", component = "tag_graph", op = "delete_tag", tag_id = %tag_id))]
    async fn delete_tag(&self, tag_id: Uuid) -> Result<()> {
        self.send::<Value>(
            self.client
                .post(format!("{}/delete?wait=true", self.points_url))
                .json(&DeletePointsRequest {
                    filter: Filter::for_tag(tag_id),
                }),
        )
        .await?;
        Ok(())
    }
}
