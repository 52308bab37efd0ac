//! Wire types for the Triton v2 inference protocol and the Qdrant points API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// TRITON
// =============================================================================

/// Name of the text input tensor of the embedding model.
pub const TEXT_INPUT_NAME: &str = "text_feature";

#[derive(Debug, Serialize)]
pub struct InferRequest {
    pub inputs: Vec<InferInput>,
}

#[derive(Debug, Serialize)]
pub struct InferInput {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<usize>,
    pub data: Vec<String>,
}

impl InferRequest {
    /// A batch of one string.
    pub fn single_text(text: &str) -> Self {
        Self {
            inputs: vec![InferInput {
                name: TEXT_INPUT_NAME.to_string(),
                datatype: "BYTES".to_string(),
                shape: vec![1, 1],
                data: vec![text.to_string()],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InferResponse {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub outputs: Vec<InferOutput>,
}

#[derive(Debug, Deserialize)]
pub struct InferOutput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

// =============================================================================
// QDRANT
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UpsertPointsRequest {
    pub points: Vec<Point>,
}

#[derive(Debug, Serialize)]
pub struct Point {
    pub id: Uuid,
    pub payload: PointPayload,
    pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointPayload {
    pub tag: String,
    pub tag_id: Uuid,
    pub user_id: Uuid,
}

/// Id of the point holding `tag_id` for `user_id`. Tags are shared, so each
/// user who tags with one gets a separate point.
pub fn point_id(tag_id: Uuid, user_id: Uuid) -> Uuid {
    Uuid::new_v5(&tag_id, user_id.as_bytes())
}

#[derive(Debug, Serialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Filter,
    pub with_payload: bool,
}

#[derive(Debug, Serialize)]
pub struct Filter {
    pub must: Vec<FieldCondition>,
}

#[derive(Debug, Serialize)]
pub struct FieldCondition {
    pub key: String,
    #[serde(rename = "match")]
    pub matches: MatchValue,
}

#[derive(Debug, Serialize)]
pub struct MatchValue {
    pub value: String,
}

impl Filter {
    fn matching(key: &str, value: Uuid) -> Self {
        Self {
            must: vec![FieldCondition {
                key: key.to_string(),
                matches: MatchValue {
                    value: value.to_string(),
                },
            }],
        }
    }

    /// Points owned by `user_id`.
    pub fn owned_by(user_id: Uuid) -> Self {
        Self::matching("user_id", user_id)
    }

    /// Every user's point for `tag_id`.
    pub fn for_tag(tag_id: Uuid) -> Self {
        Self::matching("tag_id", tag_id)
    }
}

#[derive(Debug, Serialize)]
pub struct DeletePointsRequest {
    pub filter: Filter,
}

/// Envelope of every Qdrant response. `status` is `"ok"` on success and an
/// object with an `error` message otherwise.
#[derive(Debug, Deserialize)]
pub struct QdrantResponse<T> {
    pub result: Option<T>,
    pub status: Value,
    #[serde(default)]
    pub time: f64,
}

impl<T> QdrantResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.status.as_str() == Some("ok")
    }

    /// Error message carried by a failed response.
    pub fn error_message(&self) -> String {
        self.status
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.status.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    /// UUID string or unsigned integer.
    pub id: Value,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub payload: Option<HitPayload>,
}

#[derive(Debug, Deserialize)]
pub struct HitPayload {
    #[serde(default)]
    pub tag_id: Option<Uuid>,
}
