//! Gemini embedding client
//!
//! Calls `batchEmbedContents` with a long-lived reqwest::Client for
//! connection pooling.

use super::Embedder;
use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini rejects batches larger than this
pub const MAX_BATCH: usize = 100;

pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AdvisorError::Config(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        let dimensions = known_dimensions(&model);

        Ok(Self {
            client,
            api_key,
            model,
            base_url: BASE_URL.to_string(),
            dimensions,
        })
    }

    /// Point the client at a different endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = build_request(&self.model, texts);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini embedding request failed: {}", e);
                AdvisorError::Embedding(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini embedding error response: {}", error_text);
            return Err(AdvisorError::Embedding(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let body: BatchEmbedResponse = response.json().await.map_err(|e| {
            AdvisorError::Embedding(format!("Gemini embedding parse error: {}", e))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(AdvisorError::Embedding(format!(
                "Gemini returned {} embeddings for {} texts",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            debug!(size = chunk.len(), model = %self.model, "Embedding chunk via Gemini");
            let embedded = self.embed_chunk(chunk).await?;

            for vector in &embedded {
                if vector.len() != self.dimensions {
                    return Err(AdvisorError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }
}

fn known_dimensions(model: &str) -> usize {
    match model.trim_start_matches("models/") {
        "gemini-embedding-001" => 3072,
        _ => 768,
    }
}

fn build_request(model: &str, texts: &[String]) -> BatchEmbedRequest {
    let model = format!("models/{}", model.trim_start_matches("models/"));

    BatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| EmbedContentRequest {
                model: model.clone(),
                content: Content {
                    parts: vec![Part { text: text.clone() }],
                },
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = build_request("text-embedding-004", &["Beaches of Goa".to_string()]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "Beaches of Goa");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}"#;
        let parsed: BatchEmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_known_dimensions() {
        assert_eq!(known_dimensions("text-embedding-004"), 768);
        assert_eq!(known_dimensions("models/gemini-embedding-001"), 3072);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(GeminiEmbedder::new(String::new(), "text-embedding-004".to_string()).is_err());
    }

    //
    // ================= Local endpoint =================
    //

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        ServerError,
        MissingOne,
        WrongDimensions,
    }

    #[derive(Clone)]
    struct Endpoint {
        reply: Reply,
        batch_sizes: Arc<Mutex<Vec<usize>>>,
    }

    fn embeddings(count: usize, dimensions: usize) -> (StatusCode, Json<Value>) {
        let values = vec![0.25f32; dimensions];
        let items: Vec<Value> = (0..count).map(|_| json!({ "values": values })).collect();
        (StatusCode::OK, Json(json!({ "embeddings": items })))
    }

    async fn batch_embed(
        State(endpoint): State<Endpoint>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let count = body["requests"].as_array().map_or(0, Vec::len);
        endpoint.batch_sizes.lock().unwrap().push(count);

        match endpoint.reply {
            Reply::Ok => embeddings(count, 768),
            Reply::ServerError => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": { "message": "quota exceeded" } })),
            ),
            Reply::MissingOne => embeddings(count.saturating_sub(1), 768),
            Reply::WrongDimensions => embeddings(count, 3),
        }
    }

    /// Serve `reply` on an ephemeral port; returns the embedder and the
    /// batch sizes the endpoint received
    async fn local_embedder(reply: Reply) -> (GeminiEmbedder, Arc<Mutex<Vec<usize>>>) {
        let batch_sizes = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/models/:call", post(batch_embed))
            .with_state(Endpoint {
                reply,
                batch_sizes: batch_sizes.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let embedder = GeminiEmbedder::new("test-key".to_string(), "text-embedding-004".to_string())
            .unwrap()
            .with_base_url(format!("http://{}/", addr));
        (embedder, batch_sizes)
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("destination {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batches_are_split_at_max_batch() {
        let (embedder, batch_sizes) = local_embedder(Reply::Ok).await;

        let vectors = embedder.embed_batch(&texts(250)).await.unwrap();

        assert_eq!(vectors.len(), 250);
        assert!(vectors.iter().all(|v| v.len() == 768));
        assert_eq!(*batch_sizes.lock().unwrap(), vec![MAX_BATCH, MAX_BATCH, 50]);
    }

    #[tokio::test]
    async fn test_error_status_is_embedding_error() {
        let (embedder, _) = local_embedder(Reply::ServerError).await;

        let err = embedder.embed("Lisbon").await.unwrap_err();
        match err {
            AdvisorError::Embedding(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_rejected() {
        let (embedder, _) = local_embedder(Reply::MissingOne).await;

        let err = embedder.embed_batch(&texts(3)).await.unwrap_err();
        assert!(matches!(err, AdvisorError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_wrong_dimensions_rejected() {
        let (embedder, _) = local_embedder(Reply::WrongDimensions).await;

        let err = embedder.embed_batch(&texts(2)).await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::DimensionMismatch { expected: 768, actual: 3 }
        ));
    }
}
