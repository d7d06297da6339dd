//! Qdrant [`VectorStore`] over the REST API.
//!
//! Only the handful of endpoints the indexer and retriever need are used:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upsert | `PUT /collections/{c}/points?wait=true` |
//! | query | `POST /collections/{c}/points/search` |
//! | delete | `POST /collections/{c}/points/delete?wait=true` |
//! | count | `POST /collections/{c}/points/count` |
//! | create | `PUT /collections/{c}` (from `docctx init`) |
//!
//! Chunk text travels in the point payload under `content`, next to the
//! flattened metadata. Collections are expected to exist; `docctx init`
//! creates the configured one with cosine distance.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use docctx_core::store::{ScoredRecord, VectorRecord, VectorStore};
use docctx_core::Error;

use crate::config::StoreConfig;
use crate::embedding::{http_client, request_error};

const CONTENT_KEY: &str = "content";

pub struct QdrantStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("rag.store.endpoint is required for qdrant"))?
            .trim_end_matches('/')
            .to_string();

        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::config(format!("environment variable {} is not set", var))
            })?),
            None => None,
        };

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint,
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.endpoint, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, what: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| request_error(what, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("{} failed with {}: {}", what, status, body)).into());
        }
        Ok(response
            .json::<Value>()
            .await
            .map_err(|e| request_error(what, e))?)
    }

    /// Create `collection` with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self, collection: &str, dims: usize) -> Result<bool> {
        let path = format!("/collections/{}", collection);
        let exists = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| request_error("Qdrant collection lookup", e))?;
        if exists.status().is_success() {
            return Ok(false);
        }

        let body = json!({ "vectors": { "size": dims, "distance": "Cosine" } });
        self.send(
            "Qdrant create collection",
            self.request(reqwest::Method::PUT, &path).json(&body),
        )
        .await?;
        Ok(true)
    }
}

/// Qdrant returns ids as strings (UUIDs) or unsigned integers.
fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn driver(&self) -> &str {
        "qdrant"
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let points: Vec<Value> = records
            .iter()
            .map(|r| {
                let mut payload = r.metadata.clone();
                payload.insert(CONTENT_KEY.to_string(), Value::String(r.text.clone()));
                json!({ "id": r.id, "vector": r.vector, "payload": payload })
            })
            .collect();

        self.send(
            "Qdrant upsert",
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&json!({ "points": points })),
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        let value = self
            .send(
                "Qdrant search",
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points/search", collection),
                )
                .json(&body),
            )
            .await?;

        let response: SearchResponse = serde_json::from_value(value)
            .map_err(|e| anyhow!(Error::Store(format!("unexpected Qdrant search response: {}", e))))?;

        Ok(response
            .result
            .into_iter()
            .map(|hit| {
                let mut metadata = hit.payload.unwrap_or_default();
                let text = match metadata.remove(CONTENT_KEY) {
                    Some(Value::String(s)) => s,
                    _ => String::new(),
                };
                ScoredRecord {
                    id: point_id(&hit.id),
                    text,
                    metadata,
                    score: hit.score,
                }
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.send(
            "Qdrant delete",
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", collection),
            )
            .json(&json!({ "points": ids })),
        )
        .await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let value = self
            .send(
                "Qdrant count",
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points/count", collection),
                )
                .json(&json!({ "exact": true })),
            )
            .await?;
        let response: CountResponse = serde_json::from_value(value)
            .map_err(|e| anyhow!(Error::Store(format!("unexpected Qdrant count response: {}", e))))?;
        Ok(response.result.count)
    }
}
