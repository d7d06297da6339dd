//! Embedding platform implementations.
//!
//! Concrete backends for [`docctx_core::embedding::EmbeddingProvider`]:
//! - **[`DisabledProvider`]**: returns errors; used when no platform is configured.
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **[`OllamaProvider`]**: `POST /api/embed` on a local Ollama server.
//! - **[`HashingProvider`]**: offline feature hashing, deterministic and
//!   network-free. Useful for tests and air-gapped setups.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the configured platform:
//!
//! ```rust
//! # use docctx::config::VectorizerConfig;
//! # use docctx::embedding::create_provider;
//! # use docctx_core::embedding::EmbeddingProvider;
//! let config = VectorizerConfig::default(); // platform = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Failures
//!
//! Requests are made once; there is no retry or backoff. A request that
//! exceeds `timeout_secs` fails with [`Error::Timeout`], any other transport
//! failure or non-2xx status with [`Error::Network`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use docctx_core::embedding::EmbeddingProvider;
use docctx_core::{Error, Result};

use crate::config::{VectorizerConfig, VectorizerPlatform};

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Map a `reqwest` failure onto the error taxonomy.
pub(crate) fn request_error(what: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("{}: {}", what, err))
    } else {
        Error::Network(format!("{}: {}", what, err))
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))
}

/// Fail with [`Error::Network`] on a non-2xx response, keeping the body.
async fn check_status(platform: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Network(format!(
        "{} API error {}: {}",
        platform, status, body
    )))
}

// ============ Disabled Provider ============

/// A no-op provider that always returns errors.
///
/// Used when `rag.vectorizer.platform = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn platform(&self) -> &str {
        "disabled"
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::config("Vectorizer platform is disabled"))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
pub struct OpenAIProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// [`Error::Configuration`] if `model` or `dims` is missing or
    /// `OPENAI_API_KEY` is not set.
    pub fn new(config: &VectorizerConfig) -> Result<Self> {
        let (model, dims) = model_and_dims(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::config("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: base_url(config, OPENAI_URL),
            api_key,
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn platform(&self) -> &str {
        "openai"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("OpenAI embeddings request", e))?;
        let response = check_status("OpenAI", response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| request_error("OpenAI embeddings response", e))?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Network("Invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Network("Invalid OpenAI response: missing embedding".into()))?;
        indexed.push((index, to_f32(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider backed by a local Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaProvider {
    pub fn new(config: &VectorizerConfig) -> Result<Self> {
        let (model, dims) = model_and_dims(config, "Ollama")?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: base_url(config, OLLAMA_URL),
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn platform(&self) -> &str {
        "ollama"
    }
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Ollama embed request", e))?;
        let response = check_status("Ollama", response).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| request_error("Ollama embed response", e))?;
        let embeddings = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Network("Invalid Ollama response: missing embeddings".into()))?;

        embeddings
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|values| to_f32(values))
                    .ok_or_else(|| Error::Network("Invalid Ollama response: bad embedding".into()))
            })
            .collect()
    }
}

// ============ Hashing Provider ============

/// Signed feature hashing over lowercase alphanumeric tokens.
///
/// Each token is hashed with SHA-256; the first eight bytes pick a bucket
/// and the ninth a sign. The result is L2-normalized, so texts sharing
/// vocabulary score higher under cosine similarity.
pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::config("hashing vectorizer needs dims > 0"));
        }
        Ok(Self { dims })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn platform(&self) -> &str {
        "hashing"
    }
    fn model_name(&self) -> &str {
        "feature-hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

// ============ Factory ============

fn model_and_dims(config: &VectorizerConfig, platform: &str) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| Error::config(format!("rag.vectorizer.model required for {}", platform)))?;
    let dims = config
        .dims
        .filter(|d| *d > 0)
        .ok_or_else(|| Error::config(format!("rag.vectorizer.dims required for {}", platform)))?;
    Ok((model, dims))
}

fn base_url(config: &VectorizerConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn to_f32(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"hashing"` | [`HashingProvider`] |
pub fn create_provider(config: &VectorizerConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(match config.platform {
        VectorizerPlatform::Disabled => Arc::new(DisabledProvider),
        VectorizerPlatform::OpenAi => Arc::new(OpenAIProvider::new(config)?),
        VectorizerPlatform::Ollama => Arc::new(OllamaProvider::new(config)?),
        VectorizerPlatform::Hashing => Arc::new(HashingProvider::new(config.dims.unwrap_or(0))?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docctx_core::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let err = DisabledProvider
            .embed(&["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_hashing_is_deterministic_and_normalized() {
        let provider = HashingProvider::new(64).unwrap();
        let texts = vec!["Rust async runtime".to_string()];
        let a = provider.embed(&texts).await.unwrap();
        let b = provider.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_prefers_shared_vocabulary() {
        let provider = HashingProvider::new(256).unwrap();
        let query = provider.embed_one("deploy kubernetes").await.unwrap();
        let related = provider
            .embed_one("How to deploy services on kubernetes")
            .await
            .unwrap();
        let unrelated = provider
            .embed_one("Python packaging guide")
            .await
            .unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        let err = parse_openai_response(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_factory_requires_model_for_ollama() {
        let config = VectorizerConfig {
            platform: VectorizerPlatform::Ollama,
            dims: Some(768),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config).err(),
            Some(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_factory_builds_hashing() {
        let config = VectorizerConfig {
            platform: VectorizerPlatform::Hashing,
            dims: Some(32),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.platform(), "hashing");
        assert_eq!(provider.dims(), 32);
    }
}
