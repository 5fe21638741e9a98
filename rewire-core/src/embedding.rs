// Embedding service seam. The matcher has zero knowledge of how vectors are
// produced; it only requires a fixed dimensionality within one comparison.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LlmError, RewireError};

/// Common interface for embedding providers.
///
/// Calls are synchronous from the engine's perspective: no implicit timeout
/// is applied — wrap the provider with your own deadline if needed.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Embed one text into a fixed-length vector.
    async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>>;
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for zero-norm inputs. Vectors of mismatched dimensionality
/// score 0.0 with a warning rather than panicking — the tree-wide scan must
/// always complete.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        warn!(left = a.len(), right = b.len(), "Embedding dimension mismatch");
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ── HTTP provider ───────────────────────────────────────────────────

/// OpenAI-compatible `/v1/embeddings` provider.
#[derive(Debug)]
pub struct HttpEmbeddingProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HttpEmbeddingProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http-embeddings"
    }

    async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        debug!(model = %self.model, chars = text.len(), "Requesting embedding");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RewireError::Llm(LlmError::ApiError { status, body }));
        }

        let result: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Parse(e.to_string())))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                RewireError::Llm(LlmError::Parse("empty embeddings response".to_string()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn cosine_handles_zero_norm() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn cosine_handles_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < 1e-9);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [0.3, -0.2, 0.9];
        let b = [0.1, 0.8, -0.4];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-12);
    }
}
