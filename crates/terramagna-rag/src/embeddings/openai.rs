//! Hosted embeddings through an OpenAI-compatible `/embeddings` endpoint

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{l2_normalize, EmbeddingModel};
use crate::config::{EmbeddingSettings, LlmSettings};
use crate::llm::external::{build_client, describe_send_error, parse_json_body};

pub struct OpenAIEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    batch_size: usize,
    client: Client,
}

impl OpenAIEmbedder {
    pub fn new(llm: &LlmSettings, settings: &EmbeddingSettings) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{}/embeddings", llm.base_url.trim_end_matches('/')),
            api_key: llm.api_key.clone(),
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
            client: build_client(llm.timeout_secs)?,
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = json!({
            "model": self.model,
            "input": inputs,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| describe_send_error(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.endpoint))?;

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("Embeddings API error ({}): {}", status, preview));
        }

        let parsed: EmbeddingResponse = parse_json_body(status, &body, &self.endpoint)?;
        order_embeddings(parsed, inputs.len())
    }
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("Embeddings API returned no vector for the query"))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self
                .embed_batch(batch)
                .await
                .with_context(|| format!("Embedding batch {} failed", i))?;
            vectors.extend(embedded);
            tracing::debug!(done = vectors.len(), total = texts.len(), "Embedded batch");
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// The API may return items out of order; place each by its `index`.
fn order_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(anyhow!(
            "Embeddings API returned {} vectors for {} inputs",
            response.data.len(),
            expected
        ));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        let slot = slots
            .get_mut(item.index)
            .ok_or_else(|| anyhow!("Embedding index {} out of range", item.index))?;
        let mut vector = item.embedding;
        l2_normalize(&mut vector);
        *slot = Some(vector);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow!("Missing embedding for input {}", i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> EmbeddingResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_out_of_order_items_are_reordered() {
        let parsed = response(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.0,2.0]},
                {"object":"embedding","index":0,"embedding":[3.0,0.0]}
            ],"model":"text-embedding-3-small"}"#,
        );
        let vectors = order_embeddings(parsed, 2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let parsed = response(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#);
        assert!(order_embeddings(parsed, 2).is_err());
    }

    #[test]
    fn test_duplicate_index_is_error() {
        let parsed = response(
            r#"{"data":[{"index":0,"embedding":[1.0]},{"index":0,"embedding":[1.0]}]}"#,
        );
        assert!(order_embeddings(parsed, 2).is_err());
    }

    #[test]
    fn test_endpoint_uses_base_url() {
        let llm = LlmSettings {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            ..LlmSettings::default()
        };
        let embedder = OpenAIEmbedder::new(&llm, &EmbeddingSettings::default()).unwrap();
        assert_eq!(embedder.endpoint, "https://openrouter.ai/api/v1/embeddings");
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
    }
}
