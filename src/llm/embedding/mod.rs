pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use self::ollama::OllamaEmbeddingClient;
use self::openai::OpenAIEmbeddingClient;

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>>;

    fn model_name(&self) -> &str;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn EmbeddingClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn EmbeddingClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Takes the single vector out of a batch-of-one embedding call.
pub(crate) fn single_embedding(
    mut embeddings: Vec<Vec<f32>>,
    provider: &str
) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
    let embedding = embeddings
        .pop()
        .ok_or_else(|| format!("{} embedding generation returned no results", provider))?;
    if embedding.is_empty() {
        return Err(format!("{} returned an empty embedding vector", provider).into());
    }
    Ok(EmbeddingResponse { embedding })
}
