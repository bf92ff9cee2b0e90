use async_trait::async_trait;
use std::error::Error as StdError;
use super::{ single_embedding, EmbeddingClient, EmbeddingResponse };
use super::super::LlmConfig;
use rllm::{ builder::{ LLMBackend, LLMBuilder }, LLMProvider };

pub struct OllamaEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
    model: String,
}

impl OllamaEmbeddingClient {
    pub fn new(
        base_url: Option<String>,
        model: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
        let embed_model = model.unwrap_or_else(|| "nomic-embed-text".to_string());

        let llm = LLMBuilder::new()
            .backend(LLMBackend::Ollama)
            .base_url(url)
            .model(&embed_model)
            .stream(false)
            .build()?;

        Ok(Self { llm, model: embed_model })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.base_url.clone(), config.embedding_model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(
        &self,
        text: &str
    ) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
        let embeddings = self.llm.embed(vec![text.to_string()]).await?;
        single_embedding(embeddings, "Ollama")
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
