use crate::llm::embedding::EmbeddingClient;
use crate::store::{ LazyStore, SearchHit, StoreError, EMBEDDING_FIELDS };

use futures::future::join_all;
use log::{ debug, info, warn };
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Candidates requested from the vector search.
    pub search_limit: usize,
    /// Best candidates hydrated into prompt context.
    pub context_documents: usize,
    pub search_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            search_limit: 10,
            context_documents: 5,
            search_timeout: Duration::from_millis(5000),
            fetch_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub id: String,
    pub score: f32,
    pub content: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(Box<dyn StdError + Send + Sync>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Embeds a question and pulls the closest stored documents.
#[derive(Clone)]
pub struct Retriever {
    embedding_client: Arc<dyn EmbeddingClient>,
    store: Arc<LazyStore>,
    settings: RetrievalSettings,
}

impl Retriever {
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        store: Arc<LazyStore>,
        settings: RetrievalSettings
    ) -> Self {
        Self { embedding_client, store, settings }
    }

    /// Runs embed, search and hydrate for `query`.
    ///
    /// Embedding, connection and search failures are errors. A document that
    /// cannot be fetched in time is logged and left out.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let embed_resp = self.embedding_client
            .embed(query).await
            .map_err(RetrievalError::Embedding)?;
        debug!(
            "Embedded query with {} ({} dimensions)",
            self.embedding_client.model_name(),
            embed_resp.embedding.len()
        );

        let store = self.store.get().await?;
        let search_timeout = self.settings.search_timeout;
        let mut hits = timeout(
            search_timeout,
            store.search(&embed_resp.embedding, self.settings.search_limit)
        ).await.map_err(|_| StoreError::Timeout {
            operation: "vector search",
            millis: search_timeout.as_millis(),
        })??;

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(self.settings.context_documents);
        info!("→ Vector search returned {} candidate(s) to hydrate", hits.len());

        let fetch_timeout = self.settings.fetch_timeout;
        let fetches = hits.into_iter().map(|SearchHit { id, score }| {
            let store = Arc::clone(&store);
            async move {
                match timeout(fetch_timeout, store.fetch(&id)).await {
                    Ok(Ok(content)) =>
                        Some(RetrievedDocument { id, score, content: strip_embedding_fields(content) }),
                    Ok(Err(e)) => {
                        warn!("Dropping document {} from context: {}", id, e);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "Dropping document {} from context: fetch timed out after {} ms",
                            id,
                            fetch_timeout.as_millis()
                        );
                        None
                    }
                }
            }
        });

        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }
}

fn strip_embedding_fields(mut content: Value) -> Value {
    if let Some(obj) = content.as_object_mut() {
        for field in EMBEDDING_FIELDS {
            obj.remove(field);
        }
    }
    content
}

/// One compact JSON document per line.
pub fn format_context(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return "No relevant documents found.".to_string();
    }
    docs.iter()
        .map(|doc| doc.content.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
