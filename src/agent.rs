use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::llm::{ non_empty, parse_llm_type, LlmConfig };
use crate::llm::chat::{ ChatClient, TokenStream, new_client as new_chat_client };
use crate::llm::embedding::new_client as new_embedding_client;
use crate::llm::image::{ ImageClient, ImageConfig, new_client as new_image_client };
use crate::models::chat::WireMessage;
use crate::protocol::validate_frame_url;
use crate::rag::{ format_context, RetrievalError, RetrievalSettings, Retriever };
use crate::store::StoreError;
use crate::store::qdrant::{ QdrantDocumentStore, QdrantSettings };

use futures::future::try_join;
use futures::FutureExt;
use log::{ debug, info, warn };
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("request has no messages")]
    EmptyConversation,
    #[error("embedding failed: {0}")]
    Embedding(Box<dyn StdError + Send + Sync>),
    #[error("retrieval failed: {0}")]
    Retrieval(StoreError),
    #[error("completion failed: {0}")]
    Completion(Box<dyn StdError + Send + Sync>),
    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),
}

impl From<RetrievalError> for AgentError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Embedding(e) => AgentError::Embedding(e),
            RetrievalError::Store(StoreError::Config(msg)) => AgentError::Config(msg),
            RetrievalError::Store(e) => AgentError::Retrieval(e),
        }
    }
}

/// Everything needed to start streaming one reply.
pub struct PreparedReply {
    pub image_url: Option<String>,
    pub tokens: TokenStream,
}

#[derive(Clone)]
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    image_client: Option<Arc<dyn ImageClient>>,
    retriever: Retriever,
    prompt_config: Arc<PromptConfig>,
    image_timeout: Duration,
}

impl ChatAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        image_client: Option<Arc<dyn ImageClient>>,
        retriever: Retriever,
        prompt_config: Arc<PromptConfig>,
        image_timeout: Duration
    ) -> Self {
        Self { chat_client, image_client, retriever, prompt_config, image_timeout }
    }

    /// Builds the provider clients from command line settings.
    ///
    /// Provider settings are checked here. The vector store is only
    /// connected when the first question arrives.
    pub fn from_args(args: &Args) -> Result<Self, AgentError> {
        let chat_config = LlmConfig {
            llm_type: parse_llm_type(&args.chat_llm_type).map_err(AgentError::Config)?,
            base_url: args.chat_base_url.as_deref().and_then(non_empty),
            api_key: non_empty(&args.chat_api_key),
            completion_model: args.chat_model.as_deref().and_then(non_empty),
            embedding_model: None,
            temperature: Some(args.chat_temperature),
        };
        let chat_client = new_chat_client(&chat_config).map_err(|e|
            AgentError::Config(format!("chat client: {}", e))
        )?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().unwrap_or_else(|| "adapter default".to_string())
        );

        let embedding_config = LlmConfig {
            llm_type: parse_llm_type(&args.embedding_llm_type).map_err(AgentError::Config)?,
            base_url: args.embedding_base_url.as_deref().and_then(non_empty),
            api_key: non_empty(&args.embedding_api_key),
            completion_model: None,
            embedding_model: args.embedding_model.as_deref().and_then(non_empty),
            temperature: None,
        };
        let embedding_client = new_embedding_client(&embedding_config).map_err(|e|
            AgentError::Config(format!("embedding client: {}", e))
        )?;
        info!(
            "Embedding client configured: Type={}, Model={}",
            embedding_config.llm_type,
            embedding_client.model_name()
        );

        let image_client = if args.enable_image {
            let image_config = ImageConfig {
                api_key: args.image_api_key
                    .as_deref()
                    .and_then(non_empty)
                    .or_else(|| non_empty(&args.chat_api_key)),
                base_url: args.image_base_url
                    .as_deref()
                    .and_then(non_empty)
                    .or_else(|| chat_config.base_url.clone()),
                model: non_empty(&args.image_model),
                size: args.image_size.clone(),
            };
            let client = new_image_client(&image_config).map_err(|e|
                AgentError::Config(format!("image client: {}", e))
            )?;
            info!("Image client configured: Model={}, Size={}", args.image_model, args.image_size);
            Some(client)
        } else {
            info!("Image generation disabled.");
            None
        };

        let prompt_config = match &args.prompts_path {
            Some(path) => {
                let loaded = prompt::load_prompts(path)?;
                info!("Loaded prompt configuration from: {}", path);
                loaded
            }
            None => Arc::new(PromptConfig::default()),
        };

        let store = QdrantDocumentStore::lazy(QdrantSettings {
            url: args.vector_host.clone(),
            api_key: args.vector_secret.as_deref().and_then(non_empty),
            collection: args.vector_collection.clone(),
            vector_name: args.vector_name.as_deref().and_then(non_empty),
            timeout: Duration::from_millis(args.search_timeout_ms),
        });
        let retriever = Retriever::new(embedding_client, Arc::new(store), RetrievalSettings {
            search_limit: args.search_limit,
            context_documents: args.context_documents,
            search_timeout: Duration::from_millis(args.search_timeout_ms),
            fetch_timeout: Duration::from_millis(args.fetch_timeout_ms),
        });

        Ok(
            Self::new(
                chat_client,
                image_client,
                retriever,
                prompt_config,
                Duration::from_secs(args.image_timeout_secs)
            )
        )
    }

    /// Retrieves context, opens the completion stream and generates the
    /// optional image, all before the first byte of the reply is sent.
    ///
    /// The last message is the question; everything before it is history.
    pub async fn prepare(
        &self,
        request_id: &str,
        messages: &[WireMessage]
    ) -> Result<PreparedReply, AgentError> {
        let (last, history) = messages.split_last().ok_or(AgentError::EmptyConversation)?;
        let question = last.content.as_str();
        info!(
            "[{}] Question with {} earlier message(s): {:?}",
            request_id,
            history.len(),
            question
        );

        // a failed completion drops the pending image instead of waiting on it
        let (tokens, image_url) = try_join(
            self.open_completion(request_id, history, question),
            self.generate_image(request_id, question).map(Ok)
        ).await?;

        Ok(PreparedReply { image_url, tokens })
    }

    async fn open_completion(
        &self,
        request_id: &str,
        history: &[WireMessage],
        question: &str
    ) -> Result<TokenStream, AgentError> {
        let docs = self.retriever.retrieve(question).await?;
        info!("[{}] {} document(s) in context", request_id, docs.len());

        let context = format_context(&docs);
        let final_prompt = prompt::get_rag_answer_prompt(&self.prompt_config, &context, question);
        debug!(
            "[{}] --- Final Answer Prompt ---\n{}\n--------------------------",
            request_id,
            final_prompt
        );

        let mut messages = history.to_vec();
        messages.push(WireMessage::user(final_prompt));

        self.chat_client.stream_chat(&messages).await.map_err(AgentError::Completion)
    }

    /// Never fails: any problem means the reply goes out without an image.
    async fn generate_image(&self, request_id: &str, question: &str) -> Option<String> {
        let client = self.image_client.as_ref()?;
        let image_prompt = prompt::get_image_prompt(&self.prompt_config, question);

        match timeout(self.image_timeout, client.generate(&image_prompt)).await {
            Ok(Ok(url)) =>
                match validate_frame_url(&url) {
                    Ok(()) => {
                        info!("[{}] Image generated", request_id);
                        Some(url)
                    }
                    Err(e) => {
                        warn!("[{}] Discarding generated image: {}", request_id, e);
                        None
                    }
                }
            Ok(Err(e)) => {
                warn!("[{}] Image generation failed: {}", request_id, e);
                None
            }
            Err(_) => {
                warn!(
                    "[{}] Image generation timed out after {} s",
                    request_id,
                    self.image_timeout.as_secs()
                );
                None
            }
        }
    }
}
