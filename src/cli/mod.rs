use clap::{ ArgAction, Parser };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.studio.nebius.ai/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o, llama3)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Sampling temperature for chat completion.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.6")]
    pub chat_temperature: f32,

    // --- Embedding LLM Provider Args ---
    /// Type of LLM provider for text embedding (openai, ollama)
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "openai")]
    pub embedding_llm_type: String,

    /// Base URL for the Embedding LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_base_url: Option<String>,

    /// API Key for the Embedding LLM provider
    #[arg(long, env = "EMBEDDING_API_KEY", default_value = "")]
    pub embedding_api_key: String,

    /// Model name for text embedding (e.g., text-embedding-3-small, nomic-embed-text)
    #[arg(long, env = "EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    // --- Image Generation Args ---
    /// Generate an illustration for every answer.
    #[arg(long, env = "ENABLE_IMAGE", action = ArgAction::Set, default_value = "true")]
    pub enable_image: bool,

    /// Base URL for the image generation API. Defaults to CHAT_BASE_URL if not set.
    #[arg(long, env = "IMAGE_BASE_URL")]
    pub image_base_url: Option<String>,

    /// API Key for the image generation API. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "IMAGE_API_KEY")]
    pub image_api_key: Option<String>,

    /// Model name for image generation.
    #[arg(long, env = "IMAGE_MODEL", default_value = "black-forest-labs/flux-schnell")]
    pub image_model: String,

    /// Requested image size (WIDTHxHEIGHT).
    #[arg(long, env = "IMAGE_SIZE", default_value = "256x256")]
    pub image_size: String,

    /// Seconds to wait for an image before answering without one.
    #[arg(long, env = "IMAGE_TIMEOUT_SECS", default_value = "20")]
    pub image_timeout_secs: u64,

    // --- Vector Store Args ---
    /// Qdrant gRPC endpoint
    #[arg(long, env = "VECTOR_HOST", default_value = "http://localhost:6334")]
    pub vector_host: String,

    /// API key for Qdrant
    #[arg(short = 'k', long, env = "VECTOR_SECRET")]
    pub vector_secret: Option<String>,

    /// Collection holding the knowledge base documents.
    #[arg(long, env = "VECTOR_COLLECTION", default_value = "")]
    pub vector_collection: String,

    /// Named vector to search. Leave unset for collections with a single unnamed vector.
    #[arg(long, env = "VECTOR_NAME")]
    pub vector_name: Option<String>,

    /// Number of nearest neighbours requested from the vector search.
    #[arg(long, env = "SEARCH_LIMIT", default_value = "10")]
    pub search_limit: usize,

    /// Number of top matches hydrated into the prompt context.
    #[arg(long, env = "CONTEXT_DOCUMENTS", default_value = "5")]
    pub context_documents: usize,

    #[arg(long, env = "SEARCH_TIMEOUT_MS", default_value = "5000")]
    pub search_timeout_ms: u64,

    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "2000")]
    pub fetch_timeout_ms: u64,

    // --- General App Args ---
    /// Path to a prompt configuration file. Built-in prompts are used if not set.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Chat requests accepted per second across all clients.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

/// Terminal chat client.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Chat endpoint of a running server.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://127.0.0.1:4000/api/chat")]
    pub endpoint: String,

    /// Assistant message shown before the first question.
    #[arg(
        long,
        env = "CHAT_GREETING",
        default_value = "Hello there! I'm your Star Wars guide. Ask me anything about the galaxy far, far away."
    )]
    pub greeting: String,
}
