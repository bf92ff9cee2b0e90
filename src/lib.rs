pub mod agent;
pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod protocol;
pub mod rag;
pub mod server;
pub mod store;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Embedding LLM Type: {}", args.embedding_llm_type);
    info!("Image Generation: {}", args.enable_image);
    if args.enable_image {
        info!("Image Model: {} ({})", args.image_model, args.image_size);
        info!("Image Timeout: {}s", args.image_timeout_secs);
    }
    info!("Vector Store Host: {}", store::qdrant::redact_url(&args.vector_host));
    info!("Vector Collection: {}", args.vector_collection);
    info!("Vector Name: {}", args.vector_name.as_deref().unwrap_or("(default)"));
    info!("Search Limit: {} (hydrating {})", args.search_limit, args.context_documents);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
