pub mod openai;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use self::openai::OpenAIImageClient;

#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Generates one image and returns a URL the browser can load.
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn StdError + Send + Sync>>;
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub size: String,
}

pub fn new_client(
    config: &ImageConfig
) -> Result<Arc<dyn ImageClient>, Box<dyn StdError + Send + Sync>> {
    Ok(Arc::new(OpenAIImageClient::from_config(config)?))
}
