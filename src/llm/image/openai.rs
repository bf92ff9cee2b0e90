use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ImageClient, ImageConfig };
use crate::llm::chat::openai::DEFAULT_BASE_URL;

const DEFAULT_MODEL: &str = "black-forest-labs/flux-schnell";

/// Client for OpenAI-compatible `images/generations` endpoints.
pub struct OpenAIImageClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
    model: String,
    size: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    response_format: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

impl OpenAIImageClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>, size: String) -> Self {
        Self {
            http: HttpClient::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            size,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "API key is required for image generation".to_string())?;
        Ok(Self::new(api_key, config.base_url.clone(), config.model.clone(), config.size.clone()))
    }
}

#[async_trait]
impl ImageClient for OpenAIImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/images/generations", self.base_url);
        let req = ImageRequest {
            model: &self.model,
            prompt,
            response_format: "url",
            size: &self.size,
            quality: "standard",
            n: 1,
        };

        debug!("Requesting image: model={}, size={}", self.model, self.size);
        let resp = self.http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<ImageResponse>().await?;

        let first = resp.data
            .into_iter()
            .next()
            .ok_or_else(|| "Image generation returned no data".to_string())?;

        match (first.url, first.b64_json) {
            (Some(url), _) => Ok(url),
            // some providers ignore response_format
            (None, Some(b64)) => Ok(format!("data:image/png;base64,{}", b64)),
            (None, None) => Err("Image generation returned neither url nor b64_json".into()),
        }
    }
}
