use async_trait::async_trait;
use bytes::Bytes;
use futures::{ Stream, TryStreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use std::pin::Pin;

use crate::models::chat::ChatRequest;

/// Raw reply body, chunk by chunk as the network delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("connection lost: {0}")]
    Interrupted(String),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `request` and returns the reply body once the server accepted it.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: HttpClient::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        debug!("POST {} with {} message(s)", self.endpoint, request.messages.len());
        let resp = self.http.post(&self.endpoint).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        Ok(Box::pin(resp.bytes_stream().map_err(TransportError::from)))
    }
}
