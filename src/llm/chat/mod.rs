pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt, Future };
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::WireMessage;
use log::debug;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazily produced completion fragments, in provider order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, Box<dyn StdError + Send + Sync>>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens a streaming completion over `messages`.
    ///
    /// Returns once the provider has accepted the request, so a refused or
    /// failed request surfaces here rather than inside the stream.
    async fn stream_chat(
        &self,
        messages: &[WireMessage]
    ) -> Result<TokenStream, Box<dyn StdError + Send + Sync>>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

/// Outcome of parsing one line of a streamed provider response.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    Token(String),
    Skip,
    Done,
    /// The provider reported a failure inside the stream.
    Error(String),
}

/// Splits a byte stream into lines, holding partial lines between chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(Self::to_line(&line[..line.len() - 1]));
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = Self::to_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    fn to_line(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).trim_end_matches('\r').to_string()
    }
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TokenStream
    where
        F: FnOnce(mpsc::Sender<Result<String, Box<dyn StdError + Send + Sync>>>) -> Fut +
            Send +
            'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Sends `request`, fails on a non-success status, then forwards the parsed
/// lines of the body as tokens.
pub async fn http_stream_lines(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> LineEvent
) -> Result<TokenStream, Box<dyn StdError + Send + Sync>> {
    let resp = request.send().await?.error_for_status()?;

    Ok(
        create_streaming_response(move |tx| async move {
            let mut bytes = resp.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(buf) => {
                        for line in lines.push(&buf) {
                            match line_parser(&line) {
                                LineEvent::Token(tok) => {
                                    if tx.send(Ok(tok)).await.is_err() {
                                        debug!("Token receiver dropped, stopping provider stream");
                                        return;
                                    }
                                }
                                LineEvent::Skip => {}
                                LineEvent::Done => {
                                    return;
                                }
                                LineEvent::Error(msg) => {
                                    let _ = tx.send(Err(format!("provider error: {}", msg).into())).await;
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as _)).await;
                        return;
                    }
                }
            }

            if let Some(line) = lines.finish() {
                match line_parser(&line) {
                    LineEvent::Token(tok) => {
                        let _ = tx.send(Ok(tok)).await;
                    }
                    LineEvent::Error(msg) => {
                        let _ = tx.send(Err(format!("provider error: {}", msg).into())).await;
                    }
                    LineEvent::Skip | LineEvent::Done => {}
                }
            }
        })
    )
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_joins_partial_lines() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\ndata: [DO"), vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(lines.push(b"NE]\n\n"), vec!["data: [DONE]".to_string(), String::new()]);
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn line_buffer_flushes_unterminated_tail() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"{\"done\":true}").is_empty());
        assert_eq!(lines.finish(), Some("{\"done\":true}".to_string()));
    }

    #[test]
    fn openai_requires_api_key() {
        let config = LlmConfig { llm_type: LlmType::OpenAI, ..Default::default() };
        assert!(new_client(&config).is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = LlmConfig { llm_type: LlmType::Ollama, ..Default::default() };
        let client = new_client(&config).unwrap();
        assert_eq!(client.get_base_url().as_deref(), Some("http://localhost:11434"));
    }
}
