//! `/api/chat` end to end through the router, with in-memory providers.

use async_trait::async_trait;
use axum::body::{ to_bytes, Body };
use axum::http::{ header, Request, StatusCode };
use axum::Router;
use futures::stream;
use serde_json::{ json, Value };
use starguide::agent::ChatAgent;
use starguide::config::prompt::PromptConfig;
use starguide::llm::chat::{ ChatClient, TokenStream };
use starguide::llm::embedding::{ EmbeddingClient, EmbeddingResponse };
use starguide::llm::image::ImageClient;
use starguide::models::chat::WireMessage;
use starguide::rag::{ RetrievalSettings, Retriever };
use starguide::server::api::{ router, AppState };
use starguide::store::{ DocumentStore, LazyStore, SearchHit, StoreError };
use std::error::Error as StdError;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingClient for CountingEmbedder {
    async fn embed(&self, _: &str) -> Result<EmbeddingResponse, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResponse { embedding: vec![0.5, 0.5] })
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

struct Store {
    offline: bool,
}

#[async_trait]
impl DocumentStore for Store {
    async fn search(&self, _: &[f32], _: usize) -> Result<Vec<SearchHit>, StoreError> {
        if self.offline {
            return Err(StoreError::Search("connection refused".into()));
        }
        Ok(vec![SearchHit { id: "7".into(), score: 0.9 }])
    }

    async fn fetch(&self, _: &str) -> Result<Value, StoreError> {
        Ok(json!({ "name": "Tatooine", "climate": "arid" }))
    }
}

enum Reply {
    Tokens(Vec<&'static str>),
    BreaksAfter(&'static str),
    Refused,
}

struct Chat {
    reply: Reply,
}

#[async_trait]
impl ChatClient for Chat {
    async fn stream_chat(&self, _: &[WireMessage]) -> Result<TokenStream, BoxError> {
        match &self.reply {
            Reply::Tokens(tokens) => {
                let items: Vec<Result<String, BoxError>> = tokens
                    .iter()
                    .map(|t| Ok(t.to_string()))
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Reply::BreaksAfter(token) => {
                let items: Vec<Result<String, BoxError>> = vec![
                    Ok(token.to_string()),
                    Err("provider hung up".into())
                ];
                Ok(Box::pin(stream::iter(items)))
            }
            Reply::Refused => Err("401 Unauthorized".into()),
        }
    }

    fn get_model(&self) -> String {
        "fake".into()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

struct Image {
    result: Result<&'static str, &'static str>,
}

#[async_trait]
impl ImageClient for Image {
    async fn generate(&self, _: &str) -> Result<String, BoxError> {
        self.result.map(str::to_string).map_err(|e| e.into())
    }
}

struct Fixture {
    embedder: Arc<CountingEmbedder>,
    reply: Reply,
    image: Option<Result<&'static str, &'static str>>,
    store_offline: bool,
    rate: u32,
}

impl Fixture {
    fn new(reply: Reply) -> Self {
        Self {
            embedder: Arc::new(CountingEmbedder::default()),
            reply,
            image: None,
            store_offline: false,
            rate: 100,
        }
    }

    fn app(self) -> (Router, Arc<CountingEmbedder>) {
        let retriever = Retriever::new(
            self.embedder.clone(),
            Arc::new(LazyStore::ready(Arc::new(Store { offline: self.store_offline }))),
            RetrievalSettings::default()
        );
        let image_client = self.image.map(|result| Arc::new(Image { result }) as Arc<dyn ImageClient>);
        let agent = ChatAgent::new(
            Arc::new(Chat { reply: self.reply }),
            image_client,
            retriever,
            Arc::new(PromptConfig::default()),
            Duration::from_secs(1)
        );
        (router(AppState::new(Arc::new(agent), self.rate)), self.embedder)
    }
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn question() -> Value {
    json!({ "messages": [
        { "role": "assistant", "content": "Hello there!" },
        { "role": "user", "content": "Tell me about Tatooine" }
    ] })
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn reply_starts_with_image_frame() {
    let mut fixture = Fixture::new(Reply::Tokens(vec!["Twin ", "", "suns."]));
    fixture.image = Some(Ok("https://cdn.example/tatooine.png"));
    let (app, _) = fixture.app();

    let resp = app.oneshot(chat_request(question())).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(resp.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(
        body_text(resp).await,
        "!IMAGE_URL!https://cdn.example/tatooine.png!IMAGE_URL!\n\nTwin suns."
    );
}

#[tokio::test]
async fn failed_image_still_answers() {
    let mut fixture = Fixture::new(Reply::Tokens(vec!["Sand."]));
    fixture.image = Some(Err("content policy"));
    let (app, _) = fixture.app();

    let resp = app.oneshot(chat_request(question())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "Sand.");
}

#[tokio::test]
async fn retrieval_failure_is_a_generic_500() {
    let mut fixture = Fixture::new(Reply::Tokens(vec!["never sent"]));
    fixture.store_offline = true;
    let (app, _) = fixture.app();

    let resp = app.oneshot(chat_request(question())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Error processing request");
}

#[tokio::test]
async fn completion_refusal_is_a_generic_500() {
    let mut fixture = Fixture::new(Reply::Refused);
    fixture.image = Some(Ok("https://cdn.example/ok.png"));
    let (app, _) = fixture.app();

    let resp = app.oneshot(chat_request(question())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Error processing request");
}

#[tokio::test]
async fn mid_stream_failure_aborts_the_body() {
    let (app, _) = Fixture::new(Reply::BreaksAfter("Partial")).app();

    let resp = app.oneshot(chat_request(question())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(to_bytes(resp.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn invalid_payloads_never_reach_providers() {
    let (app, embedder) = Fixture::new(Reply::Tokens(vec!["x"])).app();

    let bad_bodies = vec![
        json!({ "messages": [{ "role": "system", "content": "hi" }] }),
        json!({ "messages": [{ "role": "user", "content": 42 }] }),
        json!({ "messages": [] }),
        json!({ "prompt": "hi" })
    ];
    for body in bad_bodies {
        let resp = app.clone().oneshot(chat_request(body.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(question().to_string()))
        .unwrap();
    let resp = app.oneshot(no_content_type).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn excess_requests_are_throttled() {
    let mut fixture = Fixture::new(Reply::Tokens(vec!["ok"]));
    fixture.rate = 1;
    let (app, embedder) = fixture.app();

    let first = app.clone().oneshot(chat_request(question())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(chat_request(question())).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_text(second).await, "Too many requests");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_check() {
    let (app, _) = Fixture::new(Reply::Tokens(vec![])).app();
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}
