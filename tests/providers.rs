//! Provider backends against a mocked HTTP API.

use futures::StreamExt;
use starguide::llm::chat::ChatClient;
use starguide::llm::chat::ollama::OllamaClient;
use starguide::llm::chat::openai::OpenAIChatClient;
use starguide::llm::image::ImageClient;
use starguide::llm::image::openai::OpenAIImageClient;
use starguide::models::chat::WireMessage;
use wiremock::matchers::{ body_partial_json, header, method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

async fn collect_tokens(client: &dyn ChatClient) -> Vec<String> {
    let stream = client.stream_chat(&[WireMessage::user("Who is Ahsoka?")]).await.unwrap();
    stream.map(|item| item.unwrap()).collect().await
}

#[tokio::test]
async fn openai_streams_sse_deltas() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Ahsoka \"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Tano\"}}]}\n\n",
        "data: [DONE]\n\n"
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "stream": true, "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&mock_server).await;

    let client = OpenAIChatClient::new(
        "test-key".into(),
        Some("test-model".into()),
        Some(mock_server.uri()),
        None
    ).unwrap();

    assert_eq!(collect_tokens(&client).await, vec!["Ahsoka ", "Tano"]);
}

#[tokio::test]
async fn openai_refusal_fails_before_streaming() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server).await;

    let client = OpenAIChatClient::new("k".into(), None, Some(mock_server.uri()), None).unwrap();
    let result = client.stream_chat(&[WireMessage::user("hi")]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ollama_streams_ndjson_lines() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Hello\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\" there\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n"
    );

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&mock_server).await;

    let client = OllamaClient::new(Some(mock_server.uri()), Some("llama3".into()), Some(0.2));
    assert_eq!(collect_tokens(&client).await, vec!["Hello", " there"]);
}

#[tokio::test]
async fn image_client_returns_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(header("authorization", "Bearer img-key"))
        .and(body_partial_json(serde_json::json!({ "size": "256x256", "response_format": "url" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "data": [{ "url": "https://cdn.example/falcon.png" }] })
            )
        )
        .expect(1)
        .mount(&mock_server).await;

    let client = OpenAIImageClient::new(
        "img-key".into(),
        Some(mock_server.uri()),
        None,
        "256x256".into()
    );
    let url = client.generate("the Millennium Falcon").await.unwrap();
    assert_eq!(url, "https://cdn.example/falcon.png");
}

#[tokio::test]
async fn image_client_falls_back_to_inline_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [{ "b64_json": "AAAA" }] }))
        )
        .mount(&mock_server).await;

    let client = OpenAIImageClient::new("k".into(), Some(mock_server.uri()), None, "256x256".into());
    assert_eq!(client.generate("x").await.unwrap(), "data:image/png;base64,AAAA");
}

#[tokio::test]
async fn image_client_surfaces_http_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server).await;

    let client = OpenAIImageClient::new("k".into(), Some(mock_server.uri()), None, "256x256".into());
    assert!(client.generate("x").await.is_err());
}

#[tokio::test]
async fn ollama_error_line_fails_the_stream() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"The Force\"},\"done\":false}\n",
        "{\"error\":\"model runner crashed\"}\n"
    );

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&mock_server).await;

    let client = OllamaClient::new(Some(mock_server.uri()), None, None);
    let items: Vec<_> = client
        .stream_chat(&[WireMessage::user("hi")]).await
        .unwrap()
        .collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "The Force");
    let err = items[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("model runner crashed"));
}

#[tokio::test]
async fn openai_error_event_fails_the_stream() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"server overloaded\",\"type\":\"server_error\"}}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n"
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server).await;

    let client = OpenAIChatClient::new("k".into(), None, Some(mock_server.uri()), None).unwrap();
    let items: Vec<_> = client
        .stream_chat(&[WireMessage::user("hi")]).await
        .unwrap()
        .collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Hel");
    assert!(items[1].as_ref().unwrap_err().to_string().contains("server overloaded"));
}
