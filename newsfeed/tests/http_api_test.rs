use mockito::Matcher;
use newsfeed::api::http::HttpNewsApi;
use newsfeed::api::{NewsApi, NewsQuery};
use newsfeed::ApiError;
use serde_json::json;

fn query() -> NewsQuery {
    NewsQuery {
        query_news: "ml".to_string(),
        query_edge: "aiml".to_string(),
    }
}

#[tokio::test]
async fn test_daily_news_posts_query_and_reads_articles() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/get_daily_news")
        .match_body(Matcher::Json(json!({"query_news": "ml", "query_edge": "aiml"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "Articles": [
                    {"id": 1, "title": "First", "label": "AIML", "urls": "https://a.example/1"},
                    {"id": 2, "title": "Second", "publishedAt": "2024-05-01T10:00:00Z"}
                ]
            }"#,
        )
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let articles = api.daily_news(&query()).await.unwrap();

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].id, 1);
    assert_eq!(articles[0].title.as_deref(), Some("First"));
    assert_eq!(articles[0].label.as_deref(), Some("AIML"));
    assert!(articles[1].label.is_none());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_daily_news_without_articles_field_is_payload_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/get_daily_news")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"news": []}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let err = api.daily_news(&query()).await.unwrap_err();
    assert!(matches!(err, ApiError::Payload(ref m) if m == "Articles not found in response"));
}

#[tokio::test]
async fn test_summarize_sends_comma_joined_ids() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/summarize")
        .match_query(Matcher::UrlEncoded("urls".into(), "4,5,6".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"summary": "All three articles discuss models."}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let summary = api.summarize(&[4, 5, 6]).await.unwrap();
    assert_eq!(summary, "All three articles discuss models.");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_summarize_empty_summary_is_invalid_format() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/summarize")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"summary": ""}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let err = api.summarize(&[1]).await.unwrap_err();
    assert!(matches!(err, ApiError::Payload(ref m) if m == "Invalid response format from API"));
}

#[tokio::test]
async fn test_non_success_status_carries_body() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/summarize")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("model overloaded")
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    match api.summarize(&[1, 2]).await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_audio_returns_raw_bytes() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/get_audio")
        .match_body(Matcher::Json(json!({"urls": [4, 5, 6]})))
        .with_status(200)
        .with_header("content-type", "audio/mpeg")
        .with_body(vec![0x49u8, 0x44, 0x33, 0x04])
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let bytes = api.audio(&[4, 5, 6]).await.unwrap();
    assert_eq!(bytes, vec![0x49, 0x44, 0x33, 0x04]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_open_chat_accepts_numeric_and_string_ids() {
    let mut server = mockito::Server::new_async().await;

    let _numeric = server
        .mock("GET", "/chat")
        .match_query(Matcher::UrlEncoded("urls".into(), "7".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"chat_id": 42}"#)
        .create_async()
        .await;
    let _string = server
        .mock("GET", "/chat")
        .match_query(Matcher::UrlEncoded("urls".into(), "8".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"chat_id": "abc-123"}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    assert_eq!(api.open_chat(&[7]).await.unwrap(), "42");
    assert_eq!(api.open_chat(&[8]).await.unwrap(), "abc-123");
}

#[tokio::test]
async fn test_open_chat_without_id_is_payload_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/chat")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "ok"}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    assert!(matches!(api.open_chat(&[1]).await, Err(ApiError::Payload(_))));
}

#[tokio::test]
async fn test_continue_chat_posts_session_and_text() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/continue_chat")
        .match_body(Matcher::Json(json!({"chat_id": "s1", "text": "hello"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": "hi there"}"#)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let reply = api.continue_chat("s1", "hello").await.unwrap();
    assert_eq!(reply, "hi there");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_json_is_payload_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/continue_chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("not json")
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    assert!(matches!(
        api.continue_chat("s1", "hello").await,
        Err(ApiError::Payload(_))
    ));
}

#[tokio::test]
async fn test_continue_chat_without_session_is_rejected_locally() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/continue_chat")
        .expect(0)
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    assert!(matches!(
        api.continue_chat("", "hello").await,
        Err(ApiError::NoSession)
    ));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_daily_news_skips_malformed_entries() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/get_daily_news")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "Articles": [
                    {"id": "seven", "title": "String id"},
                    {"id": 3, "title": "Good"},
                    {"title": "No id"},
                    "not an object"
                ]
            }"#,
        )
        .create_async()
        .await;

    let api = HttpNewsApi::new(server.url());
    let articles = api.daily_news(&query()).await.unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].id, 3);
    assert_eq!(articles[0].title.as_deref(), Some("Good"));
}
