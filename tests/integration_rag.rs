#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for ingestion, retrieval and chat
// The hosted provider is replaced by a wiremock server; the vector database is real

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rag_chat::IngestSource;
use rag_chat::commands::App;
use rag_chat::config::{Config, ProviderConfig};
use rag_chat::credentials::CredentialStore;

const EMBED_PATH: &str = "/v1beta/models/text-embedding-004:embedContent";
const CHAT_PATH: &str = "/v1beta/models/gemini-test:generateContent";

/// Create an app whose provider points at `server` and whose data lives in a temp dir
fn create_test_app(server: &MockServer) -> anyhow::Result<(App, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = Config {
        provider: ProviderConfig {
            base_url: format!("{}/v1beta/", server.uri()),
            chat_model: "gemini-test".to_string(),
            embedding_dimension: 3,
            ..ProviderConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let credentials = CredentialStore::default();
    credentials.set("integration-key");
    Ok((App::new(config, credentials)?, temp_dir))
}

async fn mount_embedding(server: &MockServer, text: &str, values: [f32; 3]) {
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_partial_json(json!({
            "content": { "parts": [{ "text": text }] }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": values } })),
        )
        .mount(server)
        .await;
}

async fn mount_reply(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": reply }] } }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ingest_then_search_ranks_related_passage_first() {
    let server = MockServer::start().await;
    mount_embedding(&server, "hello world", [1.0, 0.0, 0.0]).await;
    mount_embedding(&server, "goodbye moon", [0.0, 1.0, 0.0]).await;
    mount_embedding(&server, "hello", [0.9, 0.1, 0.0]).await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");

    let first = app
        .rag
        .ingest(IngestSource::Text("hello world".to_string()))
        .await
        .expect("can ingest first passage");
    let second = app
        .rag
        .ingest(IngestSource::Text("goodbye moon".to_string()))
        .await
        .expect("can ingest second passage");
    assert!(second.id > first.id);

    let matches = app.rag.search("hello", 5).await.expect("search works");
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].content, "hello world");
    assert_eq!(matches[0].id, first.id);
    assert!(matches[0].distance <= matches[1].distance);
}

#[tokio::test]
async fn chat_answer_is_grounded_in_stored_passages() {
    let server = MockServer::start().await;
    mount_embedding(&server, "Rust was first released in 2015.", [1.0, 0.0, 0.0]).await;
    mount_embedding(&server, "When was Rust released?", [0.95, 0.05, 0.0]).await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_string_contains(
            "The following is relevant information:\\nRust was first released in 2015.\\n\\nUser question: When was Rust released?",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "In **2015**." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");
    app.rag
        .ingest(IngestSource::Text("Rust was first released in 2015.".to_string()))
        .await
        .expect("can ingest passage");

    let mut conversation = app.conversation();
    let reply = conversation
        .send("When was Rust released?")
        .await
        .expect("reply appended");

    assert_eq!(reply.text, "In **2015**.");
    assert_eq!(conversation.messages().len(), 2);
}

#[tokio::test]
async fn empty_store_forwards_the_raw_question() {
    let server = MockServer::start().await;
    mount_embedding(&server, "Hi there", [0.0, 0.0, 1.0]).await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Hi there" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello!" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");
    let mut conversation = app.conversation();

    let reply = conversation.send("Hi there").await.expect("reply appended");
    assert_eq!(reply.text, "Hello!");
}

#[tokio::test]
async fn follow_up_questions_carry_the_session_history() {
    let server = MockServer::start().await;
    mount_embedding(&server, "first", [1.0, 0.0, 0.0]).await;
    mount_embedding(&server, "second", [0.0, 1.0, 0.0]).await;
    mount_reply(&server, "noted").await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");
    let mut conversation = app.conversation();
    conversation.send("first").await.expect("reply appended");
    conversation.send("second").await.expect("reply appended");

    let requests = server.received_requests().await.expect("requests recorded");
    let last_chat = requests
        .iter()
        .rev()
        .find(|request| request.url.path() == CHAT_PATH)
        .expect("a chat request was sent");
    let body: serde_json::Value = serde_json::from_slice(&last_chat.body).expect("json body");
    let contents = body["contents"].as_array().expect("contents array");

    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["parts"][0]["text"], "first");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "second");
}

#[tokio::test]
async fn provider_failure_is_reported_in_the_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");
    let mut conversation = app.conversation();

    let reply = conversation.send("anything").await.expect("reply appended");
    assert!(reply.is_error());
    assert!(reply.text.starts_with("Error: "));
    assert!(reply.text.contains("Permission denied"), "{}", reply.text);
}

#[tokio::test]
async fn stored_passages_are_visible_to_raw_sql() {
    let server = MockServer::start().await;
    mount_embedding(&server, "alpha", [1.0, 0.0, 0.0]).await;
    mount_embedding(&server, "beta", [0.0, 1.0, 0.0]).await;

    let (app, _temp_dir) = create_test_app(&server).expect("can create test app");
    for text in ["alpha", "beta"] {
        app.rag
            .ingest(IngestSource::Text(text.to_string()))
            .await
            .expect("can ingest passage");
    }

    let database = app.database.handle().await.expect("database opens");
    let results = database
        .execute_sql("SELECT content FROM passages ORDER BY id; SELECT count(*) AS n FROM passage_index")
        .await
        .expect("sql runs");

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].row_maps(),
        vec![
            json!({ "content": "alpha" }).as_object().cloned().expect("object"),
            json!({ "content": "beta" }).as_object().cloned().expect("object"),
        ]
    );
    assert_eq!(results[1].row_maps()[0]["n"], 2);
    assert_eq!(database.count_passages().await.expect("count"), 2);
}

#[tokio::test]
async fn database_file_is_created_lazily() {
    let server = MockServer::start().await;
    mount_embedding(&server, "lazy", [1.0, 0.0, 0.0]).await;

    let (app, temp_dir) = create_test_app(&server).expect("can create test app");
    let db_path = temp_dir.path().join("vectors.db");
    assert!(!db_path.exists());
    assert!(!app.database.is_initialized());

    app.rag
        .ingest(IngestSource::Text("lazy".to_string()))
        .await
        .expect("can ingest passage");
    assert!(db_path.exists());
    assert!(app.database.is_initialized());
}
