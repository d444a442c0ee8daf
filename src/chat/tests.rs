use super::*;
use std::sync::Mutex;

/// Replies with a canned answer and records every history it was given
struct ScriptedBackend {
    replies: Mutex<Vec<Result<Option<String>, String>>>,
    seen: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<Option<String>, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn generate(&self, history: &[ChatTurn]) -> Result<Option<String>> {
        self.seen.lock().expect("lock").push(history.to_vec());
        self.replies
            .lock()
            .expect("lock")
            .pop()
            .expect("script exhausted")
            .map_err(|message| anyhow::anyhow!(message))
    }
}

#[tokio::test]
async fn history_grows_with_each_exchange() {
    let backend = ScriptedBackend::new(vec![
        Ok(Some("first reply".to_string())),
        Ok(Some("second reply".to_string())),
    ]);
    let mut session = ChatSession::new(Arc::clone(&backend) as Arc<dyn ChatBackend>);

    let reply = session.send_message("one").await.expect("send works");
    assert_eq!(reply.as_deref(), Some("first reply"));
    session.send_message("two").await.expect("send works");

    assert_eq!(
        session.history(),
        &[
            ChatTurn::user("one"),
            ChatTurn::model("first reply"),
            ChatTurn::user("two"),
            ChatTurn::model("second reply"),
        ]
    );

    let seen = backend.seen.lock().expect("lock");
    assert_eq!(seen[1].len(), 3);
    assert_eq!(seen[1][2], ChatTurn::user("two"));
}

#[tokio::test]
async fn failed_or_empty_exchanges_are_not_recorded() {
    let backend = ScriptedBackend::new(vec![Err("boom".to_string()), Ok(None)]);
    let mut session = ChatSession::new(backend);

    assert!(session.send_message("one").await.is_err());
    assert_eq!(session.send_message("two").await.expect("no error"), None);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn reset_clears_history() {
    let backend = ScriptedBackend::new(vec![Ok(Some("hi".to_string()))]);
    let mut session = ChatSession::new(backend);

    session.send_message("hello").await.expect("send works");
    assert_eq!(session.history().len(), 2);

    session.reset();
    assert!(session.history().is_empty());
}

#[test]
fn role_names_match_the_wire_format() {
    assert_eq!(ChatRole::User.to_string(), "user");
    assert_eq!(ChatRole::Model.to_string(), "model");
    assert_eq!(
        serde_json::to_string(&ChatRole::Model).expect("serializes"),
        "\"model\""
    );
}
