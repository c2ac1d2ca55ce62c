//! End-to-end answer service calls against a mock HTTP endpoint.

use std::time::Duration;

use futures::StreamExt;
use insights_chat::backend::{
    BackendSettings, BackendVariant, HttpAnswerService, NO_RESPONSE_AVAILABLE,
    UNABLE_TO_GET_RESPONSE,
};
use insights_chat::replay::{ReplayFrame, ReplayPacing, replay};
use insights_chat::session::{ChatSession, Role};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WELCOME: &str = "Hello! What business metric can I fetch for you today?";

fn service(url: &str, variant: BackendVariant, tag_session: bool) -> HttpAnswerService {
    HttpAnswerService::new(BackendSettings {
        url: Url::parse(url).expect("valid url"),
        variant,
        tag_session,
    })
}

fn last_text(session: &ChatSession) -> &str {
    session.turns().last().expect("non-empty transcript").text()
}

#[tokio::test]
async fn text_response_answer_is_appended() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/chat/generate-response"))
        .and(body_json(json!({ "question": "revenue this month?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "message": { "text_response": "Revenue: $10,000" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answers = service(
        &format!("{}/dev/chat/generate-response", server.uri()),
        BackendVariant::TextResponse,
        false,
    );
    let mut session = ChatSession::start(WELCOME);

    let turn = session
        .submit_user_text("revenue this month?", &answers)
        .await
        .expect("submit succeeds")
        .expect("question was not blank");

    assert_eq!(turn.role(), Role::Assistant);
    assert_eq!(turn.text(), "Revenue: $10,000");
    assert_eq!(session.turns().len(), 3);
    assert_eq!(session.turns()[1].text(), "revenue this month?");
    assert_eq!(last_text(&session), "Revenue: $10,000");
}

#[tokio::test]
async fn connection_refused_becomes_error_turn() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let answers = service(
        &format!("http://127.0.0.1:{port}/dev/query"),
        BackendVariant::TextResponse,
        false,
    );
    let mut session = ChatSession::start(WELCOME);
    let before = session.turns().len();

    session
        .submit_user_text("revenue this month?", &answers)
        .await
        .expect("submit succeeds");

    assert_eq!(session.turns().len(), before + 2);
    let text = last_text(&session);
    let reason = text
        .strip_prefix("Error connecting to the API: ")
        .expect("transport error prefix");
    assert!(!reason.is_empty());
    assert!(!session.awaiting_answer());
}

#[tokio::test]
async fn analysis_answer_replays_exactly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/query"))
        .and(body_json(json!({ "query": "how are sales?" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "analysis": "Sales up 5%" })),
        )
        .mount(&server)
        .await;

    let answers = service(
        &format!("{}/dev/query", server.uri()),
        BackendVariant::Analysis,
        false,
    );
    let mut session = ChatSession::start(WELCOME);
    session
        .submit_user_text("how are sales?", &answers)
        .await
        .expect("submit succeeds");

    let text = session
        .render_transcript()
        .latest_assistant_text()
        .expect("assistant turn")
        .to_string();
    let pacing = ReplayPacing {
        typing_delay: Duration::from_millis(1),
        word_delay: Duration::from_millis(1),
    };
    let frames: Vec<_> = replay(text, pacing).collect().await;

    assert_eq!(frames.first(), Some(&ReplayFrame::Typing));
    assert_eq!(
        frames.last(),
        Some(&ReplayFrame::Complete {
            text: "Sales up 5%".to_string()
        })
    );
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let answers = service(&server.uri(), BackendVariant::TextResponse, false);
    let mut session = ChatSession::start(WELCOME);
    session
        .submit_user_text("revenue?", &answers)
        .await
        .expect("submit succeeds");

    let text = last_text(&session);
    assert!(text.starts_with("Error connecting to the API: "), "{text}");
    assert!(text.contains("500"), "{text}");
}

#[tokio::test]
async fn unexpected_shape_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": false })))
        .mount(&server)
        .await;

    let answers = service(&server.uri(), BackendVariant::TextResponse, false);
    let mut session = ChatSession::start(WELCOME);
    session
        .submit_user_text("revenue?", &answers)
        .await
        .expect("submit succeeds");

    assert_eq!(last_text(&session), UNABLE_TO_GET_RESPONSE);
}

#[tokio::test]
async fn null_answer_uses_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "message": { "text_response": null }
        })))
        .mount(&server)
        .await;

    let answers = service(&server.uri(), BackendVariant::TextResponse, false);
    let mut session = ChatSession::start(WELCOME);
    session
        .submit_user_text("revenue?", &answers)
        .await
        .expect("submit succeeds");

    assert_eq!(last_text(&session), NO_RESPONSE_AVAILABLE);
}

#[tokio::test]
async fn undecodable_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let answers = service(&server.uri(), BackendVariant::Analysis, false);
    let mut session = ChatSession::start(WELCOME);
    session
        .submit_user_text("sales?", &answers)
        .await
        .expect("submit succeeds");

    assert!(last_text(&session).starts_with("Error connecting to the API: "));
}

#[tokio::test]
async fn session_id_header_is_sent_when_enabled() {
    let server = MockServer::start().await;
    let mut session = ChatSession::start(WELCOME);

    Mock::given(method("POST"))
        .and(header("X-Session-Id", session.id().to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "analysis": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let answers = service(&server.uri(), BackendVariant::Analysis, true);
    session
        .submit_user_text("sales?", &answers)
        .await
        .expect("submit succeeds");

    assert_eq!(last_text(&session), "ok");
}
