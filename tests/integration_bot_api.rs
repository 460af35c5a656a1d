//! Integration tests for the Bot API transport
//!
//! These drive the real `TelegramClient` over HTTP against a mock Bot API
//! server, including a full resolve-and-deliver pass through the scheduler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use vaultlink::bot::texts;
use vaultlink::config::TelegramConfig;
use vaultlink::db::{self, PayloadKind, PayloadRef, ShareLinkRepo};
use vaultlink::janitor::Janitor;
use vaultlink::relay::{PayloadRelay, BLANK_CAPTION};
use vaultlink::scheduler::{DeliveryOutcome, DeliveryScheduler};
use vaultlink::telegram::{CopyOptions, MessageRef, Messenger, TelegramClient};
use vaultlink::AppError;

const TOKEN: &str = "123:test";
const VAULT: i64 = -100_777;

/// Message id the mock refuses to delete, as if it were already gone
const GONE_MESSAGE: i64 = 404;

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

/// Mock Bot API server on a random port.
///
/// Records every JSON call and answers with Bot API shaped envelopes.
struct MockBotApi {
    calls: Calls,
    base_url: String,
    _task: tokio::task::JoinHandle<()>,
}

impl MockBotApi {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/{bot}/{method}", post(handle))
            .with_state(calls.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            calls,
            base_url: format!("http://{}", addr),
            _task: task,
        }
    }

    fn client(&self) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: TOKEN.to_string(),
            api_base: self.base_url.clone(),
            vault_chat_id: VAULT,
            admin_id: 1,
            bot_username: None,
            poll_timeout_secs: 1,
        })
        .unwrap()
    }

    fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn body_of(&self, method: &str) -> Value {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, body)| body.clone())
            .unwrap()
    }
}

async fn handle(
    State(calls): State<Calls>,
    Path((bot, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if bot != format!("bot{}", TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
        );
    }
    calls.lock().unwrap().push((method.clone(), body.clone()));

    let ok = |result: Value| (StatusCode::OK, Json(json!({"ok": true, "result": result})));
    let next_id = 100 + calls.lock().unwrap().len() as i64;

    match method.as_str() {
        "getMe" => ok(json!({"id": 1, "is_bot": true, "first_name": "Vault", "username": "VaultBot"})),
        "getUpdates" => ok(json!([{
            "update_id": 7,
            "message": {
                "message_id": 3,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 42, "first_name": "Ann"},
                "text": "/start abc"
            }
        }])),
        "sendMessage" => ok(json!({
            "message_id": next_id,
            "chat": {"id": body["chat_id"], "type": "private"},
            "text": body["text"]
        })),
        "editMessageText" | "sendChatAction" | "answerCallbackQuery" => ok(json!(true)),
        "copyMessage" => ok(json!({"message_id": next_id})),
        "deleteMessage" if body["message_id"] == GONE_MESSAGE => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to delete not found"
            })),
        ),
        "deleteMessage" => ok(json!(true)),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"ok": false, "error_code": 404, "description": "Not Found"})),
        ),
    }
}

#[tokio::test]
async fn test_get_me_and_updates() {
    let mock = MockBotApi::start().await;
    let client = mock.client();

    let me = client.get_me().await.unwrap();
    assert_eq!(me.username.as_deref(), Some("VaultBot"));

    let updates = client.get_updates(5).await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].sender().map(|u| u.id), Some(42));

    let body = mock.body_of("getUpdates");
    assert_eq!(body["offset"], 5);
    assert_eq!(body["allowed_updates"], json!(["message", "callback_query"]));
}

#[tokio::test]
async fn test_send_and_copy_bodies() {
    let mock = MockBotApi::start().await;
    let client = mock.client();

    let sent = client.send_text(42, "<b>hi</b>", None).await.unwrap();
    assert_eq!(sent.chat_id, 42);
    let body = mock.body_of("sendMessage");
    assert_eq!(body["parse_mode"], "HTML");
    assert_eq!(body["text"], "<b>hi</b>");

    let copied = client
        .copy_message(
            42,
            MessageRef::new(VAULT, 9),
            CopyOptions {
                caption: Some(BLANK_CAPTION.to_string()),
                keyboard: None,
                protect_content: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(copied.chat_id, 42);
    let body = mock.body_of("copyMessage");
    assert_eq!(body["from_chat_id"], VAULT);
    assert_eq!(body["message_id"], 9);
    assert_eq!(body["caption"], BLANK_CAPTION);
    assert_eq!(body["protect_content"], true);
}

#[tokio::test]
async fn test_delete_of_missing_message_is_recognised() {
    let mock = MockBotApi::start().await;
    let client = mock.client();

    client.delete_message(MessageRef::new(42, 5)).await.unwrap();
    let err = client
        .delete_message(MessageRef::new(42, GONE_MESSAGE))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UpstreamRelay { .. }));
    assert!(err.is_already_deleted());
}

#[tokio::test]
async fn test_wrong_token_is_an_upstream_error() {
    let mock = MockBotApi::start().await;
    let client = TelegramClient::new(&TelegramConfig {
        bot_token: "999:wrong".to_string(),
        api_base: mock.base_url.clone(),
        vault_chat_id: VAULT,
        admin_id: 1,
        bot_username: None,
        poll_timeout_secs: 1,
    })
    .unwrap();

    let err = client.get_me().await.unwrap_err();
    assert!(matches!(err, AppError::Http(_) | AppError::UpstreamRelay { .. }));
    assert!(mock.methods().is_empty());
}

#[tokio::test]
async fn test_resolve_and_deliver_over_http() {
    let mock = MockBotApi::start().await;
    let messenger: Arc<dyn Messenger> = Arc::new(mock.client());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_db(&pool).await.unwrap();

    let token = ShareLinkRepo::mint(
        &pool,
        &PayloadRef {
            message_id: 50,
            kind: PayloadKind::Video,
        },
    )
    .await
    .unwrap();
    ShareLinkRepo::append_to_group(
        &pool,
        &token,
        &PayloadRef {
            message_id: 51,
            kind: PayloadKind::Generic,
        },
    )
    .await
    .unwrap();

    let janitor = Arc::new(Janitor::new(messenger.clone()));
    let relay = Arc::new(PayloadRelay::new(messenger, VAULT, false));
    let scheduler = DeliveryScheduler::new(
        pool,
        relay,
        janitor.clone(),
        Duration::from_millis(200),
        Duration::from_secs(60),
        texts::DELIVERY_NOTICES,
    );

    let outcome = scheduler.deliver(token.as_str(), 42).await.unwrap();
    let DeliveryOutcome::Delivered(batch) = outcome else {
        panic!("expected a delivery");
    };
    assert_eq!(batch.delivered.len(), 3);
    assert_eq!(
        mock.methods(),
        vec!["sendMessage", "sendChatAction", "copyMessage", "copyMessage"]
    );

    // Captioned kinds get the blank caption, generic copies are verbatim
    let copies: Vec<Value> = mock
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|(m, _)| m == "copyMessage")
        .map(|(_, body)| body.clone())
        .collect();
    assert_eq!(copies[0]["caption"], BLANK_CAPTION);
    assert!(copies[1].get("caption").is_none());

    tokio::time::sleep(Duration::from_millis(600)).await;
    let deletes = mock
        .methods()
        .iter()
        .filter(|m| m.as_str() == "deleteMessage")
        .count();
    assert_eq!(deletes, 3);
    janitor.shutdown();
}
