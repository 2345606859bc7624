use axum::{
    extract::{Path, Request, State},
    Extension, Json,
};
use bmessage_core::{ConversationEntry, Deletion, MessageView};
use bmessage_store::{Message, PrivateChat};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, Form, JsonBody};
use crate::auth::CurrentUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct EditMessageRequest {
    text: String,
}

#[derive(Serialize)]
pub(super) struct DeleteMessageResponse {
    success: bool,
    tombstoned: bool,
}

pub(super) async fn list_conversations(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<ConversationEntry>>, ServerError> {
    Ok(Json(state.run(move |m| m.list_conversations(&user_id)).await?))
}

pub(super) async fn get_messages(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageView>>, ServerError> {
    Ok(Json(state.run(move |m| m.messages(&id, &user_id)).await?))
}

/// Accepts multipart (`text`, optional `file`) or JSON (`text`).
pub(super) async fn post_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<MessageView>, ServerError> {
    let mut form = Form::read(request, "file").await?;
    let text = form.text("text").unwrap_or_default().to_string();

    let (chat_id, author_id) = (id.clone(), user_id.clone());
    state
        .run(move |m| m.check_post_access(&chat_id, &author_id))
        .await?;

    let file = match form.take_file() {
        Some(upload) => Some(upload.store(&state.uploads).await?),
        None => None,
    };
    if let Some(file) = &file {
        info!(user = %user_id, file = %file.filename, size = file.size, "Attachment uploaded");
    }

    let view = state
        .run(move |m| m.post_message(&id, &user_id, text, file))
        .await?;
    Ok(Json(view))
}

pub(super) async fn edit_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, message_id)): Path<(String, String)>,
    JsonBody(body): JsonBody<EditMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let edited = state
        .run(move |m| m.edit_message(&id, &message_id, &user_id, body.text))
        .await?;
    Ok(Json(edited))
}

pub(super) async fn delete_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, message_id)): Path<(String, String)>,
) -> Result<Json<DeleteMessageResponse>, ServerError> {
    let deletion = state
        .run(move |m| m.delete_message(&id, &message_id, &user_id))
        .await?;
    Ok(Json(DeleteMessageResponse {
        success: true,
        tombstoned: matches!(deletion, Deletion::Tombstoned(_)),
    }))
}

pub(super) async fn create_private_chat(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(target_id): Path<String>,
) -> Result<Json<PrivateChat>, ServerError> {
    let chat = state
        .run(move |m| m.create_private_chat(&user_id, &target_id))
        .await?;
    Ok(Json(chat))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn chat_between(app: &TestApp, a: &str, b: &str) -> String {
        app.call("GET", "/profile", Some(b), None).await;
        let (status, body) = app
            .call("POST", &format!("/chats/create/{b}"), Some(a), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_private_chat_is_reused() {
        let app = TestApp::new().await;
        let first = chat_between(&app, "alice", "bob").await;
        let second = chat_between(&app, "bob", "alice").await;
        assert_eq!(first, second);

        let (status, _) = app
            .call("POST", "/chats/create/nobody", Some("alice"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .call("POST", "/chats/create/alice", Some("alice"), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_message_lifecycle_over_http() {
        let app = TestApp::new().await;
        let chat = chat_between(&app, "alice", "bob").await;
        let uri = format!("/chats/{chat}/messages");

        let (status, posted) = app
            .call("POST", &uri, Some("alice"), Some(json!({ "text": "hello" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["user"]["id"], "alice");
        let message_id = posted["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call("POST", &uri, Some("alice"), Some(json!({ "text": "" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let edit_uri = format!("/chats/{chat}/messages/{message_id}");
        let (status, _) = app
            .call("PUT", &edit_uri, Some("bob"), Some(json!({ "text": "mine now" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, edited) = app
            .call("PUT", &edit_uri, Some("alice"), Some(json!({ "text": "hello!" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["text"], "hello!");
        assert!(edited.get("edited").is_some());

        let (status, _) = app.call("GET", &uri, Some("carol"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.call("DELETE", &edit_uri, Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tombstoned"], false);

        let (_, messages) = app.call("GET", &uri, Some("alice"), None).await;
        assert_eq!(messages, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_file_message_is_tombstoned() {
        let app = TestApp::new().await;
        let chat = chat_between(&app, "alice", "bob").await;
        let uri = format!("/chats/{chat}/messages");

        let (status, posted) = app
            .multipart(
                &uri,
                "alice",
                &[("text", "")],
                Some(("file", "notes.txt", "text/plain", &b"some notes"[..])),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["file"]["type"], "text");
        assert_eq!(posted["file"]["name"], "notes.txt");
        let url = posted["file"]["url"].as_str().unwrap().to_string();
        let message_id = posted["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call("DELETE", &format!("{uri}/{message_id}"), Some("alice"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tombstoned"], true);

        let (_, messages) = app.call("GET", &uri, Some("bob"), None).await;
        assert_eq!(messages[0]["deleted"], true);
        assert!(messages[0].get("file").is_none());

        let (status, body) = app
            .call("PUT", &format!("{uri}/{message_id}"), Some("alice"), Some(json!({ "text": "back" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let (status, body) = app
            .call("DELETE", &format!("{uri}/{message_id}"), Some("alice"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tombstoned"], true);
        let (_, messages) = app.call("GET", &uri, Some("bob"), None).await;
        assert_eq!(messages.as_array().unwrap().len(), 1);

        // the stored file itself is kept
        let request = axum::http::Request::builder()
            .uri(url)
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app.router.clone(), request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_marks_conversation_type() {
        let app = TestApp::new().await;
        let chat = chat_between(&app, "alice", "bob").await;
        app.call(
            "POST",
            &format!("/chats/{chat}/messages"),
            Some("bob"),
            Some(json!({ "text": "hi" })),
        )
        .await;

        let (status, body) = app.call("GET", "/chats", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["type"], "private");
        assert_eq!(body[0]["otherUser"]["id"], "bob");
        assert_eq!(body[0]["messages"][0]["text"], "hi");
    }
}
