mod conversations;
mod groups;
mod notifications;
mod posts;
mod users;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, Method},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use bmessage_core::{Messenger, Stats};
use bmessage_shared::constants::UPLOADS_URL_PREFIX;
use bmessage_store::FileAttachment;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::require_auth;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::upload_store::{UploadStore, UploadUsage};

#[derive(Clone)]
pub struct AppState {
    pub messenger: Arc<Messenger>,
    pub uploads: Arc<UploadStore>,
    pub config: Arc<ServerConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Run a messenger call on the blocking pool. Storage access is
    /// synchronous and must stay off the runtime workers.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Messenger) -> bmessage_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let messenger = Arc::clone(&self.messenger);
        tokio::task::spawn_blocking(move || call(&messenger))
            .await
            .map_err(|e| ServerError::Internal(format!("messenger task failed: {e}")))?
            .map_err(ServerError::from)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/profile", get(users::get_profile).put(users::update_profile))
        .route("/profile/{id}", get(users::get_public_profile))
        .route("/settings", post(users::update_settings))
        .route("/users/{id}", get(users::get_user))
        .route("/users/search/{query}", get(users::search_users))
        .route("/chats", get(conversations::list_conversations))
        .route(
            "/chats/{id}/messages",
            get(conversations::get_messages).post(conversations::post_message),
        )
        .route(
            "/chats/{id}/messages/{message_id}",
            put(conversations::edit_message).delete(conversations::delete_message),
        )
        .route("/chats/create/{user_id}", post(conversations::create_private_chat))
        .route("/groups/create", post(groups::create_group))
        .route("/groups/join/{link}", post(groups::join_group))
        .route("/groups/{id}", get(groups::get_group).put(groups::update_group))
        .route("/groups/{id}/members", post(groups::add_member))
        .route("/groups/{id}/members/{user_id}", delete(groups::remove_member))
        .route("/groups/{id}/admins", post(groups::promote_admin))
        .route("/groups/{id}/admins/{user_id}", delete(groups::demote_admin))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{id}", put(posts::edit_post).delete(posts::delete_post))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/comment", post(posts::add_comment))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read/{id}", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Leave headroom for the multipart envelope around one maximum-size file.
    let body_limit = state.config.max_upload_size + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .merge(api)
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(state.uploads.base_path()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    uptime_secs: i64,
    max_upload_size: usize,
    #[serde(flatten)]
    stats: Stats,
    #[serde(flatten)]
    uploads: UploadUsage,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Result<Json<ServerInfoResponse>, ServerError> {
    Ok(Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        max_upload_size: state.config.max_upload_size,
        stats: state.run(|m| m.stats()).await?,
        uploads: state.uploads.usage().await?,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ─── Request bodies ───

/// A JSON body whose rejections are reported like every other API error.
pub(crate) struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

/// A file part received in a multipart body.
pub(crate) struct UploadedFile {
    name: String,
    mime: String,
    data: Bytes,
}

impl UploadedFile {
    pub(crate) async fn store(self, uploads: &UploadStore) -> Result<FileAttachment, ServerError> {
        uploads.store(&self.name, &self.mime, &self.data).await
    }
}

/// Text fields plus at most one file, read from either a multipart or a
/// JSON body.
#[derive(Default)]
pub(crate) struct Form {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl Form {
    pub(crate) fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub(crate) fn take_file(&mut self) -> Option<UploadedFile> {
        self.file.take()
    }

    /// Parse `file_field` as the file part. Other file parts are ignored.
    pub(crate) async fn read(request: Request, file_field: &str) -> Result<Self, ServerError> {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;
            Self::from_multipart(multipart, file_field).await
        } else if content_type.starts_with("application/json") {
            let JsonBody(body) = JsonBody::<Value>::from_request(request, &()).await?;
            Self::from_json(body)
        } else {
            Ok(Self::default())
        }
    }

    async fn from_multipart(mut multipart: Multipart, file_field: &str) -> Result<Self, ServerError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field && field.file_name().is_some() {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if form.file.is_none() {
                    form.file = Some(UploadedFile {
                        name: file_name,
                        mime,
                        data,
                    });
                }
            } else if field.file_name().is_none() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn from_json(body: Value) -> Result<Self, ServerError> {
        let Value::Object(map) = body else {
            return Err(ServerError::BadRequest("Expected a JSON object".to_string()));
        };
        let fields = map
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();
        Ok(Self { fields, file: None })
    }
}

#[derive(Serialize)]
pub(crate) struct SuccessResponse {
    success: bool,
}

pub(crate) fn success() -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bmessage_core::SessionKeyResolver;
    use bmessage_shared::SessionToken;
    use bmessage_store::{Backend, Database};
    use chrono::Duration;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub(crate) const BOUNDARY: &str = "bmessage-test-boundary";

    pub(crate) struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub backend: Arc<Database>,
        issuer: SigningKey,
        _uploads: TempDir,
    }

    impl TestApp {
        pub(crate) async fn new() -> Self {
            let uploads_dir = TempDir::new().unwrap();
            let issuer = SigningKey::generate(&mut OsRng);
            let backend = Arc::new(Database::open_in_memory().unwrap());
            let config = ServerConfig {
                upload_path: uploads_dir.path().to_path_buf(),
                max_upload_size: 64 * 1024,
                session_pubkey: issuer.verifying_key().to_bytes(),
                ..ServerConfig::default()
            };

            let messenger = Messenger::open(
                backend.clone() as Arc<dyn Backend>,
                Arc::new(SessionKeyResolver::new(config.session_pubkey)),
                Arc::new(bmessage_core::NoopSink),
            )
            .unwrap();
            let uploads = UploadStore::new(config.upload_path.clone(), config.max_upload_size)
                .await
                .unwrap();

            let state = AppState {
                messenger: Arc::new(messenger),
                uploads: Arc::new(uploads),
                config: Arc::new(config),
                started_at: Utc::now(),
            };
            let router = build_router(state.clone());

            Self {
                router,
                state,
                backend,
                issuer,
                _uploads: uploads_dir,
            }
        }

        pub(crate) fn token(&self, user_id: &str) -> String {
            let code = SessionToken::issue(user_id, Utc::now() + Duration::hours(1), &self.issuer)
                .encode()
                .unwrap();
            format!("Bearer {code}")
        }

        pub(crate) async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        pub(crate) async fn call(
            &self,
            method: &str,
            uri: &str,
            user: Option<&str>,
            json: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                builder = builder.header("authorization", self.token(user));
            }
            let request = match json {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.send(request).await
        }

        /// `fields` are text parts; `file` is `(field, file name, mime, bytes)`.
        pub(crate) async fn multipart(
            &self,
            uri: &str,
            user: &str,
            fields: &[(&str, &str)],
            file: Option<(&str, &str, &str, &[u8])>,
        ) -> (StatusCode, Value) {
            let mut body = Vec::new();
            for (name, value) in fields {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    )
                    .as_bytes(),
                );
            }
            if let Some((field, file_name, mime, data)) = file {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", self.token(user))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestApp;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new().await;
        let (status, body) = app.call("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = TestApp::new().await;
        let (status, body) = app.call("GET", "/chats", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let request = axum::http::Request::builder()
            .uri("/chats")
            .header("authorization", "Bearer garbage")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_info_reports_counts() {
        let app = TestApp::new().await;
        app.call("GET", "/profile", Some("alice"), None).await;
        app.call("GET", "/profile", Some("bob"), None).await;

        let (status, body) = app.call("GET", "/info", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "BMessage");
        assert_eq!(body["usersCount"], 2);
        assert_eq!(body["uploadsCount"], 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_messenger_calls_leave_the_runtime_thread() {
        let app = TestApp::new().await;
        let caller = std::thread::current().id();
        let worker = app
            .state
            .run(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(caller, worker);

        let rejected = app.state.run(|m| m.authenticate("Bearer garbage")).await;
        assert!(matches!(rejected, Err(crate::error::ServerError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_json_rejections_use_error_body() {
        let app = TestApp::new().await;

        let request = Request::builder()
            .method("PUT")
            .uri("/profile")
            .header("authorization", app.token("alice"))
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"name":"Alice"}"#))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let request = Request::builder()
            .method("PUT")
            .uri("/profile")
            .header("authorization", app.token("alice"))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = app
            .call(
                "POST",
                "/settings",
                Some("alice"),
                Some(serde_json::json!(["not", "an", "object"])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_with_error_body() {
        let app = TestApp::new().await;
        app.call("GET", "/profile", Some("bob"), None).await;
        let (_, chat) = app.call("POST", "/chats/create/bob", Some("alice"), None).await;
        let uri = format!("/chats/{}/messages", chat["id"].as_str().unwrap());

        // past the router's body limit, not just the upload limit
        let huge = vec![b'x'; 2 * 1024 * 1024];
        let (status, body) = app
            .multipart(&uri, "alice", &[("text", "")], Some(("file", "big.bin", "application/octet-stream", huge.as_slice())))
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Request body too large");

        let small_but_over_upload_limit = vec![b'x'; 128 * 1024];
        let (status, body) = app
            .multipart(
                &uri,
                "alice",
                &[("text", "")],
                Some(("file", "big.bin", "application/octet-stream", small_but_over_upload_limit.as_slice())),
            )
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].as_str().unwrap().starts_with("File too large"));
    }
}
