use axum::{
    extract::{Path, Request, State},
    Extension, Json,
};
use bmessage_core::{LikeOutcome, PostView};
use bmessage_store::{Comment, Post};
use serde::Deserialize;
use tracing::info;

use super::{success, AppState, Form, JsonBody, SuccessResponse};
use crate::auth::CurrentUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct TextRequest {
    #[serde(default)]
    text: String,
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, ServerError> {
    Ok(Json(state.run(|m| m.feed()).await?))
}

/// Multipart (`text`, optional `image` file) or JSON (`text`, optional
/// `image` URL).
pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<Post>, ServerError> {
    let mut form = Form::read(request, "image").await?;
    let text = form.text("text").unwrap_or_default().to_string();

    let image = match form.take_file() {
        Some(upload) => {
            let stored = upload.store(&state.uploads).await?;
            info!(user = %user_id, file = %stored.filename, size = stored.size, "Post image uploaded");
            stored.url
        }
        None => form.text("image").unwrap_or_default().to_string(),
    };

    Ok(Json(state.run(move |m| m.create_post(&user_id, text, image)).await?))
}

pub(super) async fn edit_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<TextRequest>,
) -> Result<Json<Post>, ServerError> {
    Ok(Json(state.run(move |m| m.edit_post(&id, &user_id, body.text)).await?))
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state.run(move |m| m.delete_post(&id, &user_id)).await?;
    Ok(success())
}

pub(super) async fn toggle_like(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<LikeOutcome>, ServerError> {
    Ok(Json(state.run(move |m| m.toggle_like(&id, &user_id)).await?))
}

pub(super) async fn add_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<TextRequest>,
) -> Result<Json<Comment>, ServerError> {
    let comment = state
        .run(move |m| m.comment_on_post(&id, &user_id, body.text))
        .await?;
    Ok(Json(comment))
}
