use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bmessage_store::Notification;
use serde::Serialize;

use super::{success, AppState, SuccessResponse};
use crate::auth::CurrentUser;
use crate::error::ServerError;

#[derive(Serialize)]
pub(super) struct MarkAllResponse {
    success: bool,
    updated: usize,
}

pub(super) async fn list_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    Ok(Json(state.run(move |m| m.notifications(&user_id)).await?))
}

/// Unknown ids and other users' notifications are acknowledged without
/// effect.
pub(super) async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state
        .run(move |m| m.mark_notification_read(&user_id, &id))
        .await?;
    Ok(success())
}

pub(super) async fn mark_all_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<MarkAllResponse>, ServerError> {
    let updated = state
        .run(move |m| m.mark_all_notifications_read(&user_id))
        .await?;
    Ok(Json(MarkAllResponse {
        success: true,
        updated,
    }))
}
