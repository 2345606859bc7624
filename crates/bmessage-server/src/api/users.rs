use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bmessage_core::{Profile, ProfileUpdate, PublicProfile, UserSummary};
use bmessage_store::{User, UserSettings};
use serde::Serialize;

use super::{AppState, JsonBody};
use crate::auth::CurrentUser;
use crate::error::ServerError;

#[derive(Serialize)]
pub(super) struct SettingsResponse {
    success: bool,
    settings: UserSettings,
}

/// The caller's full record, settings included, with their posts.
pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.run(move |m| m.profile(&user_id)).await?))
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<User>, ServerError> {
    Ok(Json(state.run(move |m| m.update_profile(&user_id, update)).await?))
}

pub(super) async fn get_public_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicProfile>, ServerError> {
    Ok(Json(state.run(move |m| m.public_profile(&id)).await?))
}

/// Keys in the body overwrite stored ones; the rest are kept.
pub(super) async fn update_settings(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    JsonBody(patch): JsonBody<UserSettings>,
) -> Result<Json<SettingsResponse>, ServerError> {
    let settings = state
        .run(move |m| m.update_settings(&user_id, patch))
        .await?;
    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>, ServerError> {
    let user = state.run(move |m| m.user(&id)).await?;
    Ok(Json(UserSummary::from(&user)))
}

pub(super) async fn search_users(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    Ok(Json(state.run(move |m| m.search_users(&query)).await?))
}
