use axum::{
    extract::{Path, Request, State},
    Extension, Json,
};
use bmessage_core::{GroupDetails, GroupDraft, GroupSettingsPatch};
use bmessage_store::Group;
use serde::Deserialize;

use super::{success, AppState, Form, JsonBody, SuccessResponse};
use crate::auth::CurrentUser;
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MemberRequest {
    user_id: String,
}

/// `memberIds` arrives as a JSON array encoded in a text field. Anything
/// that does not parse is ignored.
fn parse_member_ids(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

/// Multipart (`name`, `memberIds`, `allowMembersToAdd`, optional `avatar`)
/// or the same fields as JSON.
pub(super) async fn create_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<Group>, ServerError> {
    let mut form = Form::read(request, "avatar").await?;
    let name = form.text("name").unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(ServerError::BadRequest("group name is required".to_string()));
    }

    let avatar = match form.take_file() {
        Some(upload) => upload.store(&state.uploads).await?.url,
        None => String::new(),
    };

    let draft = GroupDraft {
        name,
        avatar,
        member_ids: parse_member_ids(form.text("memberIds")),
        allow_members_to_add: form.text("allowMembersToAdd") == Some("true"),
    };
    Ok(Json(state.run(move |m| m.create_group(&user_id, draft)).await?))
}

pub(super) async fn get_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<GroupDetails>, ServerError> {
    Ok(Json(state.run(move |m| m.group_details(&id, &user_id)).await?))
}

pub(super) async fn update_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Group>, ServerError> {
    let mut form = Form::read(request, "avatar").await?;
    let (group_id, requester_id) = (id.clone(), user_id.clone());
    state
        .run(move |m| m.check_manage_access(&group_id, &requester_id))
        .await?;

    let avatar = match form.take_file() {
        Some(upload) => Some(upload.store(&state.uploads).await?.url),
        None => None,
    };
    let patch = GroupSettingsPatch {
        name: form.text("name").map(str::to_string),
        allow_members_to_add: form.text("allowMembersToAdd").map(|v| v == "true"),
        avatar,
    };
    let group = state
        .run(move |m| m.update_group_settings(&id, &user_id, patch))
        .await?;
    Ok(Json(group))
}

pub(super) async fn add_member(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<MemberRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state
        .run(move |m| m.add_member(&id, &user_id, &body.user_id))
        .await?;
    Ok(success())
}

pub(super) async fn remove_member(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, target_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state
        .run(move |m| m.remove_member(&id, &user_id, &target_id))
        .await?;
    Ok(success())
}

pub(super) async fn promote_admin(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<MemberRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state
        .run(move |m| m.promote_to_admin(&id, &user_id, &body.user_id))
        .await?;
    Ok(success())
}

pub(super) async fn demote_admin(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((id, target_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, ServerError> {
    state
        .run(move |m| m.demote_admin(&id, &user_id, &target_id))
        .await?;
    Ok(success())
}

pub(super) async fn join_group(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(link): Path<String>,
) -> Result<Json<Group>, ServerError> {
    Ok(Json(state.run(move |m| m.join_by_invite_link(&link, &user_id)).await?))
}
