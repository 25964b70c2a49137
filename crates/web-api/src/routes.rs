//! HTTP 路由。
//!
//! 所有业务端点要求 `Authorization: Bearer` 解析出 principal；
//! 响应是 JSON，错误是状态码加纯文本。

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use application::{MembershipRequestKind, NotificationView};
use domain::{EventId, EventResponse, GroupId, NotificationId, UserId};

use crate::{error::ApiError, state::AppState, ws_connection};

#[derive(Debug, Deserialize)]
struct PrivateHistoryQuery {
    other_user: i64,
    #[serde(default)]
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct GroupHistoryQuery {
    group_id: i64,
    #[serde(default)]
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct NotificationsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    #[serde(default)]
    unread_only: bool,
}

#[derive(Debug, Deserialize)]
struct NotificationIdQuery {
    notification_id: i64,
}

#[derive(Debug, Deserialize)]
struct NicknameQuery {
    nickname: String,
}

#[derive(Debug, Deserialize)]
struct RespondFollowPayload {
    request_id: i64,
    action: String, // "accept" | "decline"
}

#[derive(Debug, Deserialize)]
struct InviteMemberPayload {
    group_id: i64,
    invited_user_id: i64,
}

#[derive(Debug, Deserialize)]
struct JoinRequestPayload {
    group_id: i64,
}

#[derive(Debug, Deserialize)]
struct MembershipRespondPayload {
    group_id: i64,
    request_type: String, // "invitation" | "join_request"
    target_user_id: Option<i64>,
    action: String, // "accept" | "reject"
}

#[derive(Debug, Deserialize)]
struct CreateEventPayload {
    group_id: i64,
    title: String,
    #[serde(default)]
    description: String,
    event_time: String,
}

#[derive(Debug, Deserialize)]
struct EventRespondPayload {
    response: String, // "going" | "not_going"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        // 聊天历史与目录
        .route("/private-messages", get(private_history))
        .route("/group-messages", get(group_history))
        .route("/chat-list", get(chat_list))
        // 通知
        .route("/notifications", get(list_notifications))
        .route("/notifications/read", put(mark_notification_read))
        .route("/notifications/read-all", put(mark_all_notifications_read))
        .route("/notifications/count", get(unread_notification_count))
        .route("/notifications/delete", delete(delete_notification))
        // 关注
        .route("/follow", post(follow_user))
        .route("/unfollow", delete(unfollow_user))
        .route("/followers", get(list_followers))
        .route("/following", get(list_following))
        .route("/follow-requests", get(list_follow_requests))
        .route("/follow-requests/respond", post(respond_follow_request))
        // 群组成员资格
        .route("/groups/invite", post(invite_member))
        .route("/groups/join-request", post(request_join))
        .route("/groups/respond", post(respond_membership))
        .route("/groups/{group_id}/leave", post(leave_group))
        .route("/groups/{group_id}/members/{user_id}", delete(remove_member))
        // 群组活动
        .route("/events", post(create_event))
        .route("/events/{event_id}/respond", post(respond_event))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn principal(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    Ok(UserId(state.jwt_service.extract_user_from_headers(headers)?))
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // 认证在通道内完成：第一帧必须携带 token
    ws.on_upgrade(move |socket| ws_connection::handle_socket(socket, state))
}

// ---- 历史与目录 ----

async fn private_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<PrivateHistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let viewer = principal(&state, &headers)?;
    let messages = state
        .chat_service
        .page_private(viewer, UserId(query.other_user), query.offset)
        .await?;
    let items: Vec<Value> = messages
        .into_iter()
        .map(|m| {
            json!({
                "sender_id": m.sender.0,
                "receiver_id": m.receiver.0,
                "content": m.content,
                "sent_at": m.sent_at.to_rfc3339(),
                "sender_name": m.sender_name,
                "type": "private",
            })
        })
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn group_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<GroupHistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let viewer = principal(&state, &headers)?;
    let messages = state
        .chat_service
        .page_group(viewer, GroupId(query.group_id), query.offset)
        .await?;
    let items: Vec<Value> = messages
        .into_iter()
        .map(|m| {
            json!({
                "message_id": m.id.0,
                "group_id": m.group.0,
                "sender_id": m.sender.0,
                "content": m.content,
                "created_at": m.sent_at.to_rfc3339(),
                "sender_name": m.sender_name,
            })
        })
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn chat_list(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let items = state.chat_service.chat_list(user).await?;
    Ok(Json(json!({
        "total_count": items.len(),
        "chat_items": items,
    })))
}

// ---- 通知 ----

async fn list_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(50);
    let offset = query.offset.filter(|o| *o >= 0).unwrap_or(0);

    let page = state
        .notification_service
        .page(user, limit, offset, query.unread_only)
        .await?;
    let notifications: Vec<NotificationView> = page
        .notifications
        .into_iter()
        .map(NotificationView::from)
        .collect();
    Ok(Json(json!({
        "notifications": notifications,
        "total_count": page.total_count,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

async fn mark_notification_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NotificationIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    state
        .notification_service
        .mark_read(user, NotificationId(query.notification_id))
        .await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

async fn mark_all_notifications_read(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let count = state.notification_service.mark_all_read(user).await?;
    Ok(Json(json!({
        "message": "All notifications marked as read",
        "count": count,
    })))
}

async fn unread_notification_count(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let unread_count = state.notification_service.count_unread(user).await?;
    Ok(Json(json!({ "unread_count": unread_count })))
}

async fn delete_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NotificationIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    state
        .notification_service
        .delete(user, NotificationId(query.notification_id))
        .await?;
    Ok(Json(json!({ "message": "Notification deleted" })))
}

// ---- 关注 ----

async fn follow_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NicknameQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = principal(&state, &headers)?;
    let outcome = state.follow_service.follow(user, &query.nickname).await?;
    let message = match outcome {
        application::FollowOutcome::Followed => "Successfully followed user",
        application::FollowOutcome::RequestSent => "Follow request sent",
    };
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

async fn unfollow_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<NicknameQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    state.follow_service.unfollow(user, &query.nickname).await?;
    Ok(Json(json!({ "message": "Successfully unfollowed user" })))
}

fn user_summaries(users: Vec<domain::User>) -> Vec<Value> {
    users
        .into_iter()
        .map(|u| {
            json!({
                "id": u.id.0,
                "nickname": u.nickname.as_str(),
                "profile_type": u.visibility.as_str(),
            })
        })
        .collect()
}

async fn list_followers(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let followers = state.follow_service.list_followers(user).await?;
    Ok(Json(Value::Array(user_summaries(followers))))
}

async fn list_following(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let following = state.follow_service.list_following(user).await?;
    Ok(Json(Value::Array(user_summaries(following))))
}

async fn list_follow_requests(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let requests = state.follow_service.pending_requests(user).await?;
    let items: Vec<Value> = requests
        .into_iter()
        .map(|r| {
            json!({
                "request_id": r.request_id,
                "requester_id": r.requester_id.0,
                "requester_name": r.requester_name,
                "created_at": r.created_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn respond_follow_request(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<RespondFollowPayload>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let accept = match payload.action.as_str() {
        "accept" => true,
        "decline" => false,
        _ => return Err(ApiError::bad_request("Action must be 'accept' or 'decline'")),
    };
    state
        .follow_service
        .respond(user, payload.request_id, accept)
        .await?;
    Ok(Json(json!({
        "message": format!("Follow request {}ed successfully", payload.action),
    })))
}

// ---- 群组成员资格 ----

async fn invite_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<InviteMemberPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = principal(&state, &headers)?;
    state
        .group_service
        .invite(user, UserId(payload.invited_user_id), GroupId(payload.group_id))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Invitation sent" }))))
}

async fn request_join(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<JoinRequestPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = principal(&state, &headers)?;
    state
        .group_service
        .request_join(user, GroupId(payload.group_id))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Join request sent" }))))
}

async fn respond_membership(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<MembershipRespondPayload>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let kind = match payload.request_type.as_str() {
        "invitation" => MembershipRequestKind::Invitation,
        "join_request" => MembershipRequestKind::JoinRequest,
        _ => return Err(ApiError::bad_request("Invalid request type")),
    };
    let accept = match payload.action.as_str() {
        "accept" => true,
        "reject" => false,
        _ => return Err(ApiError::bad_request("Action must be 'accept' or 'reject'")),
    };
    state
        .group_service
        .respond(
            user,
            GroupId(payload.group_id),
            kind,
            payload.target_user_id.map(UserId),
            accept,
        )
        .await?;
    Ok(Json(json!({
        "message": format!("Request {}ed successfully", payload.action),
    })))
}

async fn leave_group(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    state.group_service.leave(user, GroupId(group_id)).await?;
    Ok(Json(json!({ "message": "Left the group" })))
}

async fn remove_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let operator = principal(&state, &headers)?;
    state
        .group_service
        .remove_member(operator, GroupId(group_id), UserId(user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- 群组活动 ----

/// 活动时间接受 RFC3339 或 "YYYY-MM-DD HH:MM:SS"（按 UTC 解释）。
fn parse_event_time(value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|_| ApiError::bad_request("Invalid event time format. Use YYYY-MM-DD HH:MM:SS"))
}

async fn create_event(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = principal(&state, &headers)?;
    let event_time = parse_event_time(&payload.event_time)?;
    let event = state
        .group_service
        .create_event(
            user,
            GroupId(payload.group_id),
            &payload.title,
            &payload.description,
            event_time,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "event_id": event.id.0,
            "group_id": event.group.0,
            "creator_id": event.creator.0,
            "title": event.title,
            "description": event.description,
            "event_time": event.event_time.to_rfc3339(),
        })),
    ))
}

async fn respond_event(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(payload): Json<EventRespondPayload>,
) -> Result<Json<Value>, ApiError> {
    let user = principal(&state, &headers)?;
    let response = EventResponse::parse(&payload.response)
        .ok_or_else(|| ApiError::bad_request("Response must be 'going' or 'not_going'"))?;
    state
        .group_service
        .respond_event(user, EventId(event_id), response)
        .await?;
    Ok(Json(json!({ "message": "Response recorded" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_time_accepts_both_formats() {
        assert!(parse_event_time("2026-08-01T18:00:00Z").is_ok());
        assert!(parse_event_time("2026-08-01 18:00:00").is_ok());
        assert!(parse_event_time("2026-08-01T18:00:00").is_ok());
        assert!(parse_event_time("next tuesday").is_err());
    }
}
