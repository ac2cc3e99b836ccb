// src/handlers/chat.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{Envelope, PageQuery},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{ClientOnly, RequireRole},
    },
    models::chat::{ChatMessage, ChatSession},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessagePayload {
    #[validate(length(min = 1, max = 1000, message = "text_too_long"))]
    #[schema(example = "¿Tienen espacios refrigerados en Armenia?")]
    pub content: String,
}

// POST /api/chats
#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "Chat",
    responses(
        (status = 201, description = "Conversa aberta com um agente", body = ChatSession),
        (status = 400, description = "Nenhum agente disponível")
    ),
    security(("api_jwt" = []))
)]
pub async fn start_chat(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(client): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .chat_service
        .start(client.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(session))))
}

// POST /api/chats/{id}/messages
#[utoipa::path(
    post,
    path = "/api/chats/{id}/messages",
    tag = "Chat",
    request_body = SendMessagePayload,
    params(("id" = i64, Path, description = "ID da conversa")),
    responses(
        (status = 201, description = "Mensagem enviada", body = ChatMessage),
        (status = 400, description = "Conversa encerrada"),
        (status = 403, description = "Usuário não participa da conversa")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state
        .chat_service
        .send(user.id, id, &payload.content)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(message))))
}

// GET /api/chats/{id}/messages
#[utoipa::path(
    get,
    path = "/api/chats/{id}/messages",
    tag = "Chat",
    params(("id" = i64, Path, description = "ID da conversa"), PageQuery),
    responses((status = 200, description = "Mensagens da conversa", body = [ChatMessage])),
    security(("api_jwt" = []))
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = app_state
        .chat_service
        .messages(user.id, id, page.page)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(messages)))
}

// POST /api/chats/{id}/close
#[utoipa::path(
    post,
    path = "/api/chats/{id}/close",
    tag = "Chat",
    params(("id" = i64, Path, description = "ID da conversa")),
    responses(
        (status = 200, description = "Conversa encerrada", body = ChatSession),
        (status = 400, description = "Conversa já encerrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_chat(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .chat_service
        .close(user.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(session)))
}
