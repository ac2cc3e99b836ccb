// src/handlers/auth.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::Envelope,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{ClientOnly, HumanResourcesOnly, RequireRole},
    },
    models::auth::{
        AuthResponse, ClientFilter, CreateStaffPayload, LoginPayload, PasswordResetRequestPayload,
        RegisterClientPayload, ResetPasswordPayload, TransferStaffPayload, UpdateCredentialsPayload,
        UpdateProfilePayload, User, VerifyResetCodePayload,
    },
};

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Serviço no ar"))
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterClientPayload,
    responses(
        (status = 201, description = "Cliente registrado; devolve o token", body = AuthResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "E-mail já cadastrado")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<RegisterClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;
    payload
        .validate_phones()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let token = app_state
        .auth_service
        .register_client(&payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(AuthResponse { token }))))
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Login realizado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let token = app_state
        .auth_service
        .login_user(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(AuthResponse { token })))
}

// POST /api/auth/reactivate
#[utoipa::path(
    post,
    path = "/api/auth/reactivate",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Conta de cliente reativada; devolve o token", body = AuthResponse),
        (status = 400, description = "Conta já está ativa"),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn reactivate_account(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let token = app_state
        .auth_service
        .reactivate_client(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(AuthResponse { token })))
}

// POST /api/auth/password-reset
#[utoipa::path(
    post,
    path = "/api/auth/password-reset",
    tag = "Auth",
    request_body = PasswordResetRequestPayload,
    responses((status = 204, description = "Código enviado se o e-mail tiver conta ativa"))
)]
pub async fn request_password_reset(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<PasswordResetRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .request_password_reset(&payload.email)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/auth/password-reset/verify
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/verify",
    tag = "Auth",
    request_body = VerifyResetCodePayload,
    responses(
        (status = 204, description = "Código válido"),
        (status = 400, description = "Código inválido ou expirado")
    )
)]
pub async fn verify_reset_code(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<VerifyResetCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .verify_reset_code(&payload.email, &payload.code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/auth/password-reset/confirm
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm",
    tag = "Auth",
    request_body = ResetPasswordPayload,
    responses(
        (status = 204, description = "Senha redefinida"),
        (status = 400, description = "Código inválido ou expirado")
    )
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .auth_service
        .reset_password(&payload.email, &payload.code, &payload.new_password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses((status = 200, description = "Usuário autenticado", body = User)),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
    Json(Envelope::ok(user))
}

// DELETE /api/users/me
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 204, description = "Conta removida"),
        (status = 400, description = "Cliente com contratos ou produtos")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_me(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .auth_service
        .delete_client(user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/users/me
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "Users",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Perfil atualizado", body = User),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_me(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;
    payload
        .validate_phones(&user.phone_country)
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .auth_service
        .update_profile(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(updated)))
}

// PUT /api/users/me/credentials
#[utoipa::path(
    put,
    path = "/api/users/me/credentials",
    tag = "Users",
    request_body = UpdateCredentialsPayload,
    responses(
        (status = 200, description = "Credenciais atualizadas", body = User),
        (status = 401, description = "Senha atual incorreta"),
        (status = 409, description = "E-mail já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_my_credentials(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
    Json(payload): Json<UpdateCredentialsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .auth_service
        .update_credentials(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(updated)))
}

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Staff",
    params(ClientFilter),
    responses((status = 200, description = "Clientes cadastrados", body = [User])),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Query(filter): Query<ClientFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let clients = app_state
        .auth_service
        .list_clients(&filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(clients)))
}

// POST /api/staff
#[utoipa::path(
    post,
    path = "/api/staff",
    tag = "Staff",
    request_body = CreateStaffPayload,
    responses(
        (status = 201, description = "Funcionário cadastrado", body = User),
        (status = 409, description = "E-mail já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_staff(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Json(payload): Json<CreateStaffPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;
    payload
        .validate_consistency()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;
    payload
        .validate_phones()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .auth_service
        .create_staff(&payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(user))))
}

// DELETE /api/staff/{id}
#[utoipa::path(
    delete,
    path = "/api/staff/{id}",
    tag = "Staff",
    params(("id" = i64, Path, description = "ID do funcionário")),
    responses(
        (status = 204, description = "Funcionário desativado"),
        (status = 400, description = "Agente com contratos em aberto"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_staff(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .auth_service
        .delete_staff(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/staff/{id}/reactivate
#[utoipa::path(
    post,
    path = "/api/staff/{id}/reactivate",
    tag = "Staff",
    params(("id" = i64, Path, description = "ID do funcionário")),
    responses(
        (status = 200, description = "Funcionário reativado", body = User),
        (status = 400, description = "Conta já está ativa"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reactivate_staff(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = app_state
        .auth_service
        .reactivate_staff(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(user)))
}

// PUT /api/staff/{id}/warehouse
#[utoipa::path(
    put,
    path = "/api/staff/{id}/warehouse",
    tag = "Staff",
    request_body = TransferStaffPayload,
    params(("id" = i64, Path, description = "ID do funcionário de armazém")),
    responses(
        (status = 200, description = "Funcionário transferido", body = User),
        (status = 400, description = "Campo ausente ou armazém inativo"),
        (status = 404, description = "Usuário ou armazém não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn transfer_staff(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(id): Path<i64>,
    Json(payload): Json<TransferStaffPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user = app_state
        .auth_service
        .transfer_staff(id, payload.warehouse_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(user)))
}
