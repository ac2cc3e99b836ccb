// src/handlers/contracts.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::Envelope,
    },
    config::AppState,
    handlers::validate_amount,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{ClientOnly, ClientOrAgent, RequireRole, SalesAgentOnly},
    },
    models::contract::{Contract, ContractFilter, ContractTerms},
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractPayload {
    pub space_id: i64,
    pub client_id: i64,
    #[schema(value_type = String, example = "2026-11-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, example = "2027-04-30")]
    pub end_date: NaiveDate,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 1500000.0)]
    pub value: Decimal,
    #[validate(length(max = 1000, message = "text_too_long"))]
    #[serde(default)]
    pub description: String,
}

impl CreateContractPayload {
    fn terms(&self) -> ContractTerms {
        ContractTerms {
            start_date: self.start_date,
            end_date: self.end_date,
            value: self.value,
            description: self.description.trim().to_string(),
        }
    }
}

/// Novos termos de um contrato ainda pendente.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditContractPayload {
    #[schema(value_type = String, example = "2026-11-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, example = "2027-04-30")]
    pub end_date: NaiveDate,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 1500000.0)]
    pub value: Decimal,
    #[validate(length(max = 1000, message = "text_too_long"))]
    #[serde(default)]
    pub description: String,
}

impl From<EditContractPayload> for ContractTerms {
    fn from(p: EditContractPayload) -> Self {
        ContractTerms {
            start_date: p.start_date,
            end_date: p.end_date,
            value: p.value,
            description: p.description.trim().to_string(),
        }
    }
}

// POST /api/contracts
#[utoipa::path(
    post,
    path = "/api/contracts",
    tag = "Contracts",
    request_body = CreateContractPayload,
    responses(
        (status = 201, description = "Contrato criado, aguardando verificação do cliente", body = Contract),
        (status = 400, description = "Espaço indisponível ou termos inválidos"),
        (status = 409, description = "Espaço já contratado ou modificação concorrente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(agent): AuthenticatedUser,
    _guard: RequireRole<SalesAgentOnly>,
    Json(payload): Json<CreateContractPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let contract = app_state
        .contract_service
        .create_contract(agent.id, payload.space_id, payload.client_id, payload.terms())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(contract))))
}

// GET /api/contracts
#[utoipa::path(
    get,
    path = "/api/contracts",
    tag = "Contracts",
    params(ContractFilter),
    responses((status = 200, description = "Contratos em que o usuário é parte", body = [Contract])),
    security(("api_jwt" = []))
)]
pub async fn list_contracts(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<ClientOrAgent>,
    Query(filter): Query<ContractFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let contracts = app_state
        .contract_service
        .list_contracts(&user, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contracts)))
}

// GET /api/contracts/{id}
#[utoipa::path(
    get,
    path = "/api/contracts/{id}",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato", body = Contract),
        (status = 403, description = "Usuário não é parte do contrato"),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .get_contract(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// PUT /api/contracts/{id}
#[utoipa::path(
    put,
    path = "/api/contracts/{id}",
    tag = "Contracts",
    request_body = EditContractPayload,
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Termos atualizados", body = Contract),
        (status = 400, description = "Contrato não está mais pendente")
    ),
    security(("api_jwt" = []))
)]
pub async fn edit_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(agent): AuthenticatedUser,
    _guard: RequireRole<SalesAgentOnly>,
    Path(id): Path<i64>,
    Json(payload): Json<EditContractPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let contract = app_state
        .contract_service
        .edit_contract(agent.id, id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// POST /api/contracts/{id}/verify
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/verify",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato verificado pelo cliente", body = Contract),
        (status = 400, description = "Transição inválida ou prazo vencido")
    ),
    security(("api_jwt" = []))
)]
pub async fn verify_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(client): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .verify(client.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// POST /api/contracts/{id}/activate
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/activate",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato ativo; espaço reservado", body = Contract),
        (status = 400, description = "Contrato não verificado")
    ),
    security(("api_jwt" = []))
)]
pub async fn activate_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(agent): AuthenticatedUser,
    _guard: RequireRole<SalesAgentOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .activate(agent.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// POST /api/contracts/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/cancel",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato cancelado; espaço liberado", body = Contract),
        (status = 400, description = "Contrato encerrado ou com produtos guardados")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(agent): AuthenticatedUser,
    _guard: RequireRole<SalesAgentOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .cancel(agent.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// POST /api/contracts/{id}/finalize
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/finalize",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato finalizado; espaço liberado", body = Contract),
        (status = 400, description = "Contrato não ativo ou com produtos guardados")
    ),
    security(("api_jwt" = []))
)]
pub async fn finalize_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(agent): AuthenticatedUser,
    _guard: RequireRole<SalesAgentOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .finalize(agent.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(contract)))
}

// GET /api/contracts/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/contracts/{id}/pdf",
    tag = "Contracts",
    params(("id" = i64, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Documento PDF do contrato", content_type = "application/pdf"),
        (status = 403, description = "Usuário não é parte do contrato"),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn contract_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let pdf_bytes = app_state
        .document_service
        .contract_pdf(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Headers para o navegador baixar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"contrato_{}.pdf\"", id)),
    ];

    Ok((headers, pdf_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_payload_accepts_iso_dates() {
        let payload: CreateContractPayload = serde_json::from_value(serde_json::json!({
            "spaceId": 3,
            "clientId": 100,
            "startDate": "2026-11-01",
            "endDate": "2027-04-30",
            "value": 1500000
        }))
        .unwrap();

        assert!(payload.validate().is_ok());
        let terms = payload.terms();
        assert_eq!(terms.start_date, NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
        assert!(terms.description.is_empty());
    }

    #[test]
    fn test_zero_value_is_rejected() {
        let payload: EditContractPayload = serde_json::from_value(serde_json::json!({
            "startDate": "2026-11-01",
            "endDate": "2027-04-30",
            "value": 0
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("value"));
    }
}
