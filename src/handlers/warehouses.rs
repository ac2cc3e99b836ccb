// src/handlers/warehouses.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{Envelope, PageQuery},
        phone::{normalize_phone, validate_phone_field},
    },
    config::AppState,
    db::warehouse_repo::NewWarehouse,
    handlers::validate_amount,
    middleware::{
        i18n::Locale,
        rbac::{HumanResourcesOnly, RequireRole, StaffOrHr},
    },
    models::{
        product::Movement,
        warehouse::{ReconcileReport, Space, Warehouse, WarehouseFilter},
    },
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWarehousePayload {
    #[validate(length(min = 1, max = 150, message = "required"))]
    #[schema(example = "Bodega Norte")]
    pub name: String,
    #[validate(length(equal = 2, message = "phone_country_unsupported"))]
    #[schema(example = "CO")]
    pub country: String,
    #[validate(length(min = 1, max = 100, message = "required"))]
    pub city: String,
    #[validate(length(min = 1, max = 255, message = "required"))]
    pub address: String,
    #[schema(example = "6067441234")]
    pub phone: String,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 500.0)]
    pub total_area: Decimal,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 8.0)]
    pub height: Decimal,
}

impl CreateWarehousePayload {
    // Telefone do armazém segue o plano do país onde ele fica
    fn validate_phones(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_phone_field(&mut errors, "phone", &self.country, &self.phone);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn into_new(self) -> NewWarehouse {
        NewWarehouse {
            phone: normalize_phone(&self.country, &self.phone),
            country: self.country.to_uppercase(),
            name: self.name.trim().to_string(),
            city: self.city.trim().to_string(),
            address: self.address.trim().to_string(),
            total_area: self.total_area,
            height: self.height,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpacePayload {
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 50.0)]
    pub total_area: Decimal,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 4.0)]
    pub height: Decimal,
}

// ---
// Armazéns
// ---

// POST /api/warehouses
#[utoipa::path(
    post,
    path = "/api/warehouses",
    tag = "Warehouses",
    request_body = CreateWarehousePayload,
    responses(
        (status = 201, description = "Armazém registrado", body = Warehouse),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_warehouse(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Json(payload): Json<CreateWarehousePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;
    payload
        .validate_phones()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let warehouse = app_state
        .warehouse_service
        .register_warehouse(&payload.into_new())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(warehouse))))
}

// GET /api/warehouses
#[utoipa::path(
    get,
    path = "/api/warehouses",
    tag = "Warehouses",
    params(WarehouseFilter),
    responses((status = 200, description = "Página de armazéns", body = [Warehouse])),
    security(("api_jwt" = []))
)]
pub async fn list_warehouses(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(filter): Query<WarehouseFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let warehouses = app_state
        .warehouse_service
        .list_warehouses(&filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(warehouses)))
}

// GET /api/warehouses/{id}
#[utoipa::path(
    get,
    path = "/api/warehouses/{id}",
    tag = "Warehouses",
    params(("id" = i64, Path, description = "ID do armazém")),
    responses(
        (status = 200, description = "Armazém", body = Warehouse),
        (status = 404, description = "Armazém não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_warehouse(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let warehouse = app_state
        .warehouse_service
        .get_warehouse(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(warehouse)))
}

// DELETE /api/warehouses/{id}
#[utoipa::path(
    delete,
    path = "/api/warehouses/{id}",
    tag = "Warehouses",
    params(("id" = i64, Path, description = "ID do armazém")),
    responses(
        (status = 200, description = "Armazém desativado", body = Warehouse),
        (status = 400, description = "Armazém com contratos em aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn deactivate_warehouse(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let warehouse = app_state
        .warehouse_service
        .deactivate_warehouse(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(warehouse)))
}

// ---
// Espaços
// ---

// POST /api/warehouses/{id}/spaces
#[utoipa::path(
    post,
    path = "/api/warehouses/{id}/spaces",
    tag = "Spaces",
    request_body = CreateSpacePayload,
    params(("id" = i64, Path, description = "ID do armazém")),
    responses(
        (status = 201, description = "Espaço registrado", body = Space),
        (status = 400, description = "Altura ou área excedem o armazém")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_space(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(warehouse_id): Path<i64>,
    Json(payload): Json<CreateSpacePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let space = app_state
        .warehouse_service
        .register_space(warehouse_id, payload.total_area, payload.height)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(space))))
}

// GET /api/warehouses/{id}/spaces
#[utoipa::path(
    get,
    path = "/api/warehouses/{id}/spaces",
    tag = "Spaces",
    params(("id" = i64, Path, description = "ID do armazém"), PageQuery),
    responses((status = 200, description = "Espaços livres do armazém", body = [Space])),
    security(("api_jwt" = []))
)]
pub async fn list_free_spaces(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(warehouse_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let spaces = app_state
        .warehouse_service
        .list_free_spaces(warehouse_id, page.page)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(spaces)))
}

// GET /api/spaces/{id}
#[utoipa::path(
    get,
    path = "/api/spaces/{id}",
    tag = "Spaces",
    params(("id" = i64, Path, description = "ID do espaço")),
    responses(
        (status = 200, description = "Espaço", body = Space),
        (status = 404, description = "Espaço não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_space(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let space = app_state
        .warehouse_service
        .get_space(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(space)))
}

// DELETE /api/spaces/{id}
#[utoipa::path(
    delete,
    path = "/api/spaces/{id}",
    tag = "Spaces",
    params(("id" = i64, Path, description = "ID do espaço")),
    responses(
        (status = 200, description = "Espaço desativado", body = Space),
        (status = 400, description = "Espaço em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn deactivate_space(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<HumanResourcesOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let space = app_state
        .warehouse_service
        .deactivate_space(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(space)))
}

// GET /api/spaces/{id}/movements
#[utoipa::path(
    get,
    path = "/api/spaces/{id}/movements",
    tag = "Spaces",
    params(("id" = i64, Path, description = "ID do espaço"), PageQuery),
    responses((status = 200, description = "Movimentos do espaço, mais recentes primeiro", body = [Movement])),
    security(("api_jwt" = []))
)]
pub async fn list_space_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<StaffOrHr>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .warehouse_service
        .list_space_movements(id, page.page)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(movements)))
}

// POST /api/spaces/{id}/reconcile
#[utoipa::path(
    post,
    path = "/api/spaces/{id}/reconcile",
    tag = "Spaces",
    params(("id" = i64, Path, description = "ID do espaço")),
    responses((status = 200, description = "Resultado da reconciliação", body = ReconcileReport)),
    security(("api_jwt" = []))
)]
pub async fn reconcile_space(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<StaffOrHr>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .warehouse_service
        .reconcile_space(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(phone: &str, area: i64) -> CreateWarehousePayload {
        CreateWarehousePayload {
            name: "Bodega Norte".into(),
            country: "CO".into(),
            city: "Armenia".into(),
            address: "Calle 10".into(),
            phone: phone.into(),
            total_area: Decimal::from(area),
            height: Decimal::from(6),
        }
    }

    #[test]
    fn test_non_positive_area_is_rejected() {
        let errors = payload("3001234567", 0).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("total_area"));
    }

    #[test]
    fn test_phone_is_checked_against_country() {
        assert!(payload("3001234567", 10).validate_phones().is_ok());
        let errors = payload("12", 10).validate_phones().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_new_warehouse_has_normalized_phone() {
        let new = payload("300 123 4567", 10).into_new();
        assert_eq!(new.phone, "+573001234567");
    }

    #[test]
    fn test_space_height_below_a_cent_is_rejected() {
        let space = CreateSpacePayload {
            total_area: Decimal::from(20),
            height: Decimal::new(4, 3),
        };
        let errors = space.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("height"));
    }
}
