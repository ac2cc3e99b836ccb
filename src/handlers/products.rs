// src/handlers/products.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{Envelope, PageQuery},
    },
    config::AppState,
    handlers::validate_amount,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{ClientOnly, RequireRole, WarehouseStaffOnly},
    },
    models::product::{Movement, NewProduct, Product, ProductKind, ProductMovementResponse},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntakePayload {
    #[schema(example = 10)]
    pub space_id: i64,
    #[schema(example = 100)]
    pub client_id: i64,
    #[validate(length(min = 1, max = 150, message = "required"))]
    #[schema(example = "Caja de vajilla")]
    pub name: String,
    #[validate(length(max = 500, message = "text_too_long"))]
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 2.5)]
    pub area: Decimal,
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = f64, example = 1.2)]
    pub height: Decimal,
    pub kind: ProductKind,
}

impl IntakePayload {
    fn into_new(self) -> (i64, NewProduct) {
        let product = NewProduct {
            client_id: self.client_id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            area: self.area,
            height: self.height,
            kind: self.kind,
        };
        (self.space_id, product)
    }
}

// GET /api/products
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    params(PageQuery),
    responses((status = 200, description = "Produtos guardados do cliente", body = [Product])),
    security(("api_jwt" = []))
)]
pub async fn list_my_products(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(client): AuthenticatedUser,
    _guard: RequireRole<ClientOnly>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = app_state
        .product_service
        .list_client_products(client.id, page.page)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(products)))
}

// GET /api/products/warehouse
#[utoipa::path(
    get,
    path = "/api/products/warehouse",
    tag = "Products",
    params(PageQuery),
    responses((status = 200, description = "Produtos guardados no armazém do funcionário", body = [Product])),
    security(("api_jwt" = []))
)]
pub async fn list_warehouse_products(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(staff): AuthenticatedUser,
    _guard: RequireRole<WarehouseStaffOnly>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = app_state
        .product_service
        .list_warehouse_products(&staff, page.page)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(products)))
}

// POST /api/products/intake
#[utoipa::path(
    post,
    path = "/api/products/intake",
    tag = "Products",
    request_body = IntakePayload,
    responses(
        (status = 201, description = "Ingreso registrado", body = ProductMovementResponse),
        (status = 400, description = "Sem contrato ativo ou capacidade excedida"),
        (status = 409, description = "Modificação concorrente")
    ),
    security(("api_jwt" = []))
)]
pub async fn intake_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(staff): AuthenticatedUser,
    _guard: RequireRole<WarehouseStaffOnly>,
    Json(payload): Json<IntakePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let (space_id, product) = payload.into_new();
    let response = app_state
        .product_service
        .intake(&staff, space_id, product)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(Envelope::ok(response))))
}

// POST /api/products/{id}/withdraw
#[utoipa::path(
    post,
    path = "/api/products/{id}/withdraw",
    tag = "Products",
    params(("id" = i64, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Retiro registrado", body = ProductMovementResponse),
        (status = 400, description = "Produto já retirado"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn withdraw_product(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(staff): AuthenticatedUser,
    _guard: RequireRole<WarehouseStaffOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let response = app_state
        .product_service
        .withdraw(&staff, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(response)))
}

// GET /api/products/{id}/movements
#[utoipa::path(
    get,
    path = "/api/products/{id}/movements",
    tag = "Products",
    params(("id" = i64, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Histórico de movimentos do produto", body = [Movement]),
        (status = 403, description = "Produto de outro cliente")
    ),
    security(("api_jwt" = []))
)]
pub async fn product_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .product_service
        .product_movements(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(Envelope::ok(movements)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_payload() -> IntakePayload {
        serde_json::from_value(serde_json::json!({
            "spaceId": 10,
            "clientId": 100,
            "name": "  Caja de vajilla ",
            "area": 2.5,
            "height": 1.2,
            "kind": "FRAGILE"
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_becomes_new_product() {
        let payload = make_payload();
        assert!(payload.validate().is_ok());

        let (space_id, product) = payload.into_new();
        assert_eq!(space_id, 10);
        assert_eq!(product.name, "Caja de vajilla");
        assert_eq!(product.kind, ProductKind::Fragile);
        assert!(product.description.is_empty());
    }

    #[test]
    fn test_negative_height_is_rejected() {
        let mut payload = make_payload();
        payload.height = Decimal::new(-1, 0);
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("height"));
    }

    #[test]
    fn test_area_with_three_decimals_is_rejected() {
        let mut payload = make_payload();
        payload.area = Decimal::new(2555, 3);
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("area"));

        payload.area = Decimal::new(4, 3);
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("area"));

        payload.area = Decimal::new(255, 2);
        assert!(payload.validate().is_ok());
    }
}
