// src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductKind {
    Fragile,
    NonFragile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductState {
    InWarehouse,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "movement_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Ingreso,
    Retiro,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[schema(example = 7)]
    pub id: i64,
    pub client_id: i64,
    // Espaço onde o produto foi guardado (mantido após a retirada)
    pub space_id: i64,
    #[schema(example = "Caja de vajilla")]
    pub name: String,
    pub description: String,
    #[schema(value_type = f64, example = 2.5)]
    pub area: Decimal,
    #[schema(value_type = f64, example = 1.2)]
    pub height: Decimal,
    pub kind: ProductKind,
    pub state: ProductState,
    pub created_at: DateTime<Utc>,
}

/// Linha do livro de movimentos. Nunca é alterada nem removida.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: i64,
    pub product_id: i64,
    pub space_id: i64,
    pub staff_id: i64,
    pub kind: MovementKind,
    #[schema(value_type = f64)]
    pub area: Decimal,
    #[schema(example = "Ingreso de producto al espacio")]
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Dados do produto que chega ao balcão, antes de existir no banco.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub client_id: i64,
    pub name: String,
    pub description: String,
    pub area: Decimal,
    pub height: Decimal,
    pub kind: ProductKind,
}

/// Resposta de entrada / retirada: o produto e o movimento gravado.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductMovementResponse {
    pub product: Product,
    pub movement: Movement,
    #[schema(value_type = f64)]
    pub space_available_area: Decimal,
}
