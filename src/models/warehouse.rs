// src/models/warehouse.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "warehouse_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseState {
    Active,
    Inactive,
    // Toda a área já foi dividida em espaços
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "space_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpaceState {
    Free,
    ContractedAvailable,
    ContractedFull,
    Inactive,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "Bodega Norte")]
    pub name: String,
    #[schema(example = "CO")]
    pub country: String,
    #[schema(example = "Armenia")]
    pub city: String,
    #[schema(example = "Calle 10 # 5-20")]
    pub address: String,
    #[schema(example = "+573001234567")]
    pub phone: String,
    #[schema(value_type = f64, example = 500.0)]
    pub total_area: Decimal,
    #[schema(value_type = f64, example = 8.0)]
    pub height: Decimal,
    pub state: WarehouseState,
    pub created_at: DateTime<Utc>,
}

impl Warehouse {
    /// Armazém desativado não recebe contratos nem pessoal.
    pub fn is_open(&self) -> bool {
        self.state != WarehouseState::Inactive
    }
}

/// Espaço alugável. `available_area` é um cache do livro de movimentos.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    #[schema(example = 10)]
    pub id: i64,
    pub warehouse_id: i64,
    #[schema(value_type = f64, example = 100.0)]
    pub total_area: Decimal,
    #[schema(value_type = f64, example = 60.0)]
    pub available_area: Decimal,
    #[schema(value_type = f64, example = 5.0)]
    pub height: Decimal,
    pub state: SpaceState,
    // Contrato não-terminal que segura o espaço
    pub contract_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Space {
    pub fn occupied_area(&self) -> Decimal {
        self.total_area - self.available_area
    }
}

// --- Filtros ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WarehouseFilter {
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<WarehouseState>,
    #[param(value_type = Option<f64>)]
    pub min_area: Option<Decimal>,
    #[param(value_type = Option<f64>)]
    pub min_height: Option<Decimal>,
    #[serde(default)]
    pub page: u32,
}

/// Resultado de uma reconciliação do cache com o livro de movimentos.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub space_id: i64,
    #[schema(value_type = f64)]
    pub cached_area: Decimal,
    #[schema(value_type = f64)]
    pub ledger_area: Decimal,
    // Área ocupada depois da reconciliação
    #[schema(value_type = f64)]
    pub occupied_area: Decimal,
    pub repaired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_space(total: i64, available: i64) -> Space {
        Space {
            id: 10,
            warehouse_id: 1,
            total_area: Decimal::from(total),
            available_area: Decimal::from(available),
            height: Decimal::from(4),
            state: SpaceState::ContractedAvailable,
            contract_id: Some(42),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_occupied_area_is_total_minus_available() {
        assert_eq!(make_space(100, 60).occupied_area(), Decimal::from(40));
        assert_eq!(make_space(100, 100).occupied_area(), Decimal::ZERO);
    }

    #[test]
    fn test_only_inactive_warehouse_is_closed() {
        let mut warehouse = Warehouse {
            id: 1,
            name: "Bodega Norte".into(),
            country: "CO".into(),
            city: "Armenia".into(),
            address: "Calle 10".into(),
            phone: "+573001234567".into(),
            total_area: Decimal::from(500),
            height: Decimal::from(8),
            state: WarehouseState::Occupied,
            created_at: Utc::now(),
        };
        assert!(warehouse.is_open());
        warehouse.state = WarehouseState::Inactive;
        assert!(!warehouse.is_open());
    }
}
