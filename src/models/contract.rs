// src/models/contract.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contract_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractState {
    PendingVerification,
    VerifiedByClient,
    Active,
    Finalized,
    Cancelled,
}

impl ContractState {
    pub const ALL: [ContractState; 5] = [
        ContractState::PendingVerification,
        ContractState::VerifiedByClient,
        ContractState::Active,
        ContractState::Finalized,
        ContractState::Cancelled,
    ];

    /// Rótulo do enum `contract_state` no banco.
    pub fn as_sql(self) -> &'static str {
        match self {
            ContractState::PendingVerification => "PENDING_VERIFICATION",
            ContractState::VerifiedByClient => "VERIFIED_BY_CLIENT",
            ContractState::Active => "ACTIVE",
            ContractState::Finalized => "FINALIZED",
            ContractState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ContractState::Finalized | ContractState::Cancelled)
    }

    // Estados que seguram o espaço
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[schema(example = 42)]
    pub id: i64,
    pub space_id: i64,
    pub client_id: i64,
    pub agent_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[schema(value_type = f64, example = 1500000.0)]
    pub value: Decimal,
    #[schema(example = "Arriendo mensual de espacio refrigerado")]
    pub description: String,
    pub state: ContractState,
    pub client_signed_at: Option<DateTime<Utc>>,
    pub agent_signed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Termos editáveis enquanto o contrato está pendente.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTerms {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub value: Decimal,
    pub description: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ContractFilter {
    pub start_date: Option<NaiveDate>,
    pub state: Option<ContractState>,
    #[serde(default)]
    pub page: u32,
}
