// src/lifecycle/error.rs

use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{common::error::ErrorKind, models::contract::ContractState};

/// Falhas das regras de espaço / contrato / produto.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("espaço {space_id} não está disponível")]
    SpaceNotAvailable { space_id: i64 },

    #[error("espaço {space_id}: pedido de {requested_area} m² / {requested_height} m excede {available_area} m² / {max_height} m")]
    CapacityExceeded {
        space_id: i64,
        requested_area: Decimal,
        available_area: Decimal,
        requested_height: Decimal,
        max_height: Decimal,
    },

    #[error("medidas negativas não são aceitas")]
    InvalidMeasure,

    #[error("espaço {0} possui contrato ou produtos")]
    SpaceInUse(i64),

    #[error("contrato {0} não está pendente de verificação")]
    ContractNotPending(i64),

    #[error("contrato não foi assinado pelo cliente")]
    ContractNotSignedByClient,

    #[error("contrato {0} já está ativo")]
    ContractAlreadyActive(i64),

    #[error("contrato {0} já está em uso")]
    ContractInUse(i64),

    #[error("contrato {0} não está ativo")]
    ContractNotActive(i64),

    #[error("contrato {contract_id} está em estado terminal ({state:?})")]
    ContractTerminal { contract_id: i64, state: ContractState },

    #[error("prazo de verificação do contrato {0} expirou")]
    VerificationExpired(i64),

    #[error("data inicial posterior à data final")]
    InvalidContractDates,

    #[error("valor do contrato deve ser positivo")]
    InvalidContractValue,

    #[error("cliente ainda tem {stored} produto(s) no espaço do contrato {contract_id}")]
    ClientProductsInWarehouse { contract_id: i64, stored: i64 },

    #[error("produto {0} não está no armazém")]
    ProductNotInWarehouse(i64),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // Estado já avançou: outra requisição chegou antes
            LifecycleError::ContractNotPending(_)
            | LifecycleError::ContractAlreadyActive(_)
            | LifecycleError::ContractTerminal { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Invalid,
        }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            LifecycleError::SpaceNotAvailable { .. } => "space_not_available",
            LifecycleError::CapacityExceeded { .. } => "capacity_exceeded",
            LifecycleError::InvalidMeasure => "invalid_measure",
            LifecycleError::SpaceInUse(_) => "space_in_use",
            LifecycleError::ContractNotPending(_) => "contract_not_pending",
            LifecycleError::ContractNotSignedByClient => "contract_not_signed_by_client",
            LifecycleError::ContractAlreadyActive(_) => "contract_already_active",
            LifecycleError::ContractInUse(_) => "contract_in_use",
            LifecycleError::ContractNotActive(_) => "contract_not_active",
            LifecycleError::ContractTerminal { .. } => "contract_terminal",
            LifecycleError::VerificationExpired(_) => "contract_verification_expired",
            LifecycleError::InvalidContractDates => "dates_out_of_order",
            LifecycleError::InvalidContractValue => "contract_invalid_value",
            LifecycleError::ClientProductsInWarehouse { .. } => "client_products_in_warehouse",
            LifecycleError::ProductNotInWarehouse(_) => "product_not_in_warehouse",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            LifecycleError::CapacityExceeded {
                space_id,
                requested_area,
                available_area,
                requested_height,
                max_height,
            } => Some(json!({
                "spaceId": space_id,
                "requestedArea": requested_area,
                "availableArea": available_area,
                "requestedHeight": requested_height,
                "maxHeight": max_height,
            })),
            LifecycleError::ContractTerminal { contract_id, state } => Some(json!({
                "contractId": contract_id,
                "state": state,
            })),
            LifecycleError::ClientProductsInWarehouse { contract_id, stored } => Some(json!({
                "contractId": contract_id,
                "storedProducts": stored,
            })),
            _ => None,
        }
    }
}
