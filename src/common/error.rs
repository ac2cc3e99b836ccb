// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    lifecycle::LifecycleError,
    middleware::i18n::Locale,
};

// SQLSTATEs que indicam disputa de lock: serialização, deadlock,
// lock_timeout e statement_timeout.
const RETRYABLE_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

/// Categoria de um erro, independente da variante concreta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Conflict,
    MissingField,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Invalid | ErrorKind::MissingField => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    // --- Autenticação / contas ---
    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Conta não está ativa")]
    AccountNotActive,

    #[error("Conta já está ativa")]
    AccountAlreadyActive,

    #[error("Nova senha igual à atual")]
    PasswordReused,

    #[error("Código de redefinição inválido ou expirado")]
    ResetCodeInvalid,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Usuário {0} não tem o papel esperado para esta operação")]
    InvalidParticipant(i64),

    // --- Não encontrados ---
    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Armazém {0} não encontrado")]
    WarehouseNotFound(i64),

    #[error("Espaço {0} não encontrado")]
    SpaceNotFound(i64),

    #[error("Contrato {0} não encontrado")]
    ContractNotFound(i64),

    #[error("Produto {0} não encontrado")]
    ProductNotFound(i64),

    #[error("Chat {0} não encontrado")]
    ChatNotFound(i64),

    // --- Regras de armazém / espaço ---
    #[error("Armazém {0} não está ativo")]
    WarehouseNotActive(i64),

    #[error("Armazém {0} possui contratos em aberto")]
    WarehouseHasContracts(i64),

    #[error("Altura do espaço excede a do armazém")]
    HeightExceeded,

    #[error("Área do espaço excede a área livre do armazém")]
    SpaceExceedsWarehouse,

    #[error("Espaço {0} já possui um contrato em aberto")]
    SpaceAlreadyContracted(i64),

    // --- Regras de pessoas ---
    #[error("Cliente possui contratos em aberto")]
    ClientHasOpenContracts,

    #[error("Cliente ainda possui produtos armazenados")]
    ClientHasStoredProducts,

    #[error("Agente possui contratos em aberto")]
    AgentHasOpenContracts,

    // --- Chat ---
    #[error("Nenhum agente disponível")]
    AgentUnavailable,

    #[error("Chat {0} não está ativo")]
    ChatNotActive(i64),

    // --- Concorrência / integridade ---
    #[error("Modificação concorrente detectada")]
    ConcurrentModification,

    #[error("Violação de restrição única: {0}")]
    UniqueConstraintViolation(String),

    // --- Infra ---
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Falha ao gerar documento: {0}")]
    DocumentRenderError(String),
}

// Conversão manual: disputas de lock viram ConcurrentModification (retentável).
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if let Some(code) = db_err.code() {
                let code: &str = &code;
                if RETRYABLE_SQLSTATES.contains(&code) {
                    return AppError::ConcurrentModification;
                }
            }
        }
        if matches!(e, sqlx::Error::PoolTimedOut) {
            return AppError::ConcurrentModification;
        }
        AppError::DatabaseError(e)
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) => ErrorKind::Invalid,
            AppError::MissingField(_) => ErrorKind::MissingField,
            AppError::Lifecycle(e) => e.kind(),

            AppError::InvalidCredentials | AppError::InvalidToken => ErrorKind::Unauthorized,
            AppError::AccountNotActive | AppError::Forbidden => ErrorKind::Forbidden,

            AppError::UserNotFound
            | AppError::WarehouseNotFound(_)
            | AppError::SpaceNotFound(_)
            | AppError::ContractNotFound(_)
            | AppError::ProductNotFound(_)
            | AppError::ChatNotFound(_) => ErrorKind::NotFound,

            AppError::InvalidParticipant(_)
            | AppError::AccountAlreadyActive
            | AppError::PasswordReused
            | AppError::ResetCodeInvalid
            | AppError::WarehouseNotActive(_)
            | AppError::WarehouseHasContracts(_)
            | AppError::HeightExceeded
            | AppError::SpaceExceedsWarehouse
            | AppError::ClientHasOpenContracts
            | AppError::ClientHasStoredProducts
            | AppError::AgentHasOpenContracts
            | AppError::ChatNotActive(_) => ErrorKind::Invalid,

            AppError::EmailAlreadyExists
            | AppError::SpaceAlreadyContracted(_)
            | AppError::AgentUnavailable
            | AppError::ConcurrentModification
            | AppError::UniqueConstraintViolation(_) => ErrorKind::Conflict,

            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_)
            | AppError::DocumentRenderError(_) => ErrorKind::Internal,
        }
    }

    /// Só a disputa de lock é repetida pelo laço de retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification)
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_failed",
            AppError::MissingField(_) => "missing_field",
            AppError::Lifecycle(e) => e.message_key(),
            AppError::EmailAlreadyExists => "email_already_exists",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::AccountNotActive => "account_not_active",
            AppError::AccountAlreadyActive => "account_already_active",
            AppError::PasswordReused => "password_reused",
            AppError::ResetCodeInvalid => "reset_code_invalid",
            AppError::Forbidden => "forbidden",
            AppError::InvalidParticipant(_) => "invalid_participant",
            AppError::UserNotFound => "user_not_found",
            AppError::WarehouseNotFound(_) => "warehouse_not_found",
            AppError::SpaceNotFound(_) => "space_not_found",
            AppError::ContractNotFound(_) => "contract_not_found",
            AppError::ProductNotFound(_) => "product_not_found",
            AppError::ChatNotFound(_) => "chat_not_found",
            AppError::WarehouseNotActive(_) => "warehouse_not_active",
            AppError::WarehouseHasContracts(_) => "warehouse_has_contracts",
            AppError::HeightExceeded => "height_exceeded",
            AppError::SpaceExceedsWarehouse => "space_exceeds_warehouse",
            AppError::SpaceAlreadyContracted(_) => "space_already_contracted",
            AppError::ClientHasOpenContracts => "client_has_open_contracts",
            AppError::ClientHasStoredProducts => "client_products_in_warehouse",
            AppError::AgentHasOpenContracts => "agent_has_open_contracts",
            AppError::AgentUnavailable => "agent_unavailable",
            AppError::ChatNotActive(_) => "chat_not_active",
            AppError::ConcurrentModification => "concurrent_modification",
            AppError::UniqueConstraintViolation(_) => "conflict",
            AppError::DocumentRenderError(_) => "document_render_failed",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "internal_error",
        }
    }

    /// Converte o erro de domínio na resposta HTTP traduzida.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut fields: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            let key = e.message.as_deref().unwrap_or(&*e.code);
                            i18n.translate(&locale.0, key)
                        })
                        .collect();
                    fields.insert(field.to_string(), messages);
                }
                Some(json!(fields))
            }
            AppError::MissingField(field) => Some(json!({ "field": field })),
            AppError::Lifecycle(e) => e.details(),
            _ => None,
        };

        ApiError {
            status: kind.status(),
            message: i18n.translate(&locale.0, self.message_key()),
            details,
        }
    }
}

/// Rejeição HTTP: `{ "error": true, "message": ..., "details"?: ... }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": true,
            "message": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    fn store() -> I18nStore {
        I18nStore::embedded("es").expect("locales embutidos válidos")
    }

    fn es() -> Locale {
        Locale("es".to_string())
    }

    // ── status ──────────────────────────────────────────────────────

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(AppError::SpaceNotFound(7).kind().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ContractNotFound(7).kind().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_business_rules_map_to_400() {
        assert_eq!(AppError::HeightExceeded.kind().status(), StatusCode::BAD_REQUEST);
        let err = AppError::from(LifecycleError::ProductNotInWarehouse(3));
        assert_eq!(err.kind().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_concurrent_modification_is_retryable_conflict() {
        let err = AppError::ConcurrentModification;
        assert!(err.is_retryable());
        assert_eq!(err.kind().status(), StatusCode::CONFLICT);
        assert!(!AppError::SpaceAlreadyContracted(1).is_retryable());
    }

    #[test]
    fn test_pool_timeout_becomes_concurrent_modification() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::ConcurrentModification));
    }

    #[test]
    fn test_missing_field_is_a_400_with_the_field_name() {
        let api = AppError::MissingField("warehouseId").to_api_error(&es(), &store());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details.expect("campo ausente")["field"], "warehouseId");
    }

    #[test]
    fn test_row_not_found_stays_database_error() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    // ── tradução ────────────────────────────────────────────────────

    #[test]
    fn test_api_error_is_translated() {
        let api = AppError::ContractNotFound(1).to_api_error(&es(), &store());
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.message, "El contrato no existe");
    }

    #[test]
    fn test_validation_details_are_translated_per_field() {
        let mut errors = ValidationErrors::new();
        let mut e = ValidationError::new("length");
        e.message = Some("required".into());
        errors.add("name", e);

        let api = AppError::ValidationError(errors).to_api_error(&es(), &store());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.expect("detalhes por campo");
        assert_eq!(details["name"][0], "El campo es obligatorio");
    }

    #[test]
    fn test_capacity_details_are_exposed() {
        let err = AppError::from(LifecycleError::CapacityExceeded {
            space_id: 1,
            requested_area: rust_decimal::Decimal::from(10),
            available_area: rust_decimal::Decimal::from(5),
            requested_height: rust_decimal::Decimal::ONE,
            max_height: rust_decimal::Decimal::from(3),
        });
        let api = err.to_api_error(&es(), &store());
        let details = api.details.expect("detalhes de capacidade");
        assert_eq!(details["spaceId"], 1);
    }
}
