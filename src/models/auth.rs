// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::common::phone::validate_phone_field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    SalesAgent,
    WarehouseStaff,
    HumanResources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "account_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientKind {
    NaturalPerson,
    LegalEntity,
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[schema(example = "cliente@storeit.co")]
    pub email: String,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,

    #[schema(example = "Laura Gómez")]
    pub name: String,
    #[schema(example = "+573001234567")]
    pub phone: String,
    #[schema(example = "CO")]
    pub phone_country: String,
    pub secondary_phone: Option<String>,
    pub role: Role,
    pub account_state: AccountState,
    pub client_kind: Option<ClientKind>,
    // Só para pessoal de armazém
    pub warehouse_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.account_state == AccountState::Active
    }
}

// Dados para o auto-registro de um cliente
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClientPayload {
    #[validate(email(message = "invalid_email"))]
    #[schema(example = "cliente@storeit.co")]
    pub email: String,
    #[validate(length(min = 7, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, max = 150, message = "required"))]
    pub name: String,
    #[validate(length(equal = 2, message = "phone_country_unsupported"))]
    #[schema(example = "CO")]
    pub phone_country: String,
    #[schema(example = "3001234567")]
    pub phone: String,
    pub secondary_phone: Option<String>,
    pub client_kind: ClientKind,
}

impl RegisterClientPayload {
    /// Telefones validados contra o país informado.
    pub fn validate_phones(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_phone_field(&mut errors, "phone", &self.phone_country, &self.phone);
        if let Some(secondary) = &self.secondary_phone {
            validate_phone_field(&mut errors, "secondaryPhone", &self.phone_country, secondary);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// Dados para o cadastro de funcionários pelo RH
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 7, message = "password_too_short"))]
    pub password: String,
    #[validate(length(min = 1, max = 150, message = "required"))]
    pub name: String,
    #[validate(length(equal = 2, message = "phone_country_unsupported"))]
    pub phone_country: String,
    pub phone: String,
    pub role: Role,
    // Obrigatório para WAREHOUSE_STAFF
    pub warehouse_id: Option<i64>,
}

impl CreateStaffPayload {
    pub fn validate_phones(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_phone_field(&mut errors, "phone", &self.phone_country, &self.phone);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Clientes se registram sozinhos.
    pub fn validate_consistency(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.role == Role::Client {
            let mut e = ValidationError::new("role");
            e.message = Some("invalid_participant".into());
            errors.add("role", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(min = 1, message = "required"))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // ID do usuário
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Linha a inserir em `users`; a senha já chega com hash.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: String,
    pub phone_country: String,
    pub secondary_phone: Option<String>,
    pub role: Role,
    pub client_kind: Option<ClientKind>,
    pub warehouse_id: Option<i64>,
}

// ---
// Perfil e credenciais do cliente
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[validate(length(min = 1, max = 150, message = "required"))]
    #[schema(example = "Laura Gómez")]
    pub name: String,
    #[schema(example = "3001234567")]
    pub phone: String,
    pub secondary_phone: Option<String>,
}

impl UpdateProfilePayload {
    /// O país do telefone é o do cadastro.
    pub fn validate_phones(&self, phone_country: &str) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_phone_field(&mut errors, "phone", phone_country, &self.phone);
        if let Some(secondary) = &self.secondary_phone {
            validate_phone_field(&mut errors, "secondaryPhone", phone_country, secondary);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsPayload {
    #[validate(length(min = 1, message = "required"))]
    pub current_password: String,
    #[validate(email(message = "invalid_email"))]
    pub new_email: Option<String>,
    #[validate(length(min = 7, message = "password_too_short"))]
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClientFilter {
    /// País do telefone (ISO alfa-2)
    pub country: Option<String>,
    pub client_kind: Option<ClientKind>,
    pub account_state: Option<AccountState>,
    #[serde(default)]
    pub page: u32,
}

// ---
// Recuperação e reativação de conta
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequestPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyResetCodePayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(equal = 6, message = "reset_code_invalid"))]
    #[schema(example = "A1B2C3")]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    #[validate(email(message = "invalid_email"))]
    pub email: String,
    #[validate(length(equal = 6, message = "reset_code_invalid"))]
    pub code: String,
    #[validate(length(min = 7, message = "password_too_short"))]
    pub new_password: String,
}

/// Código de redefinição guardado para um usuário.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetCode {
    pub user_id: i64,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetCode {
    /// Confere o código (sem diferenciar maiúsculas) e a validade.
    pub fn accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
        now <= self.expires_at && self.code.eq_ignore_ascii_case(code.trim())
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferStaffPayload {
    pub warehouse_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_code(expires_in_minutes: i64) -> PasswordResetCode {
        PasswordResetCode {
            user_id: 1,
            code: "A1B2C3".into(),
            expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        }
    }

    #[test]
    fn test_reset_code_is_case_insensitive() {
        let code = make_code(30);
        assert!(code.accepts("a1b2c3", Utc::now()));
        assert!(code.accepts(" A1B2C3 ", Utc::now()));
        assert!(!code.accepts("ZZZZZZ", Utc::now()));
    }

    #[test]
    fn test_expired_reset_code_is_refused() {
        let code = make_code(-1);
        assert!(!code.accepts("A1B2C3", Utc::now()));
    }

    #[test]
    fn test_staff_without_warehouse_passes_consistency() {
        // A falta do armazém é tratada no serviço como campo ausente
        let payload: CreateStaffPayload = serde_json::from_value(serde_json::json!({
            "email": "bodega@storeit.co",
            "password": "segura123",
            "name": "Pedro",
            "phoneCountry": "CO",
            "phone": "3001234567",
            "role": "WAREHOUSE_STAFF"
        }))
        .unwrap();
        assert!(payload.validate_consistency().is_ok());
    }

    #[test]
    fn test_client_role_is_refused_for_staff() {
        let payload: CreateStaffPayload = serde_json::from_value(serde_json::json!({
            "email": "x@storeit.co",
            "password": "segura123",
            "name": "X",
            "phoneCountry": "CO",
            "phone": "3001234567",
            "role": "CLIENT"
        }))
        .unwrap();
        let errors = payload.validate_consistency().unwrap_err();
        assert!(errors.field_errors().contains_key("role"));
    }

    #[test]
    fn test_profile_phone_uses_registered_country() {
        let payload = UpdateProfilePayload {
            name: "Laura".into(),
            phone: "3001234567".into(),
            secondary_phone: Some("12".into()),
        };
        let errors = payload.validate_phones("CO").unwrap_err();
        assert!(errors.field_errors().contains_key("secondaryPhone"));
        assert!(!errors.field_errors().contains_key("phone"));
    }
}
