// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Health ---
        handlers::auth::health,

        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::reactivate_account,
        handlers::auth::request_password_reset,
        handlers::auth::verify_reset_code,
        handlers::auth::reset_password,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::update_me,
        handlers::auth::update_my_credentials,
        handlers::auth::delete_me,

        // --- Staff ---
        handlers::auth::create_staff,
        handlers::auth::delete_staff,
        handlers::auth::reactivate_staff,
        handlers::auth::transfer_staff,
        handlers::auth::list_clients,

        // --- WAREHOUSES ---
        handlers::warehouses::create_warehouse,
        handlers::warehouses::list_warehouses,
        handlers::warehouses::get_warehouse,
        handlers::warehouses::deactivate_warehouse,

        // --- SPACES ---
        handlers::warehouses::create_space,
        handlers::warehouses::list_free_spaces,
        handlers::warehouses::get_space,
        handlers::warehouses::deactivate_space,
        handlers::warehouses::list_space_movements,
        handlers::warehouses::reconcile_space,

        // --- CONTRACTS ---
        handlers::contracts::create_contract,
        handlers::contracts::list_contracts,
        handlers::contracts::get_contract,
        handlers::contracts::edit_contract,
        handlers::contracts::verify_contract,
        handlers::contracts::activate_contract,
        handlers::contracts::cancel_contract,
        handlers::contracts::finalize_contract,
        handlers::contracts::contract_pdf,

        // --- PRODUCTS ---
        handlers::products::list_my_products,
        handlers::products::list_warehouse_products,
        handlers::products::intake_product,
        handlers::products::withdraw_product,
        handlers::products::product_movements,

        // --- CHAT ---
        handlers::chat::start_chat,
        handlers::chat::send_message,
        handlers::chat::list_messages,
        handlers::chat::close_chat,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::AccountState,
            models::auth::ClientKind,
            models::auth::User,
            models::auth::RegisterClientPayload,
            models::auth::CreateStaffPayload,
            models::auth::LoginPayload,
            models::auth::AuthResponse,
            models::auth::UpdateProfilePayload,
            models::auth::UpdateCredentialsPayload,
            models::auth::PasswordResetRequestPayload,
            models::auth::VerifyResetCodePayload,
            models::auth::ResetPasswordPayload,
            models::auth::TransferStaffPayload,

            // --- Warehouses ---
            models::warehouse::WarehouseState,
            models::warehouse::SpaceState,
            models::warehouse::Warehouse,
            models::warehouse::Space,
            models::warehouse::ReconcileReport,
            handlers::warehouses::CreateWarehousePayload,
            handlers::warehouses::CreateSpacePayload,

            // --- Contracts ---
            models::contract::ContractState,
            models::contract::Contract,
            handlers::contracts::CreateContractPayload,
            handlers::contracts::EditContractPayload,

            // --- Products ---
            models::product::ProductKind,
            models::product::ProductState,
            models::product::MovementKind,
            models::product::Product,
            models::product::Movement,
            models::product::ProductMovementResponse,
            handlers::products::IntakePayload,

            // --- Chat ---
            models::chat::ChatState,
            models::chat::ChatSender,
            models::chat::ChatSession,
            models::chat::ChatMessage,
            handlers::chat::SendMessagePayload,
        )
    ),
    tags(
        (name = "Health", description = "Estado do serviço"),
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Staff", description = "Gestão de Funcionários (RH)"),
        (name = "Warehouses", description = "Armazéns"),
        (name = "Spaces", description = "Espaços alugáveis e livro de movimentos"),
        (name = "Contracts", description = "Ciclo de vida dos contratos"),
        (name = "Products", description = "Entrada e retirada de produtos"),
        (name = "Chat", description = "Conversas entre cliente e agente")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_contract_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/contracts/{id}/activate"));
        assert!(doc.paths.paths.contains_key("/api/products/intake"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("api_jwt"));
    }

    #[test]
    fn test_document_lists_account_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/password-reset",
            "/api/auth/password-reset/verify",
            "/api/auth/password-reset/confirm",
            "/api/auth/reactivate",
            "/api/users/me/credentials",
            "/api/clients",
            "/api/staff/{id}/reactivate",
            "/api/staff/{id}/warehouse",
        ] {
            assert!(doc.paths.paths.contains_key(path), "rota ausente: {path}");
        }
    }
}
