// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{Role, User},
};

/// 1. O trait que define quais papéis uma rota aceita
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [Role];
}

/// 2. O extractor (guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

/// Confere o papel do usuário contra a lista aceita.
pub fn check_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, &app_state)
            .await
            .unwrap_or_else(|never| match never {});

        // A. Usuário autenticado pelo auth_guard
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        // B. Papel aceito pela rota
        check_role(&user, T::allowed())
            .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct ClientOnly;
impl RoleDef for ClientOnly {
    fn allowed() -> &'static [Role] { &[Role::Client] }
}

pub struct SalesAgentOnly;
impl RoleDef for SalesAgentOnly {
    fn allowed() -> &'static [Role] { &[Role::SalesAgent] }
}

pub struct WarehouseStaffOnly;
impl RoleDef for WarehouseStaffOnly {
    fn allowed() -> &'static [Role] { &[Role::WarehouseStaff] }
}

pub struct HumanResourcesOnly;
impl RoleDef for HumanResourcesOnly {
    fn allowed() -> &'static [Role] { &[Role::HumanResources] }
}

pub struct StaffOrHr;
impl RoleDef for StaffOrHr {
    fn allowed() -> &'static [Role] { &[Role::WarehouseStaff, Role::HumanResources] }
}

pub struct ClientOrAgent;
impl RoleDef for ClientOrAgent {
    fn allowed() -> &'static [Role] { &[Role::Client, Role::SalesAgent] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::AccountState;
    use chrono::Utc;

    fn make_user(role: Role) -> User {
        User {
            id: 1,
            email: "u@storeit.co".into(),
            password_hash: String::new(),
            name: "Usuário".into(),
            phone: "+573001234567".into(),
            phone_country: "CO".into(),
            secondary_phone: None,
            role,
            account_state: AccountState::Active,
            client_kind: None,
            warehouse_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_allowed_role_passes() {
        assert!(check_role(&make_user(Role::SalesAgent), SalesAgentOnly::allowed()).is_ok());
        assert!(check_role(&make_user(Role::HumanResources), StaffOrHr::allowed()).is_ok());
    }

    #[test]
    fn test_other_role_is_forbidden() {
        let err = check_role(&make_user(Role::Client), StaffOrHr::allowed()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert!(check_role(&make_user(Role::WarehouseStaff), ClientOrAgent::allowed()).is_err());
    }
}
