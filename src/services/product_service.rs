// src/services/product_service.rs

use chrono::Utc;
use sqlx::PgPool;

use crate::{
    common::{
        db_utils::{begin_locked, LockSettings},
        error::AppError,
        retry::retry_on_conflict,
    },
    db::{ContractRepository, ProductRepository, UserRepository, WarehouseRepository},
    lifecycle::movement_ledger,
    models::{
        auth::{Role, User},
        product::{Movement, NewProduct, Product, ProductMovementResponse},
        warehouse::Space,
    },
    services::notification_service::{self as mail, NotificationService},
};

/// Pessoal de armazém só mexe nos espaços do próprio armazém.
pub fn ensure_staff_of(staff: &User, space: &Space) -> Result<(), AppError> {
    if staff.role != Role::WarehouseStaff || staff.warehouse_id != Some(space.warehouse_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Histórico visível para o dono do produto e para o pessoal interno.
pub fn can_see_history(user: &User, product: &Product) -> bool {
    match user.role {
        Role::Client => user.id == product.client_id,
        Role::WarehouseStaff | Role::HumanResources => true,
        Role::SalesAgent => false,
    }
}

#[derive(Clone)]
pub struct ProductService {
    product_repo: ProductRepository,
    warehouse_repo: WarehouseRepository,
    contract_repo: ContractRepository,
    user_repo: UserRepository,
    notifier: NotificationService,
    pool: PgPool,
    lock: LockSettings,
    max_retries: u32,
}

impl ProductService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_repo: ProductRepository,
        warehouse_repo: WarehouseRepository,
        contract_repo: ContractRepository,
        user_repo: UserRepository,
        notifier: NotificationService,
        pool: PgPool,
        lock: LockSettings,
        max_retries: u32,
    ) -> Self {
        Self {
            product_repo,
            warehouse_repo,
            contract_repo,
            user_repo,
            notifier,
            pool,
            lock,
            max_retries,
        }
    }

    /// Entrada de produto no espaço contratado pelo cliente.
    pub async fn intake(
        &self,
        staff: &User,
        space_id: i64,
        product: NewProduct,
    ) -> Result<ProductMovementResponse, AppError> {
        let (response, client) =
            retry_on_conflict(self.max_retries, || self.intake_once(staff, space_id, &product)).await?;

        self.notifier.notify(mail::product_intake(&client.email, &response.product.name, space_id));
        Ok(response)
    }

    async fn intake_once(
        &self,
        staff: &User,
        space_id: i64,
        new: &NewProduct,
    ) -> Result<(ProductMovementResponse, User), AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // 1. Espaço primeiro, depois o contrato que o segura
        let mut space = self
            .warehouse_repo
            .lock_space(&mut *tx, space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(space_id))?;
        ensure_staff_of(staff, &space)?;

        let client = self
            .user_repo
            .find_active_with_role(&mut *tx, new.client_id, Role::Client)
            .await?;
        let contract = self.contract_repo.lock_open_for_space(&mut *tx, space_id).await?;

        // 2. Reserva a área e monta o movimento
        let draft = movement_ledger::intake(&mut space, contract.as_ref(), new, staff.id, Utc::now())?;

        // 3. Produto, movimento e cache na mesma transação
        let product = self.product_repo.insert_product(&mut *tx, space_id, new).await?;
        let movement = self.product_repo.insert_movement(&mut *tx, product.id, &draft).await?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;

        tx.commit().await?;

        tracing::info!(
            product_id = product.id,
            space_id,
            area = %draft.area,
            available = %space.available_area,
            "Ingreso de produto"
        );
        Ok((
            ProductMovementResponse { product, movement, space_available_area: space.available_area },
            client,
        ))
    }

    pub async fn withdraw(&self, staff: &User, product_id: i64) -> Result<ProductMovementResponse, AppError> {
        let response = retry_on_conflict(self.max_retries, || self.withdraw_once(staff, product_id)).await?;

        if let Some(email) = self.user_repo.email_for_notice(response.product.client_id).await {
            self.notifier.notify(mail::product_withdrawn(
                &email,
                &response.product.name,
                response.product.space_id,
            ));
        }
        Ok(response)
    }

    async fn withdraw_once(&self, staff: &User, product_id: i64) -> Result<ProductMovementResponse, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        let space_id = self
            .product_repo
            .find_product(&mut *tx, product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?
            .space_id;

        // Ordem: espaço -> produto
        let mut space = self
            .warehouse_repo
            .lock_space(&mut *tx, space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(space_id))?;
        ensure_staff_of(staff, &space)?;
        let mut product = self
            .product_repo
            .lock_product(&mut *tx, product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?;

        let draft = movement_ledger::withdraw(&mut space, &mut product, staff.id, Utc::now())?;

        self.product_repo
            .update_product_state(&mut *tx, product.id, product.state)
            .await?;
        let movement = self.product_repo.insert_movement(&mut *tx, product.id, &draft).await?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;

        tx.commit().await?;

        tracing::info!(product_id, space_id, available = %space.available_area, "Retiro de produto");
        Ok(ProductMovementResponse { product, movement, space_available_area: space.available_area })
    }

    pub async fn list_client_products(&self, client_id: i64, page: u32) -> Result<Vec<Product>, AppError> {
        self.product_repo.list_stored_for_client(client_id, page).await
    }

    pub async fn list_warehouse_products(&self, staff: &User, page: u32) -> Result<Vec<Product>, AppError> {
        let warehouse_id = staff.warehouse_id.ok_or(AppError::Forbidden)?;
        self.product_repo.list_stored_in_warehouse(warehouse_id, page).await
    }

    pub async fn product_movements(&self, user: &User, product_id: i64) -> Result<Vec<Movement>, AppError> {
        let product = self
            .product_repo
            .find_product(&self.pool, product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?;
        if !can_see_history(user, &product) {
            return Err(AppError::Forbidden);
        }
        self.product_repo.list_movements_for_product(product_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        auth::AccountState,
        product::{ProductKind, ProductState},
        warehouse::SpaceState,
    };
    use rust_decimal::Decimal;

    fn make_user(id: i64, role: Role, warehouse_id: Option<i64>) -> User {
        User {
            id,
            email: format!("u{id}@storeit.co"),
            password_hash: String::new(),
            name: "Usuário".into(),
            phone: "+573001234567".into(),
            phone_country: "CO".into(),
            secondary_phone: None,
            role,
            account_state: AccountState::Active,
            client_kind: None,
            warehouse_id,
            created_at: Utc::now(),
        }
    }

    fn make_space(warehouse_id: i64) -> Space {
        Space {
            id: 3,
            warehouse_id,
            total_area: Decimal::from(20),
            available_area: Decimal::from(20),
            height: Decimal::from(3),
            state: SpaceState::Free,
            contract_id: None,
            created_at: Utc::now(),
        }
    }

    fn make_product(client_id: i64) -> Product {
        Product {
            id: 9,
            client_id,
            space_id: 3,
            name: "Caja".into(),
            description: String::new(),
            area: Decimal::ONE,
            height: Decimal::ONE,
            kind: ProductKind::Fragile,
            state: ProductState::InWarehouse,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_staff_of_same_warehouse_is_allowed() {
        let staff = make_user(1, Role::WarehouseStaff, Some(4));
        assert!(ensure_staff_of(&staff, &make_space(4)).is_ok());
    }

    #[test]
    fn test_staff_of_other_warehouse_is_refused() {
        let staff = make_user(1, Role::WarehouseStaff, Some(4));
        assert!(matches!(ensure_staff_of(&staff, &make_space(5)), Err(AppError::Forbidden)));
    }

    #[test]
    fn test_non_staff_is_refused() {
        let agent = make_user(1, Role::SalesAgent, None);
        assert!(ensure_staff_of(&agent, &make_space(4)).is_err());
    }

    #[test]
    fn test_history_visibility() {
        let product = make_product(100);
        assert!(can_see_history(&make_user(100, Role::Client, None), &product));
        assert!(!can_see_history(&make_user(101, Role::Client, None), &product));
        assert!(can_see_history(&make_user(7, Role::WarehouseStaff, Some(1)), &product));
        assert!(!can_see_history(&make_user(8, Role::SalesAgent, None), &product));
    }
}
