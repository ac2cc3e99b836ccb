// src/services/warehouse_service.rs

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    common::{
        db_utils::{begin_locked, LockSettings},
        error::AppError,
        retry::retry_on_conflict,
    },
    db::{warehouse_repo::NewWarehouse, ProductRepository, WarehouseRepository},
    lifecycle::{movement_ledger, space_allocator},
    models::{
        product::Movement,
        warehouse::{ReconcileReport, Space, Warehouse, WarehouseFilter, WarehouseState},
    },
};

/// Confere se um espaço novo cabe no armazém. Devolve `true` quando, com
/// ele, toda a área do armazém fica dividida.
pub fn check_space_fits(
    warehouse: &Warehouse,
    partitioned: Decimal,
    area: Decimal,
    height: Decimal,
) -> Result<bool, AppError> {
    if warehouse.state == WarehouseState::Inactive {
        return Err(AppError::WarehouseNotActive(warehouse.id));
    }
    if height > warehouse.height {
        return Err(AppError::HeightExceeded);
    }
    let after = partitioned + area;
    if after > warehouse.total_area {
        return Err(AppError::SpaceExceedsWarehouse);
    }
    Ok(after == warehouse.total_area)
}

#[derive(Clone)]
pub struct WarehouseService {
    warehouse_repo: WarehouseRepository,
    product_repo: ProductRepository,
    pool: PgPool,
    lock: LockSettings,
    max_retries: u32,
}

impl WarehouseService {
    pub fn new(
        warehouse_repo: WarehouseRepository,
        product_repo: ProductRepository,
        pool: PgPool,
        lock: LockSettings,
        max_retries: u32,
    ) -> Self {
        Self { warehouse_repo, product_repo, pool, lock, max_retries }
    }

    // ---
    // Armazéns
    // ---

    pub async fn register_warehouse(&self, new: &NewWarehouse) -> Result<Warehouse, AppError> {
        let warehouse = self.warehouse_repo.create_warehouse(&self.pool, new).await?;
        tracing::info!(warehouse_id = warehouse.id, "Armazém registrado");
        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, id: i64) -> Result<Warehouse, AppError> {
        self.warehouse_repo
            .find_warehouse(&self.pool, id)
            .await?
            .ok_or(AppError::WarehouseNotFound(id))
    }

    pub async fn list_warehouses(&self, filter: &WarehouseFilter) -> Result<Vec<Warehouse>, AppError> {
        self.warehouse_repo.list_warehouses(filter).await
    }

    pub async fn deactivate_warehouse(&self, id: i64) -> Result<Warehouse, AppError> {
        retry_on_conflict(self.max_retries, || self.deactivate_warehouse_once(id)).await
    }

    async fn deactivate_warehouse_once(&self, id: i64) -> Result<Warehouse, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        let mut warehouse = self
            .warehouse_repo
            .lock_warehouse(&mut *tx, id)
            .await?
            .ok_or(AppError::WarehouseNotFound(id))?;

        if self.warehouse_repo.count_open_contracts(&mut *tx, id).await? > 0 {
            return Err(AppError::WarehouseHasContracts(id));
        }

        self.warehouse_repo
            .update_warehouse_state(&mut *tx, id, WarehouseState::Inactive)
            .await?;
        tx.commit().await?;

        warehouse.state = WarehouseState::Inactive;
        tracing::info!(warehouse_id = id, "Armazém desativado");
        Ok(warehouse)
    }

    // ---
    // Espaços
    // ---

    pub async fn register_space(
        &self,
        warehouse_id: i64,
        area: Decimal,
        height: Decimal,
    ) -> Result<Space, AppError> {
        retry_on_conflict(self.max_retries, || self.register_space_once(warehouse_id, area, height)).await
    }

    async fn register_space_once(
        &self,
        warehouse_id: i64,
        area: Decimal,
        height: Decimal,
    ) -> Result<Space, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // 1. Trava o armazém: criações concorrentes não dividem a mesma área
        let warehouse = self
            .warehouse_repo
            .lock_warehouse(&mut *tx, warehouse_id)
            .await?
            .ok_or(AppError::WarehouseNotFound(warehouse_id))?;

        // 2. Confere altura e área livre
        let partitioned = self.warehouse_repo.partitioned_area(&mut *tx, warehouse_id).await?;
        let fully_partitioned = check_space_fits(&warehouse, partitioned, area, height)?;

        // 3. Cria o espaço
        let space = self
            .warehouse_repo
            .create_space(&mut *tx, warehouse_id, area, height)
            .await?;

        // 4. Armazém sem área livre passa a OCCUPIED
        if fully_partitioned {
            self.warehouse_repo
                .update_warehouse_state(&mut *tx, warehouse_id, WarehouseState::Occupied)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(space_id = space.id, warehouse_id, "Espaço registrado");
        Ok(space)
    }

    pub async fn get_space(&self, id: i64) -> Result<Space, AppError> {
        self.warehouse_repo
            .find_space(&self.pool, id)
            .await?
            .ok_or(AppError::SpaceNotFound(id))
    }

    pub async fn list_free_spaces(&self, warehouse_id: i64, page: u32) -> Result<Vec<Space>, AppError> {
        self.get_warehouse(warehouse_id).await?;
        self.warehouse_repo.list_free_spaces(warehouse_id, page).await
    }

    pub async fn deactivate_space(&self, id: i64) -> Result<Space, AppError> {
        retry_on_conflict(self.max_retries, || self.deactivate_space_once(id)).await
    }

    async fn deactivate_space_once(&self, id: i64) -> Result<Space, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // Ordem: armazém -> espaço, igual ao cadastro
        let current = self
            .warehouse_repo
            .find_space(&mut *tx, id)
            .await?
            .ok_or(AppError::SpaceNotFound(id))?;
        let warehouse = self
            .warehouse_repo
            .lock_warehouse(&mut *tx, current.warehouse_id)
            .await?
            .ok_or(AppError::WarehouseNotFound(current.warehouse_id))?;
        let mut space = self
            .warehouse_repo
            .lock_space(&mut *tx, id)
            .await?
            .ok_or(AppError::SpaceNotFound(id))?;

        space_allocator::deactivate(&mut space)?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;

        // A área do espaço volta a ficar livre no armazém
        if warehouse.state == WarehouseState::Occupied {
            self.warehouse_repo
                .update_warehouse_state(&mut *tx, warehouse.id, WarehouseState::Active)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(space_id = id, "Espaço desativado");
        Ok(space)
    }

    pub async fn list_space_movements(&self, space_id: i64, page: u32) -> Result<Vec<Movement>, AppError> {
        self.get_space(space_id).await?;
        self.product_repo.list_movements_for_space(space_id, page).await
    }

    /// Recalcula a área livre do espaço a partir do livro e corrige o cache.
    pub async fn reconcile_space(&self, id: i64) -> Result<ReconcileReport, AppError> {
        retry_on_conflict(self.max_retries, || self.reconcile_space_once(id)).await
    }

    async fn reconcile_space_once(&self, id: i64) -> Result<ReconcileReport, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        let mut space = self
            .warehouse_repo
            .lock_space(&mut *tx, id)
            .await?
            .ok_or(AppError::SpaceNotFound(id))?;

        let ledger = self.product_repo.space_ledger(&mut *tx, id).await?;
        let ledger_area = movement_ledger::replay(space.total_area, &ledger);
        let cached_area = space.available_area;

        let repaired = space_allocator::reconcile(&mut space, ledger_area);
        if repaired {
            self.warehouse_repo.save_space(&mut *tx, &space).await?;
            tracing::warn!(
                space_id = id,
                %cached_area,
                %ledger_area,
                occupied_area = %space.occupied_area(),
                "Área do espaço divergia do livro de movimentos; cache corrigido"
            );
        }

        tx.commit().await?;

        Ok(ReconcileReport {
            space_id: id,
            cached_area,
            ledger_area,
            occupied_area: space.occupied_area(),
            repaired,
        })
    }
}
