// src/db/warehouse_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        error::AppError,
        pagination::{offset, PAGE_SIZE},
    },
    models::warehouse::{Space, Warehouse, WarehouseFilter, WarehouseState},
};

const WAREHOUSE_COLUMNS: &str =
    "id, name, country, city, address, phone, total_area, height, state, created_at";
const SPACE_COLUMNS: &str =
    "id, warehouse_id, total_area, available_area, height, state, contract_id, created_at";

/// Dados de um armazém novo, já validados.
#[derive(Debug, Clone)]
pub struct NewWarehouse {
    pub name: String,
    pub country: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub total_area: Decimal,
    pub height: Decimal,
}

#[derive(Clone)]
pub struct WarehouseRepository {
    pool: PgPool,
}

impl WarehouseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Armazéns
    // ---

    pub async fn create_warehouse<'e, E>(
        &self,
        executor: E,
        new: &NewWarehouse,
    ) -> Result<Warehouse, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO warehouses (name, country, city, address, phone, total_area, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WAREHOUSE_COLUMNS}
            "#
        );
        let warehouse = sqlx::query_as::<_, Warehouse>(&sql)
            .bind(&new.name)
            .bind(&new.country)
            .bind(&new.city)
            .bind(&new.address)
            .bind(&new.phone)
            .bind(new.total_area)
            .bind(new.height)
            .fetch_one(executor)
            .await?;
        Ok(warehouse)
    }

    pub async fn find_warehouse<'e, E>(&self, executor: E, id: i64) -> Result<Option<Warehouse>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1");
        let warehouse = sqlx::query_as::<_, Warehouse>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(warehouse)
    }

    /// Trava o armazém; serializa a criação de espaços e a desativação.
    pub async fn lock_warehouse<'e, E>(&self, executor: E, id: i64) -> Result<Option<Warehouse>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1 FOR UPDATE");
        let warehouse = sqlx::query_as::<_, Warehouse>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(warehouse)
    }

    /// Lock compartilhado: barra a desativação enquanto um contrato é aberto.
    pub async fn share_lock_warehouse<'e, E>(&self, executor: E, id: i64) -> Result<Option<Warehouse>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1 FOR SHARE");
        let warehouse = sqlx::query_as::<_, Warehouse>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(warehouse)
    }

    // Listagens só leem: usam a pool principal.
    pub async fn list_warehouses(&self, filter: &WarehouseFilter) -> Result<Vec<Warehouse>, AppError> {
        let sql = format!(
            r#"
            SELECT {WAREHOUSE_COLUMNS} FROM warehouses
            WHERE ($1::text IS NULL OR upper(country) = upper($1))
              AND ($2::text IS NULL OR lower(city) = lower($2))
              AND ($3::warehouse_state IS NULL OR state = $3)
              AND ($4::numeric IS NULL OR total_area >= $4)
              AND ($5::numeric IS NULL OR height >= $5)
            ORDER BY id
            LIMIT $6 OFFSET $7
            "#
        );
        let warehouses = sqlx::query_as::<_, Warehouse>(&sql)
            .bind(&filter.country)
            .bind(&filter.city)
            .bind(filter.state)
            .bind(filter.min_area)
            .bind(filter.min_height)
            .bind(PAGE_SIZE)
            .bind(offset(filter.page))
            .fetch_all(&self.pool)
            .await?;
        Ok(warehouses)
    }

    pub async fn update_warehouse_state<'e, E>(
        &self,
        executor: E,
        id: i64,
        state: WarehouseState,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE warehouses SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(state)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Área já dividida em espaços (inativos não contam).
    pub async fn partitioned_area<'e, E>(&self, executor: E, warehouse_id: i64) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let area: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_area), 0) FROM spaces
             WHERE warehouse_id = $1 AND state <> 'INACTIVE'",
        )
        .bind(warehouse_id)
        .fetch_one(executor)
        .await?;
        Ok(area)
    }

    // ---
    // Espaços
    // ---

    pub async fn create_space<'e, E>(
        &self,
        executor: E,
        warehouse_id: i64,
        total_area: Decimal,
        height: Decimal,
    ) -> Result<Space, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO spaces (warehouse_id, total_area, available_area, height)
            VALUES ($1, $2, $2, $3)
            RETURNING {SPACE_COLUMNS}
            "#
        );
        let space = sqlx::query_as::<_, Space>(&sql)
            .bind(warehouse_id)
            .bind(total_area)
            .bind(height)
            .fetch_one(executor)
            .await?;
        Ok(space)
    }

    pub async fn find_space<'e, E>(&self, executor: E, id: i64) -> Result<Option<Space>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1");
        let space = sqlx::query_as::<_, Space>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(space)
    }

    /// Primeiro lock de toda operação que mexe em capacidade.
    pub async fn lock_space<'e, E>(&self, executor: E, id: i64) -> Result<Option<Space>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1 FOR UPDATE");
        let space = sqlx::query_as::<_, Space>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(space)
    }

    pub async fn list_free_spaces(&self, warehouse_id: i64, page: u32) -> Result<Vec<Space>, AppError> {
        let sql = format!(
            r#"
            SELECT {SPACE_COLUMNS} FROM spaces
            WHERE warehouse_id = $1 AND state = 'FREE' AND contract_id IS NULL
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        );
        let spaces = sqlx::query_as::<_, Space>(&sql)
            .bind(warehouse_id)
            .bind(PAGE_SIZE)
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(spaces)
    }

    /// Grava área, estado e contrato depois de uma transição.
    pub async fn save_space<'e, E>(&self, executor: E, space: &Space) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE spaces SET available_area = $2, state = $3, contract_id = $4 WHERE id = $1",
        )
        .bind(space.id)
        .bind(space.available_area)
        .bind(space.state)
        .bind(space.contract_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Espaços do armazém presos a contratos não-terminais.
    pub async fn count_open_contracts<'e, E>(&self, executor: E, warehouse_id: i64) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM contracts c
            JOIN spaces s ON s.id = c.space_id
            WHERE s.warehouse_id = $1
              AND c.state IN ('PENDING_VERIFICATION', 'VERIFIED_BY_CLIENT', 'ACTIVE')
            "#,
        )
        .bind(warehouse_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }
}
