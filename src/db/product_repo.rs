// src/db/product_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        error::AppError,
        pagination::{offset, PAGE_SIZE},
    },
    lifecycle::movement_ledger::MovementDraft,
    models::product::{Movement, NewProduct, Product, ProductState},
};

const PRODUCT_COLUMNS: &str =
    "id, client_id, space_id, name, description, area, height, kind, state, created_at";
const MOVEMENT_COLUMNS: &str =
    "id, product_id, space_id, staff_id, kind, area, detail, occurred_at";

#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Produtos
    // ---

    pub async fn insert_product<'e, E>(
        &self,
        executor: E,
        space_id: i64,
        new: &NewProduct,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO products (client_id, space_id, name, description, area, height, kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(new.client_id)
            .bind(space_id)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.area)
            .bind(new.height)
            .bind(new.kind)
            .fetch_one(executor)
            .await?;
        Ok(product)
    }

    pub async fn find_product<'e, E>(&self, executor: E, id: i64) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    /// Último lock da cadeia espaço -> contrato -> produto.
    pub async fn lock_product<'e, E>(&self, executor: E, id: i64) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    pub async fn update_product_state<'e, E>(
        &self,
        executor: E,
        id: i64,
        state: ProductState,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE products SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(state)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Produtos do cliente ainda guardados num espaço.
    pub async fn count_stored_in_space<'e, E>(
        &self,
        executor: E,
        client_id: i64,
        space_id: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products
             WHERE client_id = $1 AND space_id = $2 AND state = 'IN_WAREHOUSE'",
        )
        .bind(client_id)
        .bind(space_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn count_stored_for_client<'e, E>(&self, executor: E, client_id: i64) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE client_id = $1 AND state = 'IN_WAREHOUSE'",
        )
        .bind(client_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn list_stored_for_client(&self, client_id: i64, page: u32) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE client_id = $1 AND state = 'IN_WAREHOUSE'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(client_id)
            .bind(PAGE_SIZE)
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Produtos guardados nos espaços de um armazém (visão do pessoal).
    pub async fn list_stored_in_warehouse(&self, warehouse_id: i64, page: u32) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            r#"
            SELECT p.{cols} FROM products p
            JOIN spaces s ON s.id = p.space_id
            WHERE s.warehouse_id = $1 AND p.state = 'IN_WAREHOUSE'
            ORDER BY p.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            cols = PRODUCT_COLUMNS.replace(", ", ", p.")
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(warehouse_id)
            .bind(PAGE_SIZE)
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    // ---
    // Livro de movimentos (só INSERT)
    // ---

    pub async fn insert_movement<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        draft: &MovementDraft,
    ) -> Result<Movement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO movements (product_id, space_id, staff_id, kind, area, detail, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        );
        let movement = sqlx::query_as::<_, Movement>(&sql)
            .bind(product_id)
            .bind(draft.space_id)
            .bind(draft.staff_id)
            .bind(draft.kind)
            .bind(draft.area)
            .bind(&draft.detail)
            .bind(draft.occurred_at)
            .fetch_one(executor)
            .await?;
        Ok(movement)
    }

    pub async fn list_movements_for_product(&self, product_id: i64) -> Result<Vec<Movement>, AppError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE product_id = $1 ORDER BY occurred_at, id"
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    pub async fn list_movements_for_space(&self, space_id: i64, page: u32) -> Result<Vec<Movement>, AppError> {
        let sql = format!(
            r#"
            SELECT {MOVEMENT_COLUMNS} FROM movements
            WHERE space_id = $1
            ORDER BY occurred_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(space_id)
            .bind(PAGE_SIZE)
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Histórico completo do espaço em ordem cronológica, para replay.
    pub async fn space_ledger<'e, E>(&self, executor: E, space_id: i64) -> Result<Vec<Movement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE space_id = $1 ORDER BY occurred_at, id"
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(space_id)
            .fetch_all(executor)
            .await?;
        Ok(movements)
    }
}
