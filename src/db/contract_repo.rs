// src/db/contract_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        error::AppError,
        pagination::{offset, PAGE_SIZE},
    },
    models::contract::{Contract, ContractFilter, ContractState, ContractTerms},
};

const CONTRACT_COLUMNS: &str = r#"
    id, space_id, client_id, agent_id, start_date, end_date, value, description,
    state, client_signed_at, agent_signed_at, closed_at, created_at
"#;

/// Lista SQL dos estados que seguram o espaço, ex.: `('PENDING_VERIFICATION', ...)`.
fn open_states() -> String {
    let labels: Vec<String> = ContractState::ALL
        .into_iter()
        .filter(|state| state.is_open())
        .map(|state| format!("'{}'", state.as_sql()))
        .collect();
    format!("({})", labels.join(", "))
}

/// Lado do contrato pelo qual a listagem é feita.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractParty {
    Client,
    Agent,
}

impl ContractParty {
    fn column(self) -> &'static str {
        match self {
            ContractParty::Client => "client_id",
            ContractParty::Agent => "agent_id",
        }
    }
}

#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_contract<'e, E>(
        &self,
        executor: E,
        space_id: i64,
        client_id: i64,
        agent_id: i64,
        terms: &ContractTerms,
    ) -> Result<Contract, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO contracts (space_id, client_id, agent_id, start_date, end_date, value, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CONTRACT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Contract>(&sql)
            .bind(space_id)
            .bind(client_id)
            .bind(agent_id)
            .bind(terms.start_date)
            .bind(terms.end_date)
            .bind(terms.value)
            .bind(&terms.description)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation()
                        && db_err.constraint() == Some("idx_contracts_open_per_space")
                    {
                        return AppError::SpaceAlreadyContracted(space_id);
                    }
                }
                e.into()
            })
    }

    pub async fn find_contract<'e, E>(&self, executor: E, id: i64) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1");
        let contract = sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    /// Sempre chamado depois do lock do espaço (ordem: espaço -> contrato).
    pub async fn lock_contract<'e, E>(&self, executor: E, id: i64) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1 FOR UPDATE");
        let contract = sqlx::query_as::<_, Contract>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    /// Contrato não-terminal do espaço, travado.
    pub async fn lock_open_for_space<'e, E>(
        &self,
        executor: E,
        space_id: i64,
    ) -> Result<Option<Contract>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts
             WHERE space_id = $1 AND state IN {open}
             FOR UPDATE",
            open = open_states()
        );
        let contract = sqlx::query_as::<_, Contract>(&sql)
            .bind(space_id)
            .fetch_optional(executor)
            .await?;
        Ok(contract)
    }

    /// Grava estado, termos e carimbos de assinatura/encerramento.
    pub async fn save_contract<'e, E>(&self, executor: E, contract: &Contract) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE contracts
            SET state = $2, start_date = $3, end_date = $4, value = $5, description = $6,
                client_signed_at = $7, agent_signed_at = $8, closed_at = $9
            WHERE id = $1
            "#,
        )
        .bind(contract.id)
        .bind(contract.state)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.value)
        .bind(&contract.description)
        .bind(contract.client_signed_at)
        .bind(contract.agent_signed_at)
        .bind(contract.closed_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_for_party(
        &self,
        party: ContractParty,
        user_id: i64,
        filter: &ContractFilter,
    ) -> Result<Vec<Contract>, AppError> {
        let sql = format!(
            r#"
            SELECT {CONTRACT_COLUMNS} FROM contracts
            WHERE {column} = $1
              AND ($2::date IS NULL OR start_date >= $2)
              AND ($3::contract_state IS NULL OR state = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            column = party.column()
        );
        let contracts = sqlx::query_as::<_, Contract>(&sql)
            .bind(user_id)
            .bind(filter.start_date)
            .bind(filter.state)
            .bind(PAGE_SIZE)
            .bind(offset(filter.page))
            .fetch_all(&self.pool)
            .await?;
        Ok(contracts)
    }

    pub async fn count_open_for_party<'e, E>(
        &self,
        executor: E,
        party: ContractParty,
        user_id: i64,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM contracts WHERE {} = $1 AND state IN {}",
            party.column(),
            open_states()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    // ---
    // Varredura periódica
    // ---

    /// Pendentes nunca verificados com início antes de `cutoff`.
    pub async fn stale_pending_ids(&self, cutoff: NaiveDate) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM contracts
            WHERE state = 'PENDING_VERIFICATION'
              AND client_signed_at IS NULL
              AND start_date < $1
            ORDER BY id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Ativos cuja data final já passou.
    pub async fn expired_active_ids(&self, today: NaiveDate) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM contracts WHERE state = 'ACTIVE' AND end_date < $1 ORDER BY id",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
