// src/common/db_utils.rs

use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;

/// Limites de espera aplicados a cada transação que trava linhas.
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    pub lock_timeout_ms: u64,
    pub statement_timeout_ms: u64,
}

/// Modo de lock nos SELECTs que checam uma linha antes de agir sobre outra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    // Leitor: convive com outros leitores, bloqueia quem altera
    Share,
    Update,
}

impl RowLock {
    pub fn clause(self) -> &'static str {
        match self {
            RowLock::Share => "FOR SHARE",
            RowLock::Update => "FOR UPDATE",
        }
    }
}

// ---
// Helper de transação: abre e define os timeouts (SET LOCAL)
// ---
/// Abre uma transação com `lock_timeout` e `statement_timeout` locais.
/// Estourar qualquer um deles vira `AppError::ConcurrentModification`.
pub(crate) async fn begin_locked(
    pool: &PgPool,
    settings: LockSettings,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // 1. Abre a transação
    let mut tx = pool.begin().await?;

    // 2. Espera máxima por um lock de linha
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", settings.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    // 3. Tempo máximo de cada comando
    sqlx::query("SELECT set_config('statement_timeout', $1, true)")
        .bind(format!("{}ms", settings.statement_timeout_ms))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
