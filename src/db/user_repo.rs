// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        db_utils::RowLock,
        error::AppError,
        pagination::{offset, PAGE_SIZE},
    },
    models::auth::{AccountState, ClientFilter, NewUser, PasswordResetCode, Role, User},
};

const USER_COLUMNS: &str = r#"
    id, email, password_hash, name, phone, phone_country, secondary_phone,
    role, account_state, client_kind, warehouse_id, created_at
"#;

// Validade do código de redefinição de senha
const RESET_CODE_TTL_MINUTES: i32 = 30;

fn lock_user_sql(mode: RowLock) -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 {}", mode.clause())
}

/// Papel e estado exigidos de um participante.
fn ensure_active_role(user: Option<User>, id: i64, role: Role) -> Result<User, AppError> {
    let user = user.ok_or(AppError::UserNotFound)?;
    if user.role != role {
        return Err(AppError::InvalidParticipant(id));
    }
    if !user.is_active() {
        return Err(AppError::AccountNotActive);
    }
    Ok(user)
}

// E-mail duplicado tem mensagem própria
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_email_key") => AppError::EmailAlreadyExists,
                Some(other) => AppError::UniqueConstraintViolation(other.to_string()),
                None => AppError::UniqueConstraintViolation("users".into()),
            };
        }
    }
    e.into()
}

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail (login usa a pool principal)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: i64) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(user)
    }

    /// Destinatário de um aviso por e-mail; falha de leitura só vai para o log.
    pub async fn email_for_notice(&self, user_id: i64) -> Option<String> {
        match self.find_by_id(&self.pool, user_id).await {
            Ok(user) => user.map(|u| u.email),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Falha ao buscar destinatário do e-mail");
                None
            }
        }
    }

    /// Carrega o usuário exigindo conta ativa e o papel esperado.
    pub async fn find_active_with_role<'e, E>(
        &self,
        executor: E,
        id: i64,
        role: Role,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = self.find_by_id(executor, id).await?;
        ensure_active_role(user, id, role)
    }

    /// Trava a linha do usuário no modo pedido.
    pub async fn lock_user<'e, E>(&self, executor: E, id: i64, mode: RowLock) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(&lock_user_sql(mode))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(user)
    }

    /// Como `find_active_with_role`, mas segura a linha até o fim da transação.
    pub async fn lock_active_with_role<'e, E>(
        &self,
        executor: E,
        id: i64,
        role: Role,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = self.lock_user(executor, id, RowLock::Share).await?;
        ensure_active_role(user, id, role)
    }

    // Cria um novo usuário, com tratamento de erro específico para e-mails duplicados.
    pub async fn create_user<'e, E>(&self, executor: E, new_user: &NewUser) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (
                email, password_hash, name, phone, phone_country, secondary_phone,
                role, client_kind, warehouse_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.name)
            .bind(&new_user.phone)
            .bind(&new_user.phone_country)
            .bind(&new_user.secondary_phone)
            .bind(new_user.role)
            .bind(new_user.client_kind)
            .bind(new_user.warehouse_id)
            .fetch_one(executor)
            .await
            .map_err(map_unique_violation)
    }

    pub async fn update_profile<'e, E>(
        &self,
        executor: E,
        id: i64,
        name: &str,
        phone: &str,
        secondary_phone: Option<&str>,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE users SET name = $2, phone = $3, secondary_phone = $4
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(phone)
            .bind(secondary_phone)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Troca e-mail e hash de senha de uma vez.
    pub async fn update_credentials<'e, E>(
        &self,
        executor: E,
        id: i64,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE users SET email = $2, password_hash = $3
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .fetch_optional(executor)
            .await
            .map_err(map_unique_violation)?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn set_warehouse<'e, E>(&self, executor: E, id: i64, warehouse_id: i64) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("UPDATE users SET warehouse_id = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(warehouse_id)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    // Listagem do RH: só leitura, pool principal.
    pub async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<User>, AppError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE role = 'CLIENT'
              AND ($1::text IS NULL OR upper(phone_country) = upper($1))
              AND ($2::client_kind IS NULL OR client_kind = $2)
              AND ($3::account_state IS NULL OR account_state = $3)
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#
        );
        let clients = sqlx::query_as::<_, User>(&sql)
            .bind(filter.country.as_deref())
            .bind(filter.client_kind)
            .bind(filter.account_state)
            .bind(PAGE_SIZE)
            .bind(offset(filter.page))
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    // ---
    // Códigos de redefinição de senha
    // ---

    /// Gera (ou substitui) o código do usuário e devolve o valor em claro.
    pub async fn issue_reset_code<'e, E>(&self, executor: E, user_id: i64) -> Result<PasswordResetCode, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let code = sqlx::query_as::<_, PasswordResetCode>(
            r#"
            INSERT INTO password_reset_codes (user_id, code, expires_at)
            VALUES ($1, upper(substr(md5(random()::text || clock_timestamp()::text), 1, 6)),
                    now() + make_interval(mins => $2))
            ON CONFLICT (user_id) DO UPDATE
                SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            RETURNING user_id, code, expires_at
            "#,
        )
        .bind(user_id)
        .bind(RESET_CODE_TTL_MINUTES)
        .fetch_one(executor)
        .await?;
        Ok(code)
    }

    pub async fn find_reset_code<'e, E>(&self, executor: E, user_id: i64) -> Result<Option<PasswordResetCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let code = sqlx::query_as::<_, PasswordResetCode>(
            "SELECT user_id, code, expires_at FROM password_reset_codes WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(code)
    }

    pub async fn delete_reset_code<'e, E>(&self, executor: E, user_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM password_reset_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_account_state<'e, E>(
        &self,
        executor: E,
        id: i64,
        state: AccountState,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE users SET account_state = $2 WHERE id = $1")
            .bind(id)
            .bind(state)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    /// Sorteia um agente de vendas ativo para atender um chat.
    pub async fn pick_random_agent<'e, E>(&self, executor: E) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE role = 'SALES_AGENT' AND account_state = 'ACTIVE'
             ORDER BY random() LIMIT 1"
        );
        let agent = sqlx::query_as::<_, User>(&sql).fetch_optional(executor).await?;
        Ok(agent)
    }

    pub async fn exists_with_role<'e, E>(&self, executor: E, role: Role) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE role = $1 AND account_state = 'ACTIVE')",
        )
        .bind(role)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_user(role: Role, state: AccountState) -> User {
        User {
            id: 5,
            email: "c@storeit.co".into(),
            password_hash: String::new(),
            name: "Laura".into(),
            phone: "+573001234567".into(),
            phone_country: "CO".into(),
            secondary_phone: None,
            role,
            account_state: state,
            client_kind: None,
            warehouse_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failed_recipient_lookup_yields_no_address() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(300))
            .connect_lazy("postgres://storeit@127.0.0.1:1/storeit_test")
            .expect("url válida");
        let repo = UserRepository::new(pool);
        assert_eq!(repo.email_for_notice(1).await, None);
    }

    #[test]
    fn test_participant_locks_use_requested_mode() {
        assert!(lock_user_sql(RowLock::Share).trim_end().ends_with("FOR SHARE"));
        assert!(lock_user_sql(RowLock::Update).trim_end().ends_with("FOR UPDATE"));
    }

    #[test]
    fn test_deleted_client_cannot_take_part() {
        let user = make_user(Role::Client, AccountState::Deleted);
        let err = ensure_active_role(Some(user), 5, Role::Client).unwrap_err();
        assert!(matches!(err, AppError::AccountNotActive));
    }

    #[test]
    fn test_wrong_role_is_an_invalid_participant() {
        let user = make_user(Role::SalesAgent, AccountState::Active);
        let err = ensure_active_role(Some(user), 5, Role::Client).unwrap_err();
        assert!(matches!(err, AppError::InvalidParticipant(5)));
        assert!(matches!(ensure_active_role(None, 5, Role::Client), Err(AppError::UserNotFound)));
    }
}
