// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;

use crate::{
    common::{
        db_utils::{begin_locked, LockSettings, RowLock},
        error::AppError,
        phone::normalize_phone,
        retry::retry_on_conflict,
    },
    db::{contract_repo::ContractParty, ContractRepository, ProductRepository, UserRepository, WarehouseRepository},
    models::auth::{
        AccountState, Claims, ClientFilter, CreateStaffPayload, NewUser, RegisterClientPayload, Role,
        UpdateCredentialsPayload, UpdateProfilePayload, User,
    },
    services::notification_service::{self as mail, NotificationService},
};

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    warehouse_repo: WarehouseRepository,
    contract_repo: ContractRepository,
    product_repo: ProductRepository,
    notifier: NotificationService,
    jwt_secret: String,
    pool: PgPool,
    lock: LockSettings,
    max_retries: u32,
}

async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

async fn password_matches(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password_clone = password.to_owned();
    let password_hash_clone = password_hash.to_owned();

    // Executa a verificação em um thread separado
    let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(is_valid)
}

/// Só contas removidas voltam a ficar ativas.
pub fn ensure_reactivatable(user: &User) -> Result<(), AppError> {
    if user.is_active() {
        return Err(AppError::AccountAlreadyActive);
    }
    Ok(())
}

/// Campo opcional no payload que a operação exige.
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, AppError> {
    value.ok_or(AppError::MissingField(field))
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: UserRepository,
        warehouse_repo: WarehouseRepository,
        contract_repo: ContractRepository,
        product_repo: ProductRepository,
        notifier: NotificationService,
        jwt_secret: String,
        pool: PgPool,
        lock: LockSettings,
        max_retries: u32,
    ) -> Self {
        Self {
            user_repo,
            warehouse_repo,
            contract_repo,
            product_repo,
            notifier,
            jwt_secret,
            pool,
            lock,
            max_retries,
        }
    }

    /// Auto-registro de cliente. Telefones já validados no handler.
    pub async fn register_client(&self, payload: &RegisterClientPayload) -> Result<String, AppError> {
        let password_hash = hash_password(&payload.password).await?;

        let new_user = NewUser {
            email: payload.email.trim().to_lowercase(),
            password_hash,
            name: payload.name.trim().to_string(),
            phone: normalize_phone(&payload.phone_country, &payload.phone),
            phone_country: payload.phone_country.to_uppercase(),
            secondary_phone: payload
                .secondary_phone
                .as_deref()
                .map(|p| normalize_phone(&payload.phone_country, p)),
            role: Role::Client,
            client_kind: Some(payload.client_kind),
            warehouse_id: None,
        };

        let user = self.user_repo.create_user(&self.pool, &new_user).await?;
        tracing::info!(user_id = user.id, "Cliente registrado");
        self.create_token(&user)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !password_matches(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(AppError::AccountNotActive);
        }

        self.create_token(&user)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.decode_token(token)?;
        self.user_repo
            .find_by_id(&self.pool, claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;
        Ok(token_data.claims)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(TOKEN_TTL_DAYS);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    // ---
    // Funcionários (RH)
    // ---

    pub async fn create_staff(&self, payload: &CreateStaffPayload) -> Result<User, AppError> {
        // Só o pessoal de armazém fica preso a um armazém
        let warehouse_id = match payload.role {
            Role::WarehouseStaff => Some(require(payload.warehouse_id, "warehouseId")?),
            _ => None,
        };
        let password_hash = hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;

        if let Some(warehouse_id) = warehouse_id {
            let warehouse = self
                .warehouse_repo
                .find_warehouse(&mut *tx, warehouse_id)
                .await?
                .ok_or(AppError::WarehouseNotFound(warehouse_id))?;
            if !warehouse.is_open() {
                return Err(AppError::WarehouseNotActive(warehouse_id));
            }
        }

        let new_user = NewUser {
            email: payload.email.trim().to_lowercase(),
            password_hash,
            name: payload.name.trim().to_string(),
            phone: normalize_phone(&payload.phone_country, &payload.phone),
            phone_country: payload.phone_country.to_uppercase(),
            secondary_phone: None,
            role: payload.role,
            client_kind: None,
            warehouse_id,
        };
        let user = self.user_repo.create_user(&mut *tx, &new_user).await?;

        tx.commit().await?;

        tracing::info!(user_id = user.id, role = ?user.role, "Funcionário cadastrado");
        Ok(user)
    }

    /// Baixa lógica de funcionário; agentes com contratos em aberto ficam.
    pub async fn delete_staff(&self, staff_id: i64) -> Result<(), AppError> {
        retry_on_conflict(self.max_retries, || self.delete_staff_once(staff_id)).await?;
        tracing::info!(user_id = staff_id, "Funcionário desativado");
        Ok(())
    }

    async fn delete_staff_once(&self, staff_id: i64) -> Result<(), AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // Exclusivo: barra contratos novos com este agente até o commit
        let user = self
            .user_repo
            .lock_user(&mut *tx, staff_id, RowLock::Update)
            .await?
            .ok_or(AppError::UserNotFound)?;
        if user.role == Role::Client {
            return Err(AppError::InvalidParticipant(staff_id));
        }

        if user.role == Role::SalesAgent {
            let open = self
                .contract_repo
                .count_open_for_party(&mut *tx, ContractParty::Agent, staff_id)
                .await?;
            if open > 0 {
                return Err(AppError::AgentHasOpenContracts);
            }
        }

        self.user_repo
            .set_account_state(&mut *tx, staff_id, AccountState::Deleted)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Baixa lógica da própria conta do cliente.
    pub async fn delete_client(&self, client_id: i64) -> Result<(), AppError> {
        retry_on_conflict(self.max_retries, || self.delete_client_once(client_id)).await?;
        tracing::info!(user_id = client_id, "Conta de cliente removida");
        Ok(())
    }

    async fn delete_client_once(&self, client_id: i64) -> Result<(), AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // Exclusivo: a abertura de contrato segura o cliente em modo compartilhado
        self.user_repo
            .lock_user(&mut *tx, client_id, RowLock::Update)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let open = self
            .contract_repo
            .count_open_for_party(&mut *tx, ContractParty::Client, client_id)
            .await?;
        if open > 0 {
            return Err(AppError::ClientHasOpenContracts);
        }

        let stored = self.product_repo.count_stored_for_client(&mut *tx, client_id).await?;
        if stored > 0 {
            return Err(AppError::ClientHasStoredProducts);
        }

        self.user_repo
            .set_account_state(&mut *tx, client_id, AccountState::Deleted)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---
    // Reativação de contas
    // ---

    /// O cliente prova quem é com a senha e volta a ficar ativo.
    pub async fn reactivate_client(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        if !password_matches(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }
        if user.role != Role::Client {
            return Err(AppError::InvalidParticipant(user.id));
        }

        let user = self.reactivate(user.id).await?;
        tracing::info!(user_id = user.id, "Conta de cliente reativada");
        self.create_token(&user)
    }

    /// RH devolve um funcionário removido ao quadro.
    pub async fn reactivate_staff(&self, staff_id: i64) -> Result<User, AppError> {
        let user = self
            .user_repo
            .find_by_id(&self.pool, staff_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        if user.role == Role::Client {
            return Err(AppError::InvalidParticipant(staff_id));
        }

        let user = self.reactivate(staff_id).await?;
        tracing::info!(user_id = staff_id, role = ?user.role, "Funcionário reativado");
        Ok(user)
    }

    async fn reactivate(&self, user_id: i64) -> Result<User, AppError> {
        let user = retry_on_conflict(self.max_retries, || self.reactivate_once(user_id)).await?;
        self.notifier.notify(mail::account_reactivated(&user.email, &user.name));
        Ok(user)
    }

    async fn reactivate_once(&self, user_id: i64) -> Result<User, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        let mut user = self
            .user_repo
            .lock_user(&mut *tx, user_id, RowLock::Update)
            .await?
            .ok_or(AppError::UserNotFound)?;
        ensure_reactivatable(&user)?;

        self.user_repo
            .set_account_state(&mut *tx, user_id, AccountState::Active)
            .await?;
        tx.commit().await?;

        user.account_state = AccountState::Active;
        Ok(user)
    }

    // ---
    // Perfil do cliente
    // ---

    /// Telefones já validados no handler contra o país do cadastro.
    pub async fn update_profile(&self, client: &User, payload: &UpdateProfilePayload) -> Result<User, AppError> {
        let phone = normalize_phone(&client.phone_country, &payload.phone);
        let secondary_phone = payload
            .secondary_phone
            .as_deref()
            .map(|p| normalize_phone(&client.phone_country, p));

        let user = self
            .user_repo
            .update_profile(
                &self.pool,
                client.id,
                payload.name.trim(),
                &phone,
                secondary_phone.as_deref(),
            )
            .await?;

        tracing::info!(user_id = client.id, "Perfil de cliente atualizado");
        Ok(user)
    }

    /// Troca e-mail e/ou senha mediante a senha atual.
    pub async fn update_credentials(
        &self,
        client: &User,
        payload: &UpdateCredentialsPayload,
    ) -> Result<User, AppError> {
        if !password_matches(&payload.current_password, &client.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let email = match &payload.new_email {
            Some(email) => email.trim().to_lowercase(),
            None => client.email.clone(),
        };
        let password_hash = match &payload.new_password {
            Some(new_password) if new_password == &payload.current_password => {
                return Err(AppError::PasswordReused);
            }
            Some(new_password) => hash_password(new_password).await?,
            None => client.password_hash.clone(),
        };

        if email == client.email && payload.new_password.is_none() {
            return Ok(client.clone());
        }

        let user = self
            .user_repo
            .update_credentials(&self.pool, client.id, &email, &password_hash)
            .await?;

        // Avisa os dois endereços quando o e-mail muda
        self.notifier.notify(mail::credentials_changed(&user.email, &user.name));
        if user.email != client.email {
            self.notifier.notify(mail::credentials_changed(&client.email, &user.name));
        }

        tracing::info!(user_id = client.id, "Credenciais do cliente atualizadas");
        Ok(user)
    }

    pub async fn list_clients(&self, filter: &ClientFilter) -> Result<Vec<User>, AppError> {
        self.user_repo.list_clients(filter).await
    }

    // ---
    // Redefinição de senha
    // ---

    /// Envia um código por e-mail. E-mail desconhecido não gera erro.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let user = match self.user_repo.find_by_email(email.trim()).await? {
            Some(user) if user.is_active() => user,
            _ => {
                tracing::info!("Pedido de redefinição para e-mail sem conta ativa");
                return Ok(());
            }
        };

        let code = self.user_repo.issue_reset_code(&self.pool, user.id).await?;
        self.notifier
            .notify(mail::password_reset_code(&user.email, &code.code, code.expires_at));

        tracing::info!(user_id = user.id, "Código de redefinição de senha enviado");
        Ok(())
    }

    pub async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::ResetCodeInvalid)?;
        let stored = self
            .user_repo
            .find_reset_code(&self.pool, user.id)
            .await?
            .ok_or(AppError::ResetCodeInvalid)?;
        if !stored.accepts(code, Utc::now()) {
            return Err(AppError::ResetCodeInvalid);
        }
        Ok(())
    }

    /// Troca a senha com um código válido; o código é consumido.
    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<(), AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::ResetCodeInvalid)?;
        let password_hash = hash_password(new_password).await?;

        let mut tx = begin_locked(&self.pool, self.lock).await?;

        let user = self
            .user_repo
            .lock_user(&mut *tx, user.id, RowLock::Update)
            .await?
            .ok_or(AppError::ResetCodeInvalid)?;
        let stored = self
            .user_repo
            .find_reset_code(&mut *tx, user.id)
            .await?
            .ok_or(AppError::ResetCodeInvalid)?;
        if !stored.accepts(code, Utc::now()) {
            return Err(AppError::ResetCodeInvalid);
        }

        self.user_repo
            .update_credentials(&mut *tx, user.id, &user.email, &password_hash)
            .await?;
        self.user_repo.delete_reset_code(&mut *tx, user.id).await?;
        tx.commit().await?;

        self.notifier.notify(mail::credentials_changed(&user.email, &user.name));
        tracing::info!(user_id = user.id, "Senha redefinida");
        Ok(())
    }

    // ---
    // Transferência de pessoal de armazém
    // ---

    pub async fn transfer_staff(&self, staff_id: i64, warehouse_id: Option<i64>) -> Result<User, AppError> {
        let warehouse_id = require(warehouse_id, "warehouseId")?;
        let (user, moved) =
            retry_on_conflict(self.max_retries, || self.transfer_staff_once(staff_id, warehouse_id)).await?;

        if moved {
            self.notifier
                .notify(mail::staff_transferred(&user.email, &user.name, warehouse_id));
            tracing::info!(user_id = staff_id, warehouse_id, "Funcionário transferido de armazém");
        } else {
            tracing::warn!(user_id = staff_id, warehouse_id, "Funcionário já pertence ao armazém");
        }
        Ok(user)
    }

    async fn transfer_staff_once(&self, staff_id: i64, warehouse_id: i64) -> Result<(User, bool), AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // Armazém antes do usuário, mesma ordem da abertura de contrato
        let warehouse = self
            .warehouse_repo
            .share_lock_warehouse(&mut *tx, warehouse_id)
            .await?
            .ok_or(AppError::WarehouseNotFound(warehouse_id))?;
        if !warehouse.is_open() {
            return Err(AppError::WarehouseNotActive(warehouse_id));
        }

        let user = self
            .user_repo
            .lock_user(&mut *tx, staff_id, RowLock::Update)
            .await?
            .ok_or(AppError::UserNotFound)?;
        if user.role != Role::WarehouseStaff {
            return Err(AppError::InvalidParticipant(staff_id));
        }
        if !user.is_active() {
            return Err(AppError::AccountNotActive);
        }
        if user.warehouse_id == Some(warehouse_id) {
            return Ok((user, false));
        }

        let user = self.user_repo.set_warehouse(&mut *tx, staff_id, warehouse_id).await?;
        tx.commit().await?;
        Ok((user, true))
    }

    /// Cria a conta inicial de RH se ainda não houver nenhuma ativa.
    pub async fn ensure_bootstrap_hr(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.user_repo.exists_with_role(&self.pool, Role::HumanResources).await? {
            return Ok(());
        }

        let new_user = NewUser {
            email: email.trim().to_lowercase(),
            password_hash: hash_password(password).await?,
            name: "Recursos Humanos".to_string(),
            phone: String::new(),
            phone_country: "CO".to_string(),
            secondary_phone: None,
            role: Role::HumanResources,
            client_kind: None,
            warehouse_id: None,
        };
        match self.user_repo.create_user(&self.pool, &new_user).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Conta inicial de RH criada");
                Ok(())
            }
            // Outra instância criou primeiro
            Err(AppError::EmailAlreadyExists) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn make_service(secret: &str) -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/storeit_test")
            .expect("url válida");
        AuthService::new(
            UserRepository::new(pool.clone()),
            WarehouseRepository::new(pool.clone()),
            ContractRepository::new(pool.clone()),
            ProductRepository::new(pool.clone()),
            NotificationService::new(std::sync::Arc::new(
                crate::services::notification_service::LogMailer,
            )),
            secret.to_string(),
            pool,
            LockSettings { lock_timeout_ms: 100, statement_timeout_ms: 100 },
            0,
        )
    }

    fn make_user(id: i64, role: Role) -> User {
        User {
            id,
            email: "agente@storeit.co".into(),
            password_hash: String::new(),
            name: "Agente".into(),
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

    #[tokio::test]
    async fn test_token_round_trip_keeps_subject_and_role() {
        let service = make_service("segredo");
        let token = service.create_token(&make_user(42, Role::SalesAgent)).unwrap();

        let claims = service.decode_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::SalesAgent);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let token = make_service("um").create_token(&make_user(1, Role::Client)).unwrap();
        let err = make_service("outro").decode_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let err = make_service("segredo").decode_token("não-é-um-jwt").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let hashed = hash_password("senha-forte").await.unwrap();
        assert!(verify("senha-forte", &hashed).unwrap());
        assert!(!verify("outra", &hashed).unwrap());
    }

    #[test]
    fn test_only_deleted_accounts_are_reactivated() {
        let mut user = make_user(3, Role::WarehouseStaff);
        assert!(matches!(ensure_reactivatable(&user), Err(AppError::AccountAlreadyActive)));

        user.account_state = AccountState::Deleted;
        assert!(ensure_reactivatable(&user).is_ok());
    }

    #[test]
    fn test_absent_required_field_is_reported_by_name() {
        let err = require::<i64>(None, "warehouseId").unwrap_err();
        assert!(matches!(err, AppError::MissingField("warehouseId")));
        assert_eq!(require(Some(4), "warehouseId").unwrap(), 4);
    }

    #[tokio::test]
    async fn test_staff_without_warehouse_is_refused_before_touching_the_database() {
        let service = make_service("segredo");
        let payload: CreateStaffPayload = serde_json::from_value(serde_json::json!({
            "email": "bodega@storeit.co",
            "password": "segura123",
            "name": "Pedro",
            "phoneCountry": "CO",
            "phone": "3001234567",
            "role": "WAREHOUSE_STAFF"
        }))
        .unwrap();

        let err = service.create_staff(&payload).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("warehouseId")));
    }

    #[tokio::test]
    async fn test_transfer_without_warehouse_is_a_missing_field() {
        let err = make_service("segredo").transfer_staff(3, None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("warehouseId")));
    }

    #[tokio::test]
    async fn test_credentials_need_the_current_password() {
        let service = make_service("segredo");
        let mut client = make_user(8, Role::Client);
        client.password_hash = hash_password("senha-atual").await.unwrap();

        let payload = UpdateCredentialsPayload {
            current_password: "errada".into(),
            new_email: None,
            new_password: Some("nova-senha".into()),
        };
        let err = service.update_credentials(&client, &payload).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_new_password_must_differ_from_current() {
        let service = make_service("segredo");
        let mut client = make_user(8, Role::Client);
        client.password_hash = hash_password("senha-atual").await.unwrap();

        let payload = UpdateCredentialsPayload {
            current_password: "senha-atual".into(),
            new_email: None,
            new_password: Some("senha-atual".into()),
        };
        let err = service.update_credentials(&client, &payload).await.unwrap_err();
        assert!(matches!(err, AppError::PasswordReused));
    }

    #[tokio::test]
    async fn test_unchanged_credentials_return_the_same_user() {
        let service = make_service("segredo");
        let mut client = make_user(8, Role::Client);
        client.password_hash = hash_password("senha-atual").await.unwrap();

        let payload = UpdateCredentialsPayload {
            current_password: "senha-atual".into(),
            new_email: Some(" AGENTE@storeit.co ".into()),
            new_password: None,
        };
        let user = service.update_credentials(&client, &payload).await.unwrap();
        assert_eq!(user.email, client.email);
    }
}
