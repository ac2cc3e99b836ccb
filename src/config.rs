// src/config.rs

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, sync::Arc, time::Duration};

use crate::{
    common::{db_utils::LockSettings, i18n::I18nStore},
    db::{ChatRepository, ContractRepository, ProductRepository, UserRepository, WarehouseRepository},
    services::{
        auth::AuthService,
        chat_service::ChatService,
        contract_service::ContractService,
        document_service::DocumentService,
        notification_service::NotificationService,
        product_service::ProductService,
        warehouse_service::WarehouseService,
    },
};

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub lock: LockSettings,
    pub conflict_max_retries: u32,
    pub sweep_interval_secs: u64,
    pub default_locale: String,
    pub fonts_dir: String,
    pub mail: MailSettings,
    pub bootstrap_hr: Option<(String, String)>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta as configurações a partir de uma fonte qualquer de variáveis.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} deve ser definida", key))
        };

        let bootstrap_hr = match (lookup("BOOTSTRAP_HR_EMAIL"), lookup("BOOTSTRAP_HR_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            db_acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?,
            lock: LockSettings {
                lock_timeout_ms: parse_or(&lookup, "LOCK_TIMEOUT_MS", 3000)?,
                statement_timeout_ms: parse_or(&lookup, "STATEMENT_TIMEOUT_MS", 5000)?,
            },
            conflict_max_retries: parse_or(&lookup, "CONFLICT_MAX_RETRIES", 3)?,
            sweep_interval_secs: positive_or(&lookup, "SWEEP_INTERVAL_SECS", 3600)?,
            default_locale: lookup("DEFAULT_LOCALE").unwrap_or_else(|| "es".to_string()),
            fonts_dir: lookup("FONTS_DIR").unwrap_or_else(|| "./fonts".to_string()),
            mail: MailSettings {
                relay_url: lookup("MAIL_RELAY_URL"),
                relay_token: lookup("MAIL_RELAY_TOKEN"),
                from: lookup("MAIL_FROM").unwrap_or_else(|| "no-reply@storeit.co".to_string()),
            },
            bootstrap_hr,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} inválida ('{}'): {}", key, raw, e)),
        None => Ok(default),
    }
}

// Intervalos de timer não podem ser zero
fn positive_or<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if value == 0 {
        anyhow::bail!("{} deve ser maior que zero", key);
    }
    Ok(value)
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub i18n_store: Arc<I18nStore>,
    pub auth_service: AuthService,
    pub warehouse_service: WarehouseService,
    pub contract_service: ContractService,
    pub product_service: ProductService,
    pub chat_service: ChatService,
    pub document_service: DocumentService,
}

// O extrator de idioma só precisa do catálogo
impl FromRef<AppState> for Arc<I18nStore> {
    fn from_ref(state: &AppState) -> Self {
        state.i18n_store.clone()
    }
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Settings::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(settings.db_acquire_timeout_secs))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::build(settings, db_pool)
    }

    // --- Monta o gráfico de dependências ---
    pub fn build(settings: Settings, db_pool: PgPool) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::embedded(&settings.default_locale)?);
        let notifier = NotificationService::from_settings(&settings.mail)?;

        let user_repo = UserRepository::new(db_pool.clone());
        let warehouse_repo = WarehouseRepository::new(db_pool.clone());
        let contract_repo = ContractRepository::new(db_pool.clone());
        let product_repo = ProductRepository::new(db_pool.clone());
        let chat_repo = ChatRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            warehouse_repo.clone(),
            contract_repo.clone(),
            product_repo.clone(),
            notifier.clone(),
            settings.jwt_secret.clone(),
            db_pool.clone(),
            settings.lock,
            settings.conflict_max_retries,
        );
        let warehouse_service = WarehouseService::new(
            warehouse_repo.clone(),
            product_repo.clone(),
            db_pool.clone(),
            settings.lock,
            settings.conflict_max_retries,
        );
        let contract_service = ContractService::new(
            contract_repo.clone(),
            warehouse_repo.clone(),
            user_repo.clone(),
            product_repo.clone(),
            notifier.clone(),
            db_pool.clone(),
            settings.lock,
            settings.conflict_max_retries,
        );
        let product_service = ProductService::new(
            product_repo,
            warehouse_repo.clone(),
            contract_repo.clone(),
            user_repo.clone(),
            notifier,
            db_pool.clone(),
            settings.lock,
            settings.conflict_max_retries,
        );
        let chat_service = ChatService::new(chat_repo, user_repo.clone(), db_pool.clone());
        let document_service = DocumentService::new(
            contract_repo,
            warehouse_repo,
            user_repo,
            db_pool.clone(),
            settings.fonts_dir.clone(),
        );

        Ok(Self {
            db_pool,
            settings: Arc::new(settings),
            i18n_store,
            auth_service,
            warehouse_service,
            contract_service,
            product_service,
            chat_service,
            document_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_applied() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/storeit"),
            ("JWT_SECRET", "segredo"),
        ]))
        .unwrap();

        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert_eq!(settings.db_max_connections, 5);
        assert_eq!(settings.lock.lock_timeout_ms, 3000);
        assert_eq!(settings.conflict_max_retries, 3);
        assert_eq!(settings.sweep_interval_secs, 3600);
        assert_eq!(settings.default_locale, "es");
        assert!(settings.mail.relay_url.is_none());
        assert!(settings.bootstrap_hr.is_none());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = Settings::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("LOCK_TIMEOUT_MS", "rápido"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LOCK_TIMEOUT_MS"));
    }

    #[test]
    fn test_bootstrap_requires_both_values() {
        let only_email = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("BOOTSTRAP_HR_EMAIL", "rh@storeit.co"),
        ]))
        .unwrap();
        assert!(only_email.bootstrap_hr.is_none());
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("SWEEP_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SWEEP_INTERVAL_SECS"));
    }
}
