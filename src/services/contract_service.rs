// src/services/contract_service.rs

use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::{
    common::{
        db_utils::{begin_locked, LockSettings},
        error::AppError,
        retry::retry_on_conflict,
    },
    db::{
        contract_repo::ContractParty, ContractRepository, ProductRepository, UserRepository,
        WarehouseRepository,
    },
    lifecycle::{contract_lifecycle, space_allocator},
    models::{
        auth::{Role, User},
        contract::{Contract, ContractFilter, ContractTerms},
        warehouse::Space,
    },
    services::notification_service::{self as mail, EmailMessage, NotificationService},
};

/// Quem pode ler o contrato: as duas partes e o RH.
pub fn can_view(contract: &Contract, user: &User) -> bool {
    user.id == contract.client_id
        || user.id == contract.agent_id
        || user.role == Role::HumanResources
}

/// Lado da listagem conforme o papel de quem pede.
pub fn party_for(user: &User) -> Result<ContractParty, AppError> {
    match user.role {
        Role::Client => Ok(ContractParty::Client),
        Role::SalesAgent => Ok(ContractParty::Agent),
        _ => Err(AppError::Forbidden),
    }
}

/// Resultado de uma rodada da varredura.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub cancelled: usize,
    pub finalized: usize,
    pub kept: usize,
}

#[derive(Clone)]
pub struct ContractService {
    contract_repo: ContractRepository,
    warehouse_repo: WarehouseRepository,
    user_repo: UserRepository,
    product_repo: ProductRepository,
    notifier: NotificationService,
    pool: PgPool,
    lock: LockSettings,
    max_retries: u32,
}

impl ContractService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contract_repo: ContractRepository,
        warehouse_repo: WarehouseRepository,
        user_repo: UserRepository,
        product_repo: ProductRepository,
        notifier: NotificationService,
        pool: PgPool,
        lock: LockSettings,
        max_retries: u32,
    ) -> Self {
        Self {
            contract_repo,
            warehouse_repo,
            user_repo,
            product_repo,
            notifier,
            pool,
            lock,
            max_retries,
        }
    }

    // ---
    // Helpers de transação
    // ---

    /// Trava espaço e contrato, nessa ordem.
    async fn lock_pair(&self, conn: &mut PgConnection, contract_id: i64) -> Result<(Contract, Space), AppError> {
        let space_id = self
            .contract_repo
            .find_contract(&mut *conn, contract_id)
            .await?
            .ok_or(AppError::ContractNotFound(contract_id))?
            .space_id;

        let space = self
            .warehouse_repo
            .lock_space(&mut *conn, space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(space_id))?;
        let contract = self
            .contract_repo
            .lock_contract(&mut *conn, contract_id)
            .await?
            .ok_or(AppError::ContractNotFound(contract_id))?;

        Ok((contract, space))
    }

    async fn notify_user<F>(&self, user_id: i64, build: F)
    where
        F: FnOnce(&str) -> EmailMessage,
    {
        if let Some(email) = self.user_repo.email_for_notice(user_id).await {
            self.notifier.notify(build(&email));
        }
    }

    // ---
    // Abertura e leitura
    // ---

    pub async fn create_contract(
        &self,
        agent_id: i64,
        space_id: i64,
        client_id: i64,
        terms: ContractTerms,
    ) -> Result<Contract, AppError> {
        let (contract, client) = retry_on_conflict(self.max_retries, || {
            self.create_contract_once(agent_id, space_id, client_id, &terms)
        })
        .await?;

        self.notifier.notify(mail::contract_created(
            &client.email,
            &client.name,
            contract.id,
            contract.start_date,
            contract.end_date,
        ));
        Ok(contract)
    }

    async fn create_contract_once(
        &self,
        agent_id: i64,
        space_id: i64,
        client_id: i64,
        terms: &ContractTerms,
    ) -> Result<(Contract, User), AppError> {
        // O armazém do espaço nunca muda: dá para achá-lo antes dos locks
        let warehouse_id = self
            .warehouse_repo
            .find_space(&self.pool, space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(space_id))?
            .warehouse_id;

        let mut tx = begin_locked(&self.pool, self.lock).await?;

        // 1. Armazém (compartilhado) antes do espaço, como na desativação
        let warehouse = self
            .warehouse_repo
            .share_lock_warehouse(&mut *tx, warehouse_id)
            .await?
            .ok_or(AppError::WarehouseNotFound(warehouse_id))?;
        if !warehouse.is_open() {
            return Err(AppError::WarehouseNotActive(warehouse.id));
        }

        let mut space = self
            .warehouse_repo
            .lock_space(&mut *tx, space_id)
            .await?
            .ok_or(AppError::SpaceNotFound(space_id))?;

        // 2. Participantes seguros até o commit: ninguém os desativa no meio
        let client = self
            .user_repo
            .lock_active_with_role(&mut *tx, client_id, Role::Client)
            .await?;
        self.user_repo
            .lock_active_with_role(&mut *tx, agent_id, Role::SalesAgent)
            .await?;

        // 3. Espaço livre e termos coerentes
        contract_lifecycle::ensure_can_open(&space, terms)?;

        // 4. Grava o contrato e prende o espaço
        let contract = self
            .contract_repo
            .create_contract(&mut *tx, space_id, client_id, agent_id, terms)
            .await?;
        space_allocator::bind(&mut space, contract.id)?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;

        tx.commit().await?;

        tracing::info!(contract_id = contract.id, space_id, client_id, agent_id, "Contrato criado");
        Ok((contract, client))
    }

    pub async fn get_contract(&self, user: &User, id: i64) -> Result<Contract, AppError> {
        let contract = self
            .contract_repo
            .find_contract(&self.pool, id)
            .await?
            .ok_or(AppError::ContractNotFound(id))?;
        if !can_view(&contract, user) {
            return Err(AppError::Forbidden);
        }
        Ok(contract)
    }

    pub async fn list_contracts(&self, user: &User, filter: &ContractFilter) -> Result<Vec<Contract>, AppError> {
        let party = party_for(user)?;
        self.contract_repo.list_for_party(party, user.id, filter).await
    }

    // ---
    // Transições
    // ---

    pub async fn edit_contract(&self, agent_id: i64, id: i64, terms: ContractTerms) -> Result<Contract, AppError> {
        retry_on_conflict(self.max_retries, || self.edit_contract_once(agent_id, id, terms.clone())).await
    }

    async fn edit_contract_once(&self, agent_id: i64, id: i64, terms: ContractTerms) -> Result<Contract, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;
        let (mut contract, _space) = self.lock_pair(&mut *tx, id).await?;
        if contract.agent_id != agent_id {
            return Err(AppError::Forbidden);
        }

        contract_lifecycle::edit(&mut contract, terms)?;
        self.contract_repo.save_contract(&mut *tx, &contract).await?;
        tx.commit().await?;

        tracing::info!(contract_id = id, "Contrato editado");
        Ok(contract)
    }

    /// Cliente confirma os termos.
    pub async fn verify(&self, client_id: i64, id: i64) -> Result<Contract, AppError> {
        let contract = retry_on_conflict(self.max_retries, || self.verify_once(client_id, id)).await?;
        self.notify_user(contract.agent_id, |to| mail::contract_verified(to, contract.id)).await;
        Ok(contract)
    }

    async fn verify_once(&self, client_id: i64, id: i64) -> Result<Contract, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;
        let (mut contract, _space) = self.lock_pair(&mut *tx, id).await?;
        if contract.client_id != client_id {
            return Err(AppError::Forbidden);
        }

        let now = Utc::now();
        contract_lifecycle::verify(&mut contract, now.date_naive(), now)?;
        self.contract_repo.save_contract(&mut *tx, &contract).await?;
        tx.commit().await?;

        tracing::info!(contract_id = id, "Contrato verificado pelo cliente");
        Ok(contract)
    }

    /// Agente assina; o espaço passa a CONTRACTED_AVAILABLE.
    pub async fn activate(&self, agent_id: i64, id: i64) -> Result<Contract, AppError> {
        let contract = retry_on_conflict(self.max_retries, || self.activate_once(agent_id, id)).await?;
        self.notify_user(contract.client_id, |to| mail::contract_activated(to, contract.id)).await;
        Ok(contract)
    }

    async fn activate_once(&self, agent_id: i64, id: i64) -> Result<Contract, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;
        let (mut contract, mut space) = self.lock_pair(&mut *tx, id).await?;
        if contract.agent_id != agent_id {
            return Err(AppError::Forbidden);
        }

        contract_lifecycle::activate(&mut contract, &mut space, Utc::now())?;
        self.contract_repo.save_contract(&mut *tx, &contract).await?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;
        tx.commit().await?;

        tracing::info!(contract_id = id, space_id = space.id, "Contrato ativado");
        Ok(contract)
    }

    pub async fn cancel(&self, agent_id: i64, id: i64) -> Result<Contract, AppError> {
        let contract = retry_on_conflict(self.max_retries, || {
            self.close_once(Actor::Agent(agent_id), id, Closing::Cancel)
        })
        .await?
        .ok_or(AppError::ContractNotFound(id))?;
        self.notify_user(contract.client_id, |to| mail::contract_cancelled(to, contract.id)).await;
        Ok(contract)
    }

    pub async fn finalize(&self, agent_id: i64, id: i64) -> Result<Contract, AppError> {
        let contract = retry_on_conflict(self.max_retries, || {
            self.close_once(Actor::Agent(agent_id), id, Closing::Finalize)
        })
        .await?
        .ok_or(AppError::ContractNotFound(id))?;
        self.notify_user(contract.client_id, |to| mail::contract_finalized(to, contract.id)).await;
        Ok(contract)
    }

    /// Encerra o contrato. Para a varredura devolve `None` quando, já com o
    /// lock, o contrato não se encaixa mais no critério.
    async fn close_once(&self, actor: Actor, id: i64, closing: Closing) -> Result<Option<Contract>, AppError> {
        let mut tx = begin_locked(&self.pool, self.lock).await?;
        let (mut contract, mut space) = self.lock_pair(&mut *tx, id).await?;

        match actor {
            Actor::Agent(agent_id) if agent_id != contract.agent_id => return Err(AppError::Forbidden),
            Actor::Agent(_) => {}
            Actor::Sweeper(today) => {
                let still_due = match closing {
                    Closing::Cancel => contract_lifecycle::is_stale_pending(&contract, today),
                    Closing::Finalize => contract_lifecycle::is_expired(&contract, today),
                };
                if !still_due {
                    return Ok(None);
                }
            }
        }

        let stored = self
            .product_repo
            .count_stored_in_space(&mut *tx, contract.client_id, space.id)
            .await?;
        let now = Utc::now();
        match closing {
            Closing::Cancel => contract_lifecycle::cancel(&mut contract, &mut space, stored, now)?,
            Closing::Finalize => contract_lifecycle::finalize(&mut contract, &mut space, stored, now)?,
        }

        self.contract_repo.save_contract(&mut *tx, &contract).await?;
        self.warehouse_repo.save_space(&mut *tx, &space).await?;
        tx.commit().await?;

        tracing::info!(contract_id = id, space_id = space.id, state = ?contract.state, "Contrato encerrado");
        Ok(Some(contract))
    }

    // ---
    // Varredura periódica
    // ---

    /// Cancela pendentes esquecidos e finaliza ativos vencidos.
    pub async fn sweep(&self, today: NaiveDate) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();

        let cutoff = today - Duration::days(1);
        for id in self.contract_repo.stale_pending_ids(cutoff).await? {
            let outcome = retry_on_conflict(self.max_retries, || {
                self.close_once(Actor::Sweeper(today), id, Closing::Cancel)
            })
            .await;
            match outcome {
                Ok(None) => {}
                Ok(Some(contract)) => {
                    report.cancelled += 1;
                    self.notify_user(contract.client_id, |to| mail::contract_cancelled(to, contract.id)).await;
                }
                Err(e) => tracing::warn!(contract_id = id, error = %e, "Falha ao cancelar contrato pendente"),
            }
        }

        for id in self.contract_repo.expired_active_ids(today).await? {
            let outcome = retry_on_conflict(self.max_retries, || {
                self.close_once(Actor::Sweeper(today), id, Closing::Finalize)
            })
            .await;
            match outcome {
                Ok(None) => {}
                Ok(Some(contract)) => {
                    report.finalized += 1;
                    self.notify_user(contract.client_id, |to| mail::contract_finalized(to, contract.id)).await;
                }
                Err(AppError::Lifecycle(e)) => {
                    report.kept += 1;
                    tracing::warn!(contract_id = id, reason = %e, "Contrato vencido mantido ativo");
                }
                Err(e) => tracing::warn!(contract_id = id, error = %e, "Falha ao finalizar contrato vencido"),
            }
        }

        Ok(report)
    }
}

#[derive(Debug, Clone, Copy)]
enum Actor {
    Agent(i64),
    Sweeper(NaiveDate),
}

#[derive(Debug, Clone, Copy)]
enum Closing {
    Cancel,
    Finalize,
}
