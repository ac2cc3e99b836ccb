// src/services/scheduler.rs

use chrono::Utc;
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::services::contract_service::ContractService;

/// Roda a varredura de contratos a cada `every`, até o processo terminar.
pub fn spawn_contract_sweeper(service: ContractService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            match service.sweep(today).await {
                Ok(report) => tracing::info!(
                    cancelled = report.cancelled,
                    finalized = report.finalized,
                    kept = report.kept,
                    "Varredura de contratos concluída"
                ),
                Err(e) => tracing::error!(error = %e, "Falha na varredura de contratos"),
            }
        }
    })
}
