// src/services/notification_service.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::config::MailSettings;

const RELAY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Canal de saída dos e-mails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Sem relay configurado: só registra no log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "E-mail (relay desativado)");
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Envia pelo relay HTTP (POST JSON com token Bearer).
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(url: String, token: Option<String>, from: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url, token, from })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let mut request = self.client.post(&self.url).json(&RelayRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("relay respondeu HTTP {status}: {body}");
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn from_settings(settings: &MailSettings) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = match &settings.relay_url {
            Some(url) => Arc::new(HttpMailer::new(
                url.clone(),
                settings.relay_token.clone(),
                settings.from.clone(),
            )?),
            None => Arc::new(LogMailer),
        };
        Ok(Self::new(mailer))
    }

    /// Dispara o envio sem bloquear a operação; falhas só vão para o log.
    pub fn notify(&self, message: EmailMessage) -> JoinHandle<()> {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::error!(to = %message.to, error = %e, "ERROR_ENVIO_CORREO");
            }
        })
    }
}

// ---
// Modelos de e-mail
// ---

pub fn contract_created(to: &str, client_name: &str, contract_id: i64, start: NaiveDate, end: NaiveDate) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Nuevo contrato #{contract_id} pendiente de verificación"),
        body: format!(
            "Hola {client_name},\n\nSe registró el contrato #{contract_id} con vigencia del {start} al {end}. \
             Ingresa a Store-It para verificarlo antes de la fecha de inicio."
        ),
    }
}

pub fn contract_verified(to: &str, contract_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Contrato #{contract_id} verificado por el cliente"),
        body: format!("El cliente verificó el contrato #{contract_id}. Ya puedes activarlo."),
    }
}

pub fn contract_activated(to: &str, contract_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Contrato #{contract_id} activo"),
        body: format!("Tu contrato #{contract_id} está activo. Ya puedes ingresar productos a tu espacio."),
    }
}

pub fn contract_cancelled(to: &str, contract_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Contrato #{contract_id} cancelado"),
        body: format!("El contrato #{contract_id} fue cancelado y el espacio quedó liberado."),
    }
}

pub fn contract_finalized(to: &str, contract_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Contrato #{contract_id} finalizado"),
        body: format!("El contrato #{contract_id} llegó a su fin. Gracias por usar Store-It."),
    }
}

pub fn product_intake(to: &str, product_name: &str, space_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Ingreso de producto".to_string(),
        body: format!("Tu producto \"{product_name}\" ingresó al espacio #{space_id}."),
    }
}

pub fn product_withdrawn(to: &str, product_name: &str, space_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Retiro de producto".to_string(),
        body: format!("Tu producto \"{product_name}\" fue retirado del espacio #{space_id}."),
    }
}

pub fn password_reset_code(to: &str, code: &str, expires_at: DateTime<Utc>) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Restablecimiento de contraseña".to_string(),
        body: format!(
            "Tu código para restablecer la contraseña es: {code}\n\n\
             Es válido hasta {}.",
            expires_at.format("%Y-%m-%d %H:%M UTC")
        ),
    }
}

pub fn credentials_changed(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Actualización de credenciales - Store-It".to_string(),
        body: format!(
            "Hola {name},\n\nLas credenciales de tu cuenta en Store-It fueron actualizadas. \
             Si no reconoces este cambio, contáctanos de inmediato."
        ),
    }
}

pub fn account_reactivated(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Reactivación de cuenta - Store-It".to_string(),
        body: format!("Hola {name},\n\nTu cuenta en Store-It fue reactivada. ¡Nos alegra tenerte de vuelta!"),
    }
}

pub fn staff_transferred(to: &str, name: &str, warehouse_id: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Traslado de bodega - Store-It".to_string(),
        body: format!("Hola {name},\n\nHas sido asignado a la bodega #{warehouse_id}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: &EmailMessage) -> anyhow::Result<()> {
            anyhow::bail!("relay fora do ar")
        }
    }

    #[tokio::test]
    async fn test_notify_delivers_through_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(mailer.clone());

        service.notify(contract_activated("c@storeit.co", 9)).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "c@storeit.co");
        assert!(sent[0].subject.contains("#9"));
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_panic() {
        let service = NotificationService::new(Arc::new(FailingMailer));
        // A task termina normalmente mesmo com o relay falhando
        assert!(service.notify(contract_cancelled("c@storeit.co", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_without_relay_uses_log_mailer() {
        let settings = MailSettings { relay_url: None, relay_token: None, from: "x@storeit.co".into() };
        let service = NotificationService::from_settings(&settings).unwrap();
        assert!(service.notify(product_intake("c@storeit.co", "Caja", 3)).await.is_ok());
    }

    #[test]
    fn test_contract_created_mentions_dates() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let msg = contract_created("c@storeit.co", "Laura", 5, start, end);
        assert!(msg.body.contains("2026-03-01"));
        assert!(msg.body.contains("Laura"));
    }

    #[test]
    fn test_reset_code_mail_carries_code_and_expiry() {
        let expires = DateTime::parse_from_rfc3339("2026-10-19T15:30:00Z").unwrap().with_timezone(&Utc);
        let msg = password_reset_code("c@storeit.co", "A1B2C3", expires);
        assert!(msg.body.contains("A1B2C3"));
        assert!(msg.body.contains("2026-10-19 15:30 UTC"));
    }
}
