// src/services/chat_service.rs

use chrono::Utc;
use sqlx::PgPool;

use crate::{
    common::{db_utils::RowLock, error::AppError},
    db::{ChatRepository, UserRepository},
    models::chat::{ChatMessage, ChatSender, ChatSession, ChatState},
};

pub const CLOSING_MESSAGE: &str = "La conversación ha finalizado";

/// Lado do participante; estranhos recebem `Forbidden`.
pub fn participant_side(session: &ChatSession, user_id: i64) -> Result<ChatSender, AppError> {
    session.side_of(user_id).ok_or(AppError::Forbidden)
}

/// Participante de uma conversa ainda aberta.
pub fn active_side(session: &ChatSession, user_id: i64) -> Result<ChatSender, AppError> {
    let sender = participant_side(session, user_id)?;
    if session.state != ChatState::Active {
        return Err(AppError::ChatNotActive(session.id));
    }
    Ok(sender)
}

#[derive(Clone)]
pub struct ChatService {
    chat_repo: ChatRepository,
    user_repo: UserRepository,
    pool: PgPool,
}

impl ChatService {
    pub fn new(chat_repo: ChatRepository, user_repo: UserRepository, pool: PgPool) -> Self {
        Self { chat_repo, user_repo, pool }
    }

    /// Abre uma conversa com um agente sorteado.
    pub async fn start(&self, client_id: i64) -> Result<ChatSession, AppError> {
        let mut tx = self.pool.begin().await?;

        let agent = self
            .user_repo
            .pick_random_agent(&mut *tx)
            .await?
            .ok_or(AppError::AgentUnavailable)?;
        let session = self.chat_repo.create_session(&mut *tx, client_id, agent.id).await?;

        tx.commit().await?;

        tracing::info!(chat_id = session.id, client_id, agent_id = agent.id, "Chat iniciado");
        Ok(session)
    }

    async fn load(&self, chat_id: i64) -> Result<ChatSession, AppError> {
        self.chat_repo
            .find_session(&self.pool, chat_id)
            .await?
            .ok_or(AppError::ChatNotFound(chat_id))
    }

    pub async fn send(&self, user_id: i64, chat_id: i64, content: &str) -> Result<ChatMessage, AppError> {
        let mut tx = self.pool.begin().await?;

        // Compartilhado: não cruza com um encerramento em andamento
        let session = self
            .chat_repo
            .lock_session(&mut *tx, chat_id, RowLock::Share)
            .await?
            .ok_or(AppError::ChatNotFound(chat_id))?;
        let sender = active_side(&session, user_id)?;

        let message = self
            .chat_repo
            .insert_message(&mut *tx, chat_id, sender, content.trim())
            .await?;
        tx.commit().await?;
        Ok(message)
    }

    pub async fn messages(&self, user_id: i64, chat_id: i64, page: u32) -> Result<Vec<ChatMessage>, AppError> {
        let session = self.load(chat_id).await?;
        participant_side(&session, user_id)?;
        self.chat_repo.list_messages(chat_id, page).await
    }

    /// Qualquer lado encerra; a mensagem de encerramento fica no histórico.
    pub async fn close(&self, user_id: i64, chat_id: i64) -> Result<ChatSession, AppError> {
        let mut tx = self.pool.begin().await?;

        // Exclusivo: um segundo encerramento espera e encontra CLOSED
        let session = self
            .chat_repo
            .lock_session(&mut *tx, chat_id, RowLock::Update)
            .await?
            .ok_or(AppError::ChatNotFound(chat_id))?;
        let sender = active_side(&session, user_id)?;

        self.chat_repo
            .insert_message(&mut *tx, chat_id, sender, CLOSING_MESSAGE)
            .await?;
        let closed = self.chat_repo.close_session(&mut *tx, chat_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(chat_id, "Chat encerrado");
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> ChatSession {
        ChatSession {
            id: 1,
            client_id: 10,
            agent_id: 20,
            state: ChatState::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    #[test]
    fn test_both_sides_are_recognized() {
        let session = make_session();
        assert_eq!(participant_side(&session, 10).unwrap(), ChatSender::Client);
        assert_eq!(participant_side(&session, 20).unwrap(), ChatSender::Agent);
    }

    #[test]
    fn test_outsider_is_forbidden() {
        assert!(matches!(participant_side(&make_session(), 30), Err(AppError::Forbidden)));
    }

    #[test]
    fn test_closed_chat_refuses_its_participants() {
        let mut session = make_session();
        session.state = ChatState::Closed;
        assert!(matches!(active_side(&session, 10), Err(AppError::ChatNotActive(1))));
    }

    #[test]
    fn test_outsider_is_forbidden_even_when_closed() {
        let mut session = make_session();
        session.state = ChatState::Closed;
        assert!(matches!(active_side(&session, 30), Err(AppError::Forbidden)));
    }
}
