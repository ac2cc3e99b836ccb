// src/db/chat_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::{
        db_utils::RowLock,
        error::AppError,
        pagination::{offset, PAGE_SIZE},
    },
    models::chat::{ChatMessage, ChatSender, ChatSession, ChatState},
};

const SESSION_COLUMNS: &str = "id, client_id, agent_id, state, started_at, ended_at";
const MESSAGE_COLUMNS: &str = "id, session_id, sender, content, sent_at";

fn lock_session_sql(mode: RowLock) -> String {
    format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 {}", mode.clause())
}

#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_session<'e, E>(
        &self,
        executor: E,
        client_id: i64,
        agent_id: i64,
    ) -> Result<ChatSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO chat_sessions (client_id, agent_id) VALUES ($1, $2) RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, ChatSession>(&sql)
            .bind(client_id)
            .bind(agent_id)
            .fetch_one(executor)
            .await?;
        Ok(session)
    }

    pub async fn find_session<'e, E>(&self, executor: E, id: i64) -> Result<Option<ChatSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1");
        let session = sqlx::query_as::<_, ChatSession>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    /// Envio segura a conversa em modo compartilhado; encerramento, exclusivo.
    pub async fn lock_session<'e, E>(
        &self,
        executor: E,
        id: i64,
        mode: RowLock,
    ) -> Result<Option<ChatSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, ChatSession>(&lock_session_sql(mode))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    pub async fn close_session<'e, E>(
        &self,
        executor: E,
        id: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<ChatSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE chat_sessions SET state = $2, ended_at = $3 WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, ChatSession>(&sql)
            .bind(id)
            .bind(ChatState::Closed)
            .bind(ended_at)
            .fetch_one(executor)
            .await?;
        Ok(session)
    }

    pub async fn insert_message<'e, E>(
        &self,
        executor: E,
        session_id: i64,
        sender: ChatSender,
        content: &str,
    ) -> Result<ChatMessage, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO chat_messages (session_id, sender, content) VALUES ($1, $2, $3) RETURNING {MESSAGE_COLUMNS}"
        );
        let message = sqlx::query_as::<_, ChatMessage>(&sql)
            .bind(session_id)
            .bind(sender)
            .bind(content)
            .fetch_one(executor)
            .await?;
        Ok(message)
    }

    pub async fn list_messages(&self, session_id: i64, page: u32) -> Result<Vec<ChatMessage>, AppError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE session_id = $1
            ORDER BY sent_at, id
            LIMIT $2 OFFSET $3
            "#
        );
        let messages = sqlx::query_as::<_, ChatMessage>(&sql)
            .bind(session_id)
            .bind(PAGE_SIZE)
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_takes_an_exclusive_session_lock() {
        assert!(lock_session_sql(RowLock::Update).ends_with("FOR UPDATE"));
        assert!(lock_session_sql(RowLock::Share).ends_with("FOR SHARE"));
    }
}
