//! Conversation orchestrator.
//!
//! One `run_turn` call is one turn: validate the input, resolve the persona,
//! persist the user message, call the provider, persist the reply (or an
//! error-tagged reply), and return a normalized outcome. The user message is
//! written before the AI call so it survives a provider failure, and the log
//! store being down never blocks the turn. No retries; a retry is a new turn.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

use crate::chatlog::{Appended, ChatLog, Role};
use crate::db::{DbPool, Persona, PersonaAttributes, User};
use crate::provider::ChatProvider;

/// Prefix carried by the persisted assistant message when the AI call fails.
pub const AI_ERROR_PREFIX: &str = "[AI_ERROR] ";

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("message is required")]
    EmptyMessage,
    #[error("character not found or unauthorized")]
    UnknownPersona,
    #[error("AI call failed: {detail}")]
    Provider {
        detail: String,
        /// Id of the persisted error-tagged reply, or the sentinel when the
        /// log store was unavailable.
        reply_id: String,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    pub user_message_id: String,
    pub reply_message_id: String,
}

#[derive(Clone)]
pub struct ConversationEngine {
    db: DbPool,
    log: ChatLog,
    provider: Arc<dyn ChatProvider>,
    max_tokens: u32,
}

impl ConversationEngine {
    pub fn new(db: DbPool, log: ChatLog, provider: Arc<dyn ChatProvider>, max_tokens: u32) -> Self {
        Self {
            db,
            log,
            provider,
            max_tokens,
        }
    }

    /// Run one chat turn for `user`.
    pub async fn run_turn(
        &self,
        user: &User,
        persona_id: Option<&str>,
        message: &str,
    ) -> Result<TurnOutcome, TurnError> {
        if message.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let attributes = match persona_id {
            Some(id) => self.resolve_persona(&user.id, id).await?.attribute_map(),
            None => PersonaAttributes::new(),
        };

        // Durable before the slow call; a provider failure must not lose
        // the user's utterance.
        let user_appended = self.log.append(&user.id, persona_id, Role::User, message).await;
        if user_appended == Appended::Skipped && self.log.is_available() {
            warn!(user = %user.id, "User message not persisted for this turn");
        }

        let reply = match self
            .provider
            .generate_reply(message, &attributes, self.max_tokens)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(provider = %self.provider.name(), error = %e, "AI provider call failed");
                let detail = e.to_string();
                let tagged = format!("{}{}", AI_ERROR_PREFIX, detail);
                let reply_appended = self
                    .log
                    .append(&user.id, persona_id, Role::Assistant, &tagged)
                    .await;
                return Err(TurnError::Provider {
                    detail,
                    reply_id: reply_appended.id_or_sentinel(),
                });
            }
        };

        let reply_appended = self
            .log
            .append(&user.id, persona_id, Role::Assistant, &reply)
            .await;

        Ok(TurnOutcome {
            reply,
            user_message_id: user_appended.id_or_sentinel(),
            reply_message_id: reply_appended.id_or_sentinel(),
        })
    }

    /// Fetch a persona owned by `user_id`. Absent and owned-by-someone-else
    /// are indistinguishable to the caller.
    pub async fn resolve_persona(&self, user_id: &str, persona_id: &str) -> Result<Persona, TurnError> {
        let persona: Option<Persona> =
            sqlx::query_as("SELECT * FROM personas WHERE id = ? AND user_id = ?")
                .bind(persona_id)
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        persona.ok_or(TurnError::UnknownPersona)
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }
}
