pub mod api;
pub mod auth;
pub mod chatlog;
pub mod config;
pub mod db;
pub mod engine;
pub mod provider;
pub mod speech;

pub use db::DbPool;

use std::sync::Arc;

use chatlog::ChatLog;
use config::Config;
use engine::ConversationEngine;
use provider::ChatProvider;
use speech::Synthesizer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub chatlog: ChatLog,
    pub provider: Arc<dyn ChatProvider>,
    pub speech: Synthesizer,
    pub engine: ConversationEngine,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        chatlog: ChatLog,
        provider: Arc<dyn ChatProvider>,
        speech: Synthesizer,
    ) -> Self {
        let engine = ConversationEngine::new(
            db.clone(),
            chatlog.clone(),
            provider.clone(),
            config.ai.max_tokens,
        );
        Self {
            config,
            db,
            chatlog,
            provider,
            speech,
            engine,
        }
    }
}
