//! Application state and composition.

use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::{
    ports::{ClockPort, ConversationRepo, LlmPort, MessageRepo, NpcRepo},
    sqlite::SqliteRepositories,
};
use crate::repositories::LlmService;
use crate::use_cases::messaging::{
    AssembleNpcContext, ListMessages, MessagingUseCases, RespondAsNpcs, SendMessage,
};

/// Main application state.
///
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Port traits injected directly.
#[derive(Clone)]
pub struct Repositories {
    pub conversation: Arc<dyn ConversationRepo>,
    pub npc: Arc<dyn NpcRepo>,
    pub message: Arc<dyn MessageRepo>,
}

impl From<SqliteRepositories> for Repositories {
    fn from(repos: SqliteRepositories) -> Self {
        Self {
            conversation: Arc::new(repos.conversation),
            npc: Arc::new(repos.npc),
            message: Arc::new(repos.message),
        }
    }
}

/// Container for all use cases.
pub struct UseCases {
    pub messaging: MessagingUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    ///
    /// `llm_timeout` bounds each NPC reply.
    pub fn new(
        repositories: Repositories,
        llm: Arc<dyn LlmPort>,
        clock: Arc<dyn ClockPort>,
        llm_timeout: Duration,
    ) -> Self {
        let llm = Arc::new(LlmService::new(llm).with_timeout(llm_timeout));

        let context = Arc::new(AssembleNpcContext::new(repositories.message.clone()));
        let respond = Arc::new(RespondAsNpcs::new(
            repositories.conversation.clone(),
            repositories.npc.clone(),
            context.clone(),
            repositories.message.clone(),
            llm,
            clock.clone(),
        ));
        let send = Arc::new(SendMessage::new(
            repositories.conversation.clone(),
            repositories.npc.clone(),
            repositories.message.clone(),
            respond,
            clock,
        ));
        let list = Arc::new(ListMessages::new(
            repositories.conversation.clone(),
            repositories.npc.clone(),
            repositories.message.clone(),
        ));

        Self {
            repositories,
            use_cases: UseCases {
                messaging: MessagingUseCases::new(send, list, context),
            },
        }
    }
}
