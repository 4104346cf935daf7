use std::sync::Arc;

use parley_llm::ChatClient;
use parley_persist::ConversationStore;

use crate::config::Config;
use crate::conversation::ConversationService;
use crate::dispatcher::{Dispatcher, ReplyPoster};
use crate::images::ImageResolver;

/// Process-wide state, built once at startup
///
/// Every collaborator is injected here; nothing is initialized lazily.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ConversationStore>,
        llm_client: Arc<dyn ChatClient>,
        images: Arc<dyn ImageResolver>,
        poster: Arc<dyn ReplyPoster>,
    ) -> Self {
        let conversations = Arc::new(ConversationService::new(
            store,
            llm_client,
            images,
            config.conversation_settings(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            conversations,
            poster,
            config.allowed_channels.clone(),
        ));

        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}
