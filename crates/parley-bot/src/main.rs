use std::sync::Arc;

use anyhow::Context as _;
use slack_morphism::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley_bot::{
    config::Config,
    images::SlackImageFetcher,
    slack::{run_socket_mode, SlackReplyPoster},
    state::AppState,
};
use parley_llm::ClientFactory;
use parley_persist::ConversationStoreBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting parley bot");
    tracing::info!(
        model = %config.llm.model,
        allowed_channels = config.allowed_channels.len(),
        "Config loaded"
    );

    // Initialize persistence
    tracing::info!("Connecting to MongoDB");
    let (_database, store) = ConversationStoreBuilder::new()
        .mongodb_uri(&config.secrets.mongodb_uri)
        .database(&config.mongodb.database)
        .collection(&config.mongodb.collection)
        .build()
        .await
        .context("Failed to connect to MongoDB")?;

    // Initialize LLM client
    tracing::info!("Initializing LLM client");
    let llm_client = ClientFactory::create_chat_client(config.openai_config())?;

    let images = SlackImageFetcher::new(config.secrets.slack_bot_token.clone())?;

    let slack_client = Arc::new(SlackClient::new(
        SlackClientHyperConnector::new().context("failed to create slack connector")?,
    ));
    let poster = SlackReplyPoster::new(slack_client.clone(), config.secrets.slack_bot_token.clone());

    let state = AppState::new(
        config,
        Arc::new(store),
        llm_client,
        Arc::new(images),
        Arc::new(poster),
    );

    run_socket_mode(
        slack_client,
        &state.config.secrets.slack_app_token,
        state.dispatcher.clone(),
    )
    .await
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
