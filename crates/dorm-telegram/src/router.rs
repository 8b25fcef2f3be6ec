use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use dorm_core::{
    broadcast::BroadcastEngine,
    config::Config,
    conversation::Conversations,
    directory::UserDirectory,
    feedback::FeedbackPipeline,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    stats::StatsAggregator,
    store::Store,
};

use crate::handlers;
use crate::TelegramMessenger;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a handler needs, injected into the dispatcher once.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub messenger: Arc<dyn MessagingPort>,
    pub conversations: Arc<Conversations>,
    pub directory: Arc<UserDirectory>,
    pub stats: Arc<StatsAggregator>,
    pub feedback: Arc<FeedbackPipeline>,
    pub broadcast: Arc<BroadcastEngine>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, store: Arc<dyn Store>, messenger: Arc<dyn MessagingPort>) -> Self {
        let conversations = Arc::new(Conversations::new(cfg.conversation_timeout));
        let directory = Arc::new(UserDirectory::new(store.clone(), cfg.admin_ids.clone()));
        let stats = Arc::new(StatsAggregator::new(store.clone()));
        let feedback = Arc::new(FeedbackPipeline::new(
            store.clone(),
            conversations.clone(),
            messenger.clone(),
            cfg.admin_ids.clone(),
        ));
        let broadcast = Arc::new(BroadcastEngine::new(
            store.clone(),
            directory.clone(),
            conversations.clone(),
            messenger.clone(),
        ));

        Self {
            cfg,
            store,
            messenger,
            conversations,
            directory,
            stats,
            feedback,
            broadcast,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed; continuing"),
    }
    tracing::info!(
        admins = cfg.admin_ids.len(),
        backend = store.backend(),
        stats_enabled = cfg.stats_enabled,
        "configuration loaded"
    );

    // Broadcast fan-out and interactive replies share one throttled messenger.
    // A 429 RetryAfter is still retried once at the adapter layer.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::with_global_interval(cfg.broadcast_min_interval),
    ));

    let state = Arc::new(AppState::new(cfg.clone(), store, messenger));

    if cfg.conversation_timeout.is_some() {
        let conversations = state.conversations.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tick.tick().await;
                let removed = conversations.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "expired conversation states dropped");
                }
            }
        });
    }

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
