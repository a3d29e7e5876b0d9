use std::sync::Arc;

use shoplist_core::{
    config::Config,
    handlers::{default_registry, Replier},
    inference::{InferenceGate, PromptTemplate},
    localization::Localization,
    mediator::Mediator,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
};
use shoplist_llama::{LlamaCliConfig, LlamaCliEngine};
use shoplist_telegram::TelegramMessenger;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), shoplist_core::Error> {
    shoplist_core::logging::init("shoplist")?;

    let cfg = Config::load()?;
    let template = PromptTemplate::load(cfg.system_prompt_path.as_deref())?;
    let localization = Arc::new(Localization::load(cfg.localization_path.as_deref())?);

    let engine = LlamaCliEngine::load(LlamaCliConfig {
        program: cfg.llama_cli_path.clone(),
        params: cfg.engine.clone(),
    })?;
    let gate = Arc::new(InferenceGate::new(
        Box::new(engine),
        template,
        cfg.sampling.clone(),
    ));

    let bot = shoplist_telegram::connect(&cfg.telegram_bot_token);
    // Keep a 429 RetryAfter retry at the Telegram layer, but avoid most of them here.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let registry = default_registry(
        gate.clone(),
        Replier::new(messenger, localization),
        cfg.reserved_commands.clone(),
    )?;
    let mediator = Arc::new(Mediator::new(registry));

    info!(
        model = %cfg.engine.model_path.display(),
        reserved = ?cfg.reserved_commands.tokens(),
        "starting shopping list bot"
    );

    let shutdown = CancellationToken::new();
    let polled = shoplist_telegram::router::run_polling(bot, mediator, shutdown.clone()).await;
    shutdown.cancel();

    if let Err(e) = gate.shutdown().await {
        error!(error = %e, "failed to dispose inference engine");
    }

    polled.map_err(|e| shoplist_core::Error::External(format!("telegram bot failed: {e}")))?;
    info!("stopped");
    Ok(())
}
