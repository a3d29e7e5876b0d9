use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::{Update, UpdateKind},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shoplist_core::{
    command::Command,
    mediator::{Mediator, Outcome},
};

use crate::update::classify;

#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<Mediator>,
    /// Root token; each update runs under a child of it.
    pub shutdown: CancellationToken,
}

/// Poll Telegram until Ctrl-C, feeding every update through the mediator.
///
/// On Ctrl-C the `shutdown` token is cancelled first, so in-flight requests
/// (including one queued on the inference gate) stop promptly, and then the
/// dispatcher is asked to stop.
pub async fn run_polling(
    bot: Bot,
    mediator: Arc<Mediator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "shopping list bot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }

    let state = Arc::new(AppState {
        mediator,
        shutdown: shutdown.clone(),
    });

    let mut dispatcher = Dispatcher::builder(bot, dptree::endpoint(handle_update))
        .dependencies(dptree::deps![state])
        .build();

    let dispatcher_shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!(error = %e, "failed to listen for Ctrl-C");
                    return;
                }
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
        match dispatcher_shutdown.shutdown() {
            Ok(done) => done.await,
            Err(e) => debug!(error = %e, "dispatcher was not running"),
        }
    });

    dispatcher.dispatch().await;
    Ok(())
}

async fn handle_update(bot: Bot, update: Update, state: Arc<AppState>) -> ResponseResult<()> {
    let callback_id = match &update.kind {
        UpdateKind::CallbackQuery(q) => Some(q.id.clone()),
        _ => None,
    };

    match classify(&update) {
        Ok(command) => dispatch(&state, command).await,
        Err(e) => warn!(update_id = update.id, error = %e, "dropping malformed update"),
    }

    // Always answer callback query eventually.
    if let Some(id) = callback_id {
        let _ = bot.answer_callback_query(id).await;
    }
    Ok(())
}

async fn dispatch(state: &AppState, command: Command) {
    let kind = command.kind();
    let chat_id = command.context().chat_id.0;
    let cancel = state.shutdown.child_token();

    match state.mediator.send(command, &cancel).await {
        Ok(Outcome::Handled) => debug!(%kind, chat_id, "command handled"),
        Ok(outcome) => debug!(%kind, chat_id, ?outcome, "command not handled"),
        Err(e) if e.is_cancelled() => debug!(%kind, chat_id, "command cancelled"),
        Err(e) => error!(%kind, chat_id, error = %e, "command failed"),
    }
}
