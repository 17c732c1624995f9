//! Telegram delivery loop
//!
//! Owns the connection to Telegram and feeds every inbound message through
//! the command router or the detect/annotate pipeline:
//!
//! - admin commands mutate the registry and get chunked replies
//! - any other message containing a tracked URL is edited in place into
//!   the annotated form with inline buttons
//!
//! Uses the explicit Dispatcher pattern for reliable message polling. The
//! outer loop retries connection-level failures with bounded exponential
//! backoff (see `supervisor.rs`); per-message failures are logged and
//! never restart anything.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Update},
};
use tokio::sync::Mutex;
use url::Url;

use crate::annotator::{self, Annotation};
use crate::commands;
use crate::config::Config;
use crate::detector;
use crate::registry::LinkRegistry;
use crate::store::LinkStore;
use crate::supervisor::{RetryDecision, Supervisor};

/// Shared state handed to every handler invocation.
///
/// The registry mutex is the single mutual-exclusion boundary for all
/// registry access; command execution holds it across its whole
/// read-decide-write-persist sequence.
pub struct BotData {
    config: Config,
    registry: Mutex<LinkRegistry>,
    store: LinkStore,
    bot_username: std::sync::RwLock<String>,
}

impl BotData {
    pub fn new(config: Config, registry: LinkRegistry, store: LinkStore) -> Self {
        Self {
            config,
            registry: Mutex::new(registry),
            store,
            bot_username: std::sync::RwLock::new(String::new()),
        }
    }

    fn bot_username(&self) -> String {
        self.bot_username
            .read()
            .map(|name| name.clone())
            .unwrap_or_default()
    }
}

/// Run the bot until it is stopped by the operator or the retry budget is
/// exhausted. Loads the registry once; every loop iteration reconnects and
/// clears the pending-update backlog before resuming delivery.
pub async fn run_bot(config: Config) -> Result<()> {
    let store = LinkStore::new(config.links_file.clone());
    let registry = store.load();

    tracing::info!("Admin IDs: {:?}", config.admin_ids);
    tracing::info!("Links database loaded with {} entries", registry.len());

    let max_retries = config.max_retries;
    let bot = Bot::new(config.bot_token.clone());
    let data = Arc::new(BotData::new(config, registry, store));

    let mut supervisor = Supervisor::new(max_retries);
    loop {
        tracing::info!(
            "Starting bot (attempt {}/{})",
            supervisor.attempt(),
            max_retries + 1
        );
        match run_session(&bot, Arc::clone(&data), &mut supervisor).await {
            Ok(()) => {
                tracing::info!("Bot stopped by user");
                return Ok(());
            }
            Err(e) => {
                tracing::error!("Bot crashed with error: {}", e);
                match supervisor.on_failure() {
                    RetryDecision::Retry(wait) => {
                        tracing::info!("Restarting in {} seconds...", wait.as_secs());
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = tokio::signal::ctrl_c() => {
                                tracing::info!("Bot stopped by user");
                                return Ok(());
                            }
                        }
                    }
                    RetryDecision::GiveUp => {
                        anyhow::bail!(
                            "giving up after {} consecutive connection failures",
                            supervisor.failures()
                        );
                    }
                }
            }
        }
    }
}

/// One connection session: authenticate, purge the stale backlog, then
/// dispatch until shutdown. Errors from this function are connection-level
/// and feed the supervisor.
async fn run_session(
    bot: &Bot,
    data: Arc<BotData>,
    supervisor: &mut Supervisor,
) -> Result<()> {
    let me = bot.get_me().await.context("bot authentication failed")?;
    let username = me.username.as_deref().unwrap_or("unknown").to_string();
    tracing::info!("Bot authenticated: @{} (ID: {})", username, me.id);
    if let Ok(mut name) = data.bot_username.write() {
        *name = username;
    }

    // Startup hook: drop the webhook and any updates queued while we were
    // down, so a restart never reprocesses the outage backlog.
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .context("could not clear webhook and pending updates")?;
    tracing::info!("Telegram webhook and update queue cleared");

    supervisor.on_connect();

    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    tracing::info!("Starting dispatcher with long polling...");
    Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![data])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher. Per-message failures end
/// here as log lines; nothing propagates to the delivery loop.
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    if let Err(e) = handle_message(&bot, &msg, &data).await {
        tracing::error!("Error handling message {}: {}", msg.id.0, e);
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, data: &BotData) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let sender_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);

    // Command surface first; the registry lock spans parse-execute-persist
    let replies = {
        let mut registry = data.registry.lock().await;
        commands::route(
            text,
            sender_id,
            data.config.is_admin(sender_id),
            &data.bot_username(),
            &mut registry,
            &data.store,
        )
    };
    if let Some(replies) = replies {
        for reply in replies {
            bot.send_message(msg.chat.id, reply)
                .parse_mode(ParseMode::Html)
                .await
                .context("failed to send command reply")?;
        }
        return Ok(());
    }

    // Not a command: annotate if the text mentions tracked URLs
    let annotation = {
        let registry = data.registry.lock().await;
        detector::detect(text, &registry).map(|detection| {
            tracing::info!(
                "Found {} referral URLs in message from user {}",
                detection.matched_urls.len(),
                sender_id
            );
            annotator::render(&detection, &registry)
        })
    };
    let Some(annotation) = annotation else {
        return Ok(());
    };

    edit_into_annotation(bot, msg, &annotation).await;
    Ok(())
}

/// Replace the original message with the annotated body and button rows.
/// Edit failures (message too old, deleted, identical content) are
/// expected; they are logged at warn and swallowed.
async fn edit_into_annotation(bot: &Bot, msg: &Message, annotation: &Annotation) {
    let keyboard = build_keyboard(&annotation.buttons);
    match bot
        .edit_message_text(msg.chat.id, msg.id, &annotation.body)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await
    {
        Ok(_) => tracing::info!("Successfully edited message {}", msg.id.0),
        Err(e) => tracing::warn!("Edit failed for message {}: {}", msg.id.0, e),
    }
}

/// One button per row, in detection order. Entries whose URL does not
/// parse as an absolute URL are skipped; the scheme check at add time
/// makes that a pathological case.
fn build_keyboard(buttons: &[(String, String)]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .iter()
        .filter_map(|(label, url)| {
            let url = Url::parse(url).ok()?;
            Some(vec![InlineKeyboardButton::url(label.clone(), url)])
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_one_button_per_row() {
        let buttons = vec![
            ("Join X".to_string(), "https://x.com/ref".to_string()),
            ("Join Y".to_string(), "https://y.com/ref".to_string()),
        ];
        let keyboard = build_keyboard(&buttons);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Join X");
    }

    #[test]
    fn test_keyboard_skips_unparseable_url() {
        let buttons = vec![
            ("Bad".to_string(), "https://".to_string()),
            ("Good".to_string(), "https://x.com".to_string()),
        ];
        let keyboard = build_keyboard(&buttons);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Good");
    }
}
