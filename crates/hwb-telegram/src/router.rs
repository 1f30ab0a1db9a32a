use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use hwb_core::{config::Config, conversation::Controller, messaging::port::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub messenger: Arc<dyn MessagingPort>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Serializes turns per chat so one conversant never has two handlers in flight.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // An entry only the map refers to has no holder and no waiter.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Commands advertised in the Telegram client menu.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Welcome message"),
        BotCommand::new("monitor", "Run a diagnostic command on the server"),
        BotCommand::new("find", "Find a contact by email or phone"),
        BotCommand::new("add_contact", "Add a contact (email and phone)"),
        BotCommand::new("verify_password", "Check password strength"),
        BotCommand::new("cancel", "Cancel the current operation"),
    ]
}

pub async fn run_polling(cfg: Arc<Config>, controller: Arc<Controller>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!("hwb started: @{}", me.username()),
        Err(e) => warn!("get_me failed: {e}"),
    }
    info!(
        "Monitoring {}@{}:{}",
        cfg.ssh.user, cfg.ssh.host, cfg.ssh.port
    );
    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot.clone(),
        cfg.telegram_safe_limit,
    ));

    let state = Arc::new(AppState {
        controller,
        messenger,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
