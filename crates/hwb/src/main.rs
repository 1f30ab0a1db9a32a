use std::sync::Arc;

use tracing::info;

use hwb_core::{
    config::Config, conversation::Controller, ports::ContactStore, state::MemoryStateStore,
};
use hwb_postgres::PgContactStore;
use hwb_ssh::SshExecutor;

#[tokio::main]
async fn main() -> Result<(), hwb_core::Error> {
    hwb_core::logging::init("hwb")?;

    let cfg = Arc::new(Config::load()?);
    info!(
        db_host = %cfg.database.host,
        db_name = %cfg.database.name,
        ssh_host = %cfg.ssh.host,
        "configuration loaded"
    );

    // Nothing works without the contacts table, so schema failure is fatal.
    let contacts = Arc::new(PgContactStore::new(&cfg.database)?);
    contacts.ensure_schema().await?;

    let executor = Arc::new(SshExecutor::new(cfg.ssh.clone()));
    let controller = Arc::new(
        Controller::new(executor, contacts, Arc::new(MemoryStateStore::new()))
            .with_monitor_allow_list(cfg.monitor_allowed_users.clone()),
    );

    hwb_telegram::router::run_polling(cfg, controller)
        .await
        .map_err(|e| hwb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
