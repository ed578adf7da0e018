//! pms-watch: Change feed tail
//!
//! Connects to the policy store, ensures the schema exists, and logs every
//! service add/delete event until interrupted.
//!
//! ## Architecture
//! ```text
//! [services table] --(trigger / pg_notify)--> [Watcher] --> log
//! ```
//!
//! ## Configuration
//! - PMS_CONFIG: Path to a YAML config file (optional)
//! - PMS_STORAGE__POSTGRES__URI: Connection URI
//! - PMS_WATCHER__CHANNEL: Notification channel (default: events)
//! - PMS_LOG: Log filter (default: info)

use tracing::info;

use pms_store::config::Config;
use pms_store::storage::init_storage;
use pms_store::utils::bootstrap::init_tracing;
use pms_store::watcher::StoreChange;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let store = init_storage(&config.storage, &config.watcher).await?;
    let (mut events, handle) = store.watch(&config.watcher).await?;

    info!(channel = %config.watcher.channel, "pms-watch started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    info!("Change feed closed");
                    break;
                };
                match &event.change {
                    StoreChange::ServiceAdd(service) => info!(
                        sequence_id = event.sequence_id,
                        service = %service.name,
                        policies = service.policies.len(),
                        role_policies = service.role_policies.len(),
                        "SERVICE_ADD"
                    ),
                    StoreChange::ServiceDelete(names) => info!(
                        sequence_id = event.sequence_id,
                        services = ?names,
                        "SERVICE_DELETE"
                    ),
                }
            }
        }
    }

    handle.stop().await?;
    Ok(())
}
