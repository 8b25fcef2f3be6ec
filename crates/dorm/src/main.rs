use std::sync::Arc;

use dorm_core::{config::Config, store};
use dorm_telegram::{health, router};

#[tokio::main]
async fn main() -> Result<(), dorm_core::Error> {
    let cfg = Arc::new(Config::load()?);
    let _log_guard = dorm_core::logging::init("dorm", &cfg.log_level, cfg.log_dir.as_deref())?;

    let store = store::open(&cfg.storage, cfg.db_max_connections).await?;

    if cfg.health_enabled {
        let port = cfg.health_port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                tracing::error!(port, error = %e, "health endpoint stopped");
            }
        });
    }

    let polled = router::run_polling(cfg, store.clone()).await;
    store.close().await;
    polled.map_err(|e| dorm_core::Error::External(format!("telegram bot failed: {e}")))?;

    tracing::info!("shutdown complete");
    Ok(())
}
