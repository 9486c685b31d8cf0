use std::sync::Arc;

use rust_fileserver::config::{AppState, Config};
use rust_fileserver::{logger, server};

const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;

    if let Err(e) = logger::init(&cfg.logging) {
        eprintln!("[ERROR] Failed to open log files, falling back to stdout/stderr: {e}");
    }

    // Worker threads follow server.workers, defaulting to the CPU count
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    tokio::fs::create_dir_all(&cfg.storage.root)
        .await
        .map_err(|e| format!("create storage root {}: {e}", cfg.storage.root))?;

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals))?;

    let state = AppState::shared(cfg);
    server::run(listener, state, signals).await;
    Ok(())
}
