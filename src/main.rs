use std::sync::Arc;
use std::time::Duration;

mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = match config::Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[FATAL] Invalid configuration: {e}");
            return Err(e.into());
        }
    };

    logger::init(&cfg)?;

    // Size the runtime from the workers setting, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.workers {
        runtime_builder.worker_threads(workers.max(1));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let grace = Duration::from_secs(cfg.performance.write_timeout);

    let state = Arc::new(config::AppState::new(cfg)?);
    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &state.config);
    logger::log_info(&format!(
        "Pipeline: {}",
        state.pipeline.stage_names().join(" -> ")
    ));
    if state.assets.is_empty() {
        logger::log_warning("No critical assets cached, every request will read from disk");
    }

    let signals = Arc::new(server::SignalHandler::new(Arc::clone(&state.assets)));
    server::start_signal_handler(Arc::clone(&signals))?;

    server::run_server_loop(listener, Arc::clone(&state), Arc::clone(&signals.shutdown)).await;
    server::drain_connections(&state, grace).await;

    logger::log_shutdown();
    Ok(())
}
