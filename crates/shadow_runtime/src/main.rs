//! Shadow Engine Runtime
//!
//! Boots the module manager from `shadow.toml`, the environment and the
//! command line, then runs the main loop until quit.
//!
//! Run with: cargo run -p shadow_runtime -- -no-gui -frames 600

use std::sync::atomic::Ordering;

use shadow_runtime::{Application, BootConfig};

fn main() {
    let config = match BootConfig::load() {
        Ok(config) => config,
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level())).init();

    log::info!("Shadow Engine v{}", env!("CARGO_PKG_VERSION"));
    config.print_summary();

    let mut app = match Application::new(config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    // Install signal handler for graceful shutdown
    let running = app.running_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        running.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    app.run();
    app.shutdown();
    log::info!("Shutdown complete");
}
