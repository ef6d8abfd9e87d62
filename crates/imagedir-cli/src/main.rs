//! `imagedir` – interactive shell for the image-dir camera.
//!
//! This binary:
//!
//! 1. Installs tracing (console, optionally OTLP) via [`telemetry`].
//! 2. Loads `~/.imagedir/config.toml` (or `$IMAGEDIR_CONFIG`), applying
//!    `IMAGEDIR_*` environment overrides.
//! 3. Registers the image-dir model and configures one camera instance.
//! 4. Drops the user into a REPL of slash-commands (`/next`, `/jog`, `/set`,
//!    `/images`, `/reload`, `/help`, …).
//! 5. Intercepts **Ctrl-C** to leave the loop cleanly.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

fn main() {
    let _guard = telemetry::init_tracing("imagedir");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = match config::load() {
        Ok(cfg) => {
            println!(
                "  Config: {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            std::process::exit(1);
        }
    };

    let shell = repl::Shell::new(runtime, cfg);

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(shutdown, shell);
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "imagedir".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Directory-backed virtual camera");
    println!();
}
