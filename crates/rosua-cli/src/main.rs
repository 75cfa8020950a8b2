//! `rosua-cli` – robot-graph to address-space mirror daemon.
//!
//! This binary is the entry point for rosua.  It:
//!
//! 1. Loads `~/.rosua/config.toml`, writing the defaults on first run.
//! 2. Connects to the robot graph through rosbridge and resolves the scope
//!    policy (graph parameters win over the config file's lists).
//! 3. Starts the address-space browse server and the liveness sweeper.
//! 4. Drives the reconciliation loop until **Ctrl-C** requests shutdown.

mod config;
mod params;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use rosua_graph::{GraphSource, LivenessSweeper, RosbridgeGraph};
use rosua_space::{InMemorySpace, SpaceServer, shared};
use rosua_sync::{Reconciler, ReconcilerConfig};

#[tokio::main]
async fn main() {
    // Hold the telemetry guard for the whole process so pending spans are
    // flushed on exit.
    let _telemetry = rosua_sync::telemetry::init_tracing("rosua");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = shutdown.clone();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – initiating graceful shutdown …"
                .yellow()
                .bold()
        );
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Robot graph connection ────────────────────────────────────────────
    print!("\n  Connecting to rosbridge at {} … ", cfg.rosbridge_url.dimmed());
    let graph: Arc<dyn GraphSource> = match RosbridgeGraph::connect(&cfg.rosbridge_url).await {
        Ok(g) => {
            println!("{}", "online".green());
            Arc::new(g)
        }
        Err(e) => {
            println!("{}", "offline".red());
            error!(error = %e, url = %cfg.rosbridge_url, "rosbridge connection failed");
            std::process::exit(1);
        }
    };

    // ── Scope policy ──────────────────────────────────────────────────────
    let scope = params::scope_from(graph.as_ref(), &cfg.filters).await;
    let namespace_root = params::namespace_root_from(graph.as_ref(), &cfg.namespace_root).await;

    // ── Address space + reconciler ────────────────────────────────────────
    let space = shared(InMemorySpace::new());
    let reconciler_config = ReconcilerConfig {
        scan_interval: Duration::from_secs(cfg.scan_interval_secs),
        namespace_root,
    };
    let reconciler = match Reconciler::new(
        Arc::clone(&graph),
        Arc::clone(&space),
        scope,
        reconciler_config,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "address-space bootstrap failed");
            std::process::exit(1);
        }
    };

    // ── Browse server ─────────────────────────────────────────────────────
    let server = match SpaceServer::new(Arc::clone(&space)).start(&cfg.endpoint).await {
        Ok(handle) => {
            println!(
                "  Browse server listening on {}\n",
                handle.local_addr().to_string().bold()
            );
            handle
        }
        Err(e) => {
            error!(error = %e, endpoint = %cfg.endpoint, "browse server failed to start");
            std::process::exit(1);
        }
    };

    // ── Liveness sweeper ──────────────────────────────────────────────────
    let sweeper = LivenessSweeper::new(Arc::clone(&graph));
    let sweep_shutdown = shutdown.clone();
    let sweep_interval = Duration::from_secs(cfg.sweep_interval_secs);
    let sweep_task = tokio::spawn(async move {
        while !sweep_shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(sweep_interval).await;
            match sweeper.sweep().await {
                Ok(report) => info!(
                    reachable = report.reachable,
                    purged = report.purged,
                    "liveness sweep complete"
                ),
                Err(e) => warn!(error = %e, "liveness sweep failed"),
            }
        }
    });

    // ── Reconciliation loop (runs until shutdown) ─────────────────────────
    reconciler.run(shutdown).await;

    sweep_task.abort();
    server.stop();
    println!("{}", "  ✓ Exiting rosua.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"                          "#.bold().cyan());
    println!("{}", r#"   _______  ___ __ _____ _"#.bold().cyan());
    println!("{}", r#"  / __/ _ \(_-</ // / _ `/"#.bold().cyan());
    println!("{}", r#" /_/  \___/___/\_,_/\_,_/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "rosua".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot graph to address-space mirror");
    println!();
}
