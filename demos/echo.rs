//! Echo gate.
//!
//! Demonstrates:
//! - Spawning a gate service behind a `GateHandle`
//! - Opening a raw TCP or WebSocket listener
//! - Echoing every message back to its session
//! - Kicking a session on request and shutting down on Ctrl+C
//!
//! Usage:
//!   cargo run --example echo
//!   cargo run --example echo -- --addr 0.0.0.0:9000
//!   cargo run --example echo -- --path /ws
//!   cargo run --example echo -- --max-clients 4 --debug
//!
//! A client that sends `bye` is kicked.

// ============================================================================
// Imports
// ============================================================================

use actor_gate::{Gate, GateConfig, GateEvent, GateHandle, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    addr: String,
    path: Option<String>,
    max_clients: u32,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            addr: value("--addr").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            path: value("--path"),
            max_clients: value("--max-clients")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "actor_gate=trace" } else { "actor_gate=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Echo Gate ===\n");

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let gate = GateHandle::spawn(Gate::new(events_tx));

    let mut config = GateConfig::new(args.addr).with_max_clients(args.max_clients);
    if let Some(path) = args.path {
        config = config.with_path(path);
    }
    let transport = config.transport();

    gate.open(config).await?;

    if let Some(addr) = gate.gate().local_addr() {
        println!("    ✓ Listening on {addr} ({transport:?})");
    }
    println!("Press Ctrl+C to exit...\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => {
                let Some(event) = event else { break };
                if let Err(e) = handle_event(&gate, event).await {
                    eprintln!("[warn]    {e}");
                }
            }
        }
    }

    gate.shutdown().await?;
    println!("\n    ✓ Gate shut down");
    Ok(())
}

async fn handle_event(gate: &GateHandle, event: GateEvent) -> Result<()> {
    match event {
        GateEvent::OnOpen { session } => println!("[open]    {session}"),

        GateEvent::OnMessage { session, payload } => {
            println!("[message] {session}: {}", String::from_utf8_lossy(&payload));
            if payload == b"bye" {
                gate.kick(session).await?;
            } else {
                gate.write(session, payload).await?;
            }
        }

        GateEvent::OnClose {
            session,
            code,
            reason,
        } => println!("[close]   {session}: {code} {}", String::from_utf8_lossy(&reason)),

        GateEvent::OnPong { session, .. } => println!("[pong]    {session}"),
    }
    Ok(())
}
