//! Ping a native host and run one analysis.
//!
//! Demonstrates:
//! - Building a bridge for a registered native host or a manifest file
//! - Subscribing to host broadcasts
//! - Health check and ping
//! - Streaming progress while an error is analyzed
//!
//! Usage:
//!   cargo run --example ping_host
//!   cargo run --example ping_host -- --debug
//!   cargo run --example ping_host -- --host com.dynamics.helper.native
//!   cargo run --example ping_host -- --manifest ./com.dynamics.helper.native.json
//!   cargo run --example ping_host -- --websocket ws://127.0.0.1:8765
//!   cargo run --example ping_host -- --analyze "System.NullReferenceException"

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use native_host_bridge::{AnalyzeErrorParams, Bridge, DEFAULT_HOST_NAME, Result, protocol::kind};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const ORIGIN: &str = "chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    host: Option<String>,
    manifest: Option<String>,
    websocket: Option<String>,
    analyze: Option<String>,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            host: value_of("--host"),
            manifest: value_of("--manifest"),
            websocket: value_of("--websocket"),
            analyze: value_of("--analyze"),
        }
    }
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
    println!("=== Ping Host ===\n");

    // ========================================================================
    // Create Bridge
    // ========================================================================

    println!("[1] Creating bridge...");

    let builder = Bridge::builder().request_timeout(Duration::from_secs(120));
    let builder = if let Some(url) = &args.websocket {
        println!("    WebSocket: {url}");
        builder.websocket(url)
    } else if let Some(path) = &args.manifest {
        println!("    Manifest: {path}");
        builder.manifest(path).origin(ORIGIN)
    } else {
        let name = args.host.as_deref().unwrap_or(DEFAULT_HOST_NAME);
        println!("    Host: {name}");
        builder.host_name(name).origin(ORIGIN)
    };
    let bridge = builder.build()?;

    let _updates = bridge.on_broadcast(kind::UPDATE_AVAILABLE, |payload| {
        println!("    [broadcast] update available: {payload}");
    });

    println!("    ✓ Bridge ready\n");

    // ========================================================================
    // Ping
    // ========================================================================

    println!("[2] Pinging host...");

    bridge.connect().await?;
    println!("    State: {}", bridge.state());

    let pong = bridge.ping().await?;
    println!("    ✓ Reply: {pong}\n");

    // ========================================================================
    // Health
    // ========================================================================

    println!("[3] Checking health...");

    let health = bridge.health_check().await?;
    let mark = if health.is_healthy() { "✓" } else { "✗" };
    println!("    {mark} {}: {}\n", health.status, health.message);

    // ========================================================================
    // Analyze
    // ========================================================================

    if let Some(text) = args.analyze {
        println!("[4] Analyzing error...");

        let analysis = bridge
            .analyze_error_with_progress(AnalyzeErrorParams::new(text), |step| {
                println!("    ... {step}");
            })
            .await?;

        println!("    ✓ Analysis received");
        if let Some(path) = &analysis.saved_to {
            println!("    Saved to: {path}");
        }
        println!("\n{}\n", analysis.markdown);
    }

    bridge.close();
    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "native_host_bridge=debug"
    } else {
        "native_host_bridge=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
