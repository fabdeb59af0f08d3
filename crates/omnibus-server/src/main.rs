// crates/omnibus-server/src/main.rs
// ============================================================================
// Module: Server Binary
// Description: Entry point for the omnibus HTTP server.
// Purpose: Load configuration, assemble the server, and run it.
// Dependencies: omnibus-config, omnibus-server, tokio
// ============================================================================

//! ## Overview
//! The binary accepts an optional config path argument; otherwise the
//! `OMNIBUS_CONFIG` environment variable and the default filename apply.
//! Startup failures exit non-zero with a single diagnostic line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use omnibus_config::OmnibusConfig;
use omnibus_server::OmnibusServer;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Loads config and runs the server.
#[tokio::main]
#[allow(clippy::print_stderr, reason = "Startup diagnostics go to stderr.")]
async fn main() -> ExitCode {
    let config_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = match OmnibusConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let server = match OmnibusServer::from_config(config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("startup error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = server.serve().await {
        eprintln!("server error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
