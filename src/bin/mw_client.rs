//! Minimal community client: connect, log in, print every state change, and
//! stay logged in until the server hangs up or Ctrl-C.
//!
//! ```text
//! mw-client <server> <userid> <password>
//! ```
//!
//! Settings beyond the three arguments come from the TOML file named by
//! `MEANWHILE_CONFIG` (if set) and `MEANWHILE_*` environment overrides.

use meanwhile::config::ClientConfig;
use meanwhile::error::Result;
use meanwhile::session::{SessionHandler, SessionState, StateInfo};
use meanwhile::transport::tcp;
use meanwhile::utils::logging::init_logging;
use std::process::ExitCode;
use tracing::error;

fn usage(program: &str) {
    eprintln!("Usage: {program} <server> <userid> <password>");
    eprintln!();
    eprintln!("Connects to <server> on port {}", meanwhile::config::DEFAULT_PORT);
    eprintln!("and logs in as <userid>.");
}

fn load_config(server: &str) -> Result<ClientConfig> {
    let mut config = match std::env::var("MEANWHILE_CONFIG") {
        Ok(path) => ClientConfig::from_file(path)?,
        Err(_) => ClientConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.connection.server_host = server.to_string();
    config.validate_strict()?;
    Ok(config)
}

fn print_state(state: SessionState, info: &StateInfo) {
    match info {
        StateInfo::Redirect { host, port } => match port {
            Some(port) => eprintln!("{} -> {host}:{port}", state.description()),
            None => eprintln!("{} -> {host}", state.description()),
        },
        StateInfo::Stopping { reason } => eprintln!("{} ({reason:?})", state.description()),
        StateInfo::None => eprintln!("{}", state.description()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        usage(args.first().map(String::as_str).unwrap_or("mw-client"));
        return ExitCode::FAILURE;
    }

    let config = match load_config(&args[1]) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{e}");
    }

    let handler = SessionHandler::new()
        .on_state_change(print_state)
        .on_admin(|text| eprintln!("Admin: {text}"));

    match tcp::run_client(&config, &args[2], &args[3], handler).await {
        Ok(summary) => match summary.last_error {
            Some(reason) => {
                error!(%reason, "Session ended with an error");
                ExitCode::FAILURE
            }
            None => ExitCode::SUCCESS,
        },
        Err(e) => {
            error!(error = %e, "Client failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
