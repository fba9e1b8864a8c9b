//! CLI smoke and demo entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `softdel_core` linkage.
//! - Run the delete/undelete walkthrough against a demo schema.
//!
//! # Configuration
//! - `SOFTDEL_DB_PATH`: database file; in-memory when unset.
//! - `SOFTDEL_LOG_DIR` / `SOFTDEL_LOG_LEVEL`: enable file logging.

mod demo;

use softdel_core::{init_logging, open_db, open_db_in_memory, LogConfig};
use std::process::ExitCode;

const DB_PATH_ENV: &str = "SOFTDEL_DB_PATH";

fn main() -> ExitCode {
    let command = std::env::args().nth(1).unwrap_or_else(|| "ping".to_string());

    if let Some(config) = LogConfig::from_env() {
        if let Err(err) = init_logging(&config) {
            eprintln!("softdel logging disabled: {err}");
        }
    }

    match command.as_str() {
        "ping" => {
            println!("softdel_core ping={}", softdel_core::ping());
            println!("softdel_core version={}", softdel_core::core_version());
            ExitCode::SUCCESS
        }
        "demo" => match run_demo() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("demo failed: {err}");
                ExitCode::FAILURE
            }
        },
        other => {
            eprintln!("unknown command `{other}`; expected ping|demo");
            ExitCode::from(2)
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let conn = match std::env::var(DB_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => open_db(path, demo::MIGRATIONS)?,
        _ => open_db_in_memory(demo::MIGRATIONS)?,
    };

    for step in demo::walkthrough(&conn)? {
        println!("{}", serde_json::to_string(&step)?);
    }
    Ok(())
}
