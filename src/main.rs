//! db-driver - command-line entry point.
//!
//! Connects to a MySQL or PostgreSQL database through the driver registry,
//! runs each SQL argument in order and prints result sets, update counts and
//! generated keys.

use clap::Parser;
use db_driver::config::Config;
use db_driver::db::{DriverManager, ResultSet, Statement};
use db_driver::error::DriverResult;
use db_driver::models::GeneratedKeysMode;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only results.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_rows(rs: &ResultSet, as_json: bool) {
    if as_json {
        let labels: Vec<&str> = rs.columns().iter().map(|c| c.label.as_str()).collect();
        println!("{}", json!({ "columns": labels, "rows": rs.rows() }));
        return;
    }

    let header: Vec<&str> = rs.columns().iter().map(|c| c.label.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in rs.rows() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows)", rs.row_count());
}

fn print_update(stmt: &Statement, as_json: bool) {
    let keys = stmt.generated_keys();
    if as_json {
        let keys = keys.as_ref().map(|k| k.rows());
        println!(
            "{}",
            json!({ "update_count": stmt.update_count(), "generated_keys": keys })
        );
        return;
    }

    println!("{} rows affected", stmt.update_count());
    if let Some(keys) = keys {
        print_rows(&keys, false);
    }
}

async fn run_statement(stmt: &mut Statement, sql: &str, config: &Config) -> DriverResult<()> {
    let mode = if config.generated_keys {
        GeneratedKeysMode::Return
    } else {
        GeneratedKeysMode::None
    };

    if stmt.execute_with_keys(sql, mode).await? {
        if let Some(rs) = stmt.result_set() {
            print_rows(&rs, config.json);
        }
    } else {
        print_update(stmt, config.json);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    info!("Starting db-driver v{}", env!("CARGO_PKG_VERSION"));

    let connection = DriverManager::connect(&config.url, config.credentials()).await?;
    let mut stmt = connection.create_statement()?;

    let mut failed = None;
    for sql in &config.statements {
        if let Err(e) = run_statement(&mut stmt, sql, &config).await {
            error!(error = %e, sql = %sql, "Statement failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            failed = Some(e);
            break;
        }
    }

    connection.close().await?;

    match failed {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
