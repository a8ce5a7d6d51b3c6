//! Courier deduplication store inspector
//!
//! Opens (and if needed migrates) a deduplication database and reports on it.
//!
//! Usage:
//!   courier-dedup --stats                        # Row and marker counts
//!   courier-dedup --lookup <KEY>                 # Show the record for one key
//!   courier-dedup --db-path <PATH> --stats       # Use a specific database

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use courier_core::{DedupConfig, DedupService, DeduplicationKey, MessageIdentifier};

fn print_usage() {
    println!("Courier Deduplication Store v0.1.0");
    println!();
    println!("Usage:");
    println!("  courier-dedup --stats                   Show processed message counts");
    println!("  courier-dedup --lookup <KEY>            Show the durable record for a key");
    println!();
    println!("Options:");
    println!("  --db-path <PATH>            Database path (default: courier_dedup.db)");
    println!("  --help, -h                  Show this help");
    println!();
    println!("Opening a database written by an older release upgrades its schema.");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                    Set log level (e.g., info, debug)");
}

async fn lookup(service: &DedupService, raw_key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = DeduplicationKey::new(raw_key)?;

    if let Ok(id) = raw_key.parse::<MessageIdentifier>() {
        println!("type:      {:?}", id.message_type);
        println!("shard:     {}", id.shard_id);
        println!("session:   {}", id.session_id);
        println!("position:  {}", id.sequence_number);
    }

    match service.lookup(&key).await? {
        Some(meta) => {
            println!("key:                  {}", key);
            println!("inserted at:          {}", meta.insertion_time);
            match (meta.sender_scope(), meta.sequence_number()) {
                (Some(scope), Some(seq)) => {
                    println!("sender scope:         {}", scope);
                    println!("sequence number:      {}", seq);
                }
                _ => println!("sender scope:         (none)"),
            }
            match meta.last_sequence_number {
                Some(last) => println!("last sequence number: {}", last),
                None => println!("last sequence number: (none)"),
            }
            println!("version:              {}", meta.version);
        }
        None => println!("{}: not processed", key),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let show_stats = args.iter().any(|a| a == "--stats");

    let db_path: PathBuf = args
        .windows(2)
        .find(|w| w[0] == "--db-path")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from(courier_core::protocol::DEFAULT_DB_PATH));

    let lookup_key: Option<String> = args
        .windows(2)
        .find(|w| w[0] == "--lookup")
        .map(|w| w[1].clone());

    if show_help || (!show_stats && lookup_key.is_none()) {
        print_usage();
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let service = match DedupService::start(DedupConfig::new().with_db_path(db_path)) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if show_stats {
        match service.stats().await {
            Ok(stats) => println!("{}", stats),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(raw_key) = lookup_key {
        if let Err(e) = lookup(&service, &raw_key).await {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    service.close();
    ExitCode::SUCCESS
}
