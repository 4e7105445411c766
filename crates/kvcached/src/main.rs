//! kvcache daemon - in-memory Redis-compatible RESP server

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kvcache::MemoryStore;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    bind: String,

    /// Health check mode: exit 0 if a server answers on the bind address
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.health {
        match TcpStream::connect(&args.bind).await {
            Ok(_) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(_) => {
                eprintln!("FAILED");
                std::process::exit(1);
            }
        }
    }

    info!("Starting kvcached v{}", env!("CARGO_PKG_VERSION"));

    let listener = TcpListener::bind(&args.bind).await?;
    println!("kvcached ready: redis://{}/", args.bind);
    println!("Press Ctrl+C to stop");

    tokio::select! {
        result = kvcached::serve(listener, Arc::new(MemoryStore::new())) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
