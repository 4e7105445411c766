//! kvc - store, read and replay values through kvcache

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kvcache::{replay, Cache, Operation, Payload, RedisStore};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store URL
    #[arg(short, long, env = "KVCACHE_URL", default_value = "redis://127.0.0.1:6379/")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a value under a new key and print the key
    Store {
        /// Value to store
        value: String,

        /// How to interpret the value
        #[arg(short, long, value_enum, default_value_t = Kind::Text)]
        kind: Kind,
    },
    /// Print the value stored under a key
    Get {
        /// Key returned by `store`
        key: String,

        /// How to decode the stored bytes
        #[arg(long = "as", value_enum, default_value_t = Decode::String)]
        decode: Decode,
    },
    /// Print the recorded calls of `store`
    Replay,
    /// Remove every key from the store
    Flush,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Text,
    Int,
    Float,
    /// Hex-encoded bytes
    Hex,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Decode {
    Raw,
    String,
    Int,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    debug!(url = %args.url, "connecting");

    let store = RedisStore::open(&args.url)
        .with_context(|| format!("failed to connect to {}", args.url))?;
    let cache = Cache::new(Arc::new(store));

    match args.command {
        Command::Store { value, kind } => {
            let payload = parse_payload(&value, kind)?;
            let key = cache.instrumented_store().call(payload)?;
            println!("{}", key);
        }
        Command::Get { key, decode } => {
            let rendered = match decode {
                Decode::Raw => cache
                    .get(&key)?
                    .map(|raw| Payload::Binary(raw).repr()),
                Decode::String => cache.get_as_string(&key)?,
                Decode::Int => cache.get_as_integer(&key)?.map(|n| n.to_string()),
            };
            println!("{}", rendered.as_deref().unwrap_or("(nil)"));
        }
        Command::Replay => replay(&cache.instrumented_store())?,
        Command::Flush => cache.flush()?,
    }

    Ok(())
}

fn parse_payload(value: &str, kind: Kind) -> Result<Payload> {
    Ok(match kind {
        Kind::Text => Payload::from(value),
        Kind::Int => Payload::Integer(
            value
                .parse()
                .with_context(|| format!("'{}' is not an integer", value))?,
        ),
        Kind::Float => Payload::Float(
            value
                .parse()
                .with_context(|| format!("'{}' is not a number", value))?,
        ),
        Kind::Hex => Payload::Binary(decode_hex(value)?),
    })
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    if value.len() % 2 != 0 {
        anyhow::bail!("hex value must have an even number of digits");
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            value
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .with_context(|| format!("invalid hex digits at offset {}", i))
        })
        .collect()
}
