//! Accept loop and per-connection request handling

use std::sync::Arc;

use anyhow::Result;
use bytes::BytesMut;
use kvcache::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::handler::CommandHandler;
use crate::resp::Frame;

/// Serve RESP clients on `listener` until the task is dropped
///
/// All connections share `store`.
pub async fn serve(listener: TcpListener, store: Arc<MemoryStore>) -> Result<()> {
    let handler = Arc::new(CommandHandler::new(store));
    info!("Server listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, handler).await {
                        error!("Error handling client {}: {}", addr, e);
                    }
                    info!("Connection closed: {}", addr);
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, handler: Arc<CommandHandler>) -> Result<()> {
    let mut input = BytesMut::with_capacity(4096);
    let mut output = BytesMut::with_capacity(4096);

    loop {
        if stream.read_buf(&mut input).await? == 0 {
            return Ok(());
        }

        // Answer every complete frame, then wait for more bytes
        loop {
            match Frame::parse(&mut input) {
                Ok(Some(frame)) => handler.handle(frame).encode(&mut output),
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error: {}", e);
                    Frame::err(e).encode(&mut output);
                    input.clear();
                    break;
                }
            }
        }

        if !output.is_empty() {
            stream.write_all(&output).await?;
            output.clear();
        }
    }
}
