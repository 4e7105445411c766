//! Command dispatch for the RESP server

use std::str::FromStr;
use std::sync::Arc;

use kvcache::{Error, KeyValueStore, MemoryStore};
use tracing::debug;

use crate::resp::Frame;

/// Executes parsed commands against a shared [`MemoryStore`]
pub struct CommandHandler {
    store: Arc<MemoryStore>,
}

impl CommandHandler {
    /// Create a handler over `store`
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Execute one request frame and produce the reply
    pub fn handle(&self, frame: Frame) -> Frame {
        let args = match frame.into_command() {
            Some(args) => args,
            None => return Frame::err("invalid command format"),
        };

        let command = String::from_utf8_lossy(&args[0]).to_uppercase();
        let args = &args[1..];
        debug!(%command, argc = args.len(), "command");

        match command.as_str() {
            "PING" => self.handle_ping(args),
            "ECHO" => self.handle_echo(args),
            "SET" => self.handle_set(args),
            "GET" => self.handle_get(args),
            "INCR" => self.handle_incr(args),
            "INCRBY" => self.handle_incrby(args),
            "RPUSH" => self.handle_rpush(args),
            "LRANGE" => self.handle_lrange(args),
            "DEL" => self.handle_del(args),
            "EXISTS" => self.handle_exists(args),
            "DBSIZE" => Frame::Integer(self.store.len() as i64),
            "FLUSHDB" => reply(self.store.flushdb().map(|()| Frame::ok())),
            // client handshake and tooling probes
            "CLIENT" | "SELECT" => Frame::ok(),
            "COMMAND" => Frame::Array(Some(vec![])),
            _ => Frame::err(format!("unknown command '{}'", command)),
        }
    }

    fn handle_ping(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [] => Frame::Simple("PONG".to_string()),
            [message] => Frame::bulk(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    fn handle_echo(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [message] => Frame::bulk(message.clone()),
            _ => wrong_arity("echo"),
        }
    }

    fn handle_set(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [key, value] => reply(
                self.store.set_raw(key, value).map(|()| Frame::ok()),
            ),
            _ => wrong_arity("set"),
        }
    }

    fn handle_get(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [key] => reply(self.store.get_raw(key).map(Frame::Bulk)),
            _ => wrong_arity("get"),
        }
    }

    fn handle_incr(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [key] => reply(self.store.incr_raw(key).map(Frame::Integer)),
            _ => wrong_arity("incr"),
        }
    }

    fn handle_incrby(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [key, delta] => match parse_int(delta) {
                Some(delta) => reply(
                    self.store
                        .incr_by_raw(key, delta)
                        .map(Frame::Integer),
                ),
                None => Frame::err("value is not an integer or out of range"),
            },
            _ => wrong_arity("incrby"),
        }
    }

    fn handle_rpush(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [key, values @ ..] if !values.is_empty() => reply(
                self.store
                    .rpush_all(key, values)
                    .map(|len| Frame::Integer(len as i64)),
            ),
            _ => wrong_arity("rpush"),
        }
    }

    fn handle_lrange(&self, args: &[Vec<u8>]) -> Frame {
        let (key, start, stop) = match args {
            [key, start, stop] => (key, start, stop),
            _ => return wrong_arity("lrange"),
        };

        let (start, stop) = match (parse_int(start), parse_int(stop)) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Frame::err("value is not an integer or out of range"),
        };

        reply(self.store.lrange_raw(key, start, stop).map(|items| {
            Frame::Array(Some(items.into_iter().map(Frame::bulk).collect()))
        }))
    }

    fn handle_del(&self, args: &[Vec<u8>]) -> Frame {
        if args.is_empty() {
            return wrong_arity("del");
        }
        let deleted = args
            .iter()
            .filter(|key| self.store.delete(key))
            .count();
        Frame::Integer(deleted as i64)
    }

    fn handle_exists(&self, args: &[Vec<u8>]) -> Frame {
        if args.is_empty() {
            return wrong_arity("exists");
        }
        let present = args
            .iter()
            .filter(|key| self.store.contains_key(key))
            .count();
        Frame::Integer(present as i64)
    }
}

fn parse_int<T: FromStr>(raw: &[u8]) -> Option<T> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn wrong_arity(command: &str) -> Frame {
    Frame::err(format!("wrong number of arguments for '{}' command", command))
}

fn reply(result: kvcache::Result<Frame>) -> Frame {
    result.unwrap_or_else(|e| error_frame(&e))
}

fn error_frame(err: &Error) -> Frame {
    match err {
        Error::WrongType { .. } => Frame::Error(
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        ),
        Error::NotAnInteger { .. } => Frame::err("value is not an integer or out of range"),
        other => Frame::err(other),
    }
}
