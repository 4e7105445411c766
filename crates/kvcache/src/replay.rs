//! Replay: read back and render an operation's recorded calls

use std::fmt;
use std::io::{self, Write};

use tracing::warn;

use crate::error::Result;
use crate::instrument::Operation;
use crate::store::KeyValueStore;

/// Snapshot of an operation's counter and history logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHistory {
    /// Operation name
    pub name: String,
    /// Counter text as stored, `"0"` if the operation was never called
    pub count: String,
    /// Inputs log, decoded lossily
    pub inputs: Vec<String>,
    /// Outputs log, decoded lossily
    pub outputs: Vec<String>,
}

impl CallHistory {
    /// Read the counter and both logs of `op` from its store
    pub fn load<O: Operation + ?Sized>(op: &O) -> Result<Self> {
        let id = op.id();
        let store = op.store();

        let count = store
            .get(id.counter_key())?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_else(|| "0".to_string());
        let inputs = decode_all(store.lrange(&id.inputs_key(), 0, -1)?);
        let outputs = decode_all(store.lrange(&id.outputs_key(), 0, -1)?);

        if inputs.len() != outputs.len() {
            warn!(
                operation = %id,
                inputs = inputs.len(),
                outputs = outputs.len(),
                "history logs differ in length, replaying common prefix"
            );
        }

        Ok(Self {
            name: id.to_string(),
            count,
            inputs,
            outputs,
        })
    }

    /// Paired `(input, output)` records, truncated to the shorter log
    pub fn calls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .zip(&self.outputs)
            .map(|(input, output)| (input.as_str(), output.as_str()))
    }
}

impl fmt::Display for CallHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.name, self.count)?;
        for (input, output) in self.calls() {
            writeln!(f, "{}(*{}) -> {}", self.name, input, output)?;
        }
        Ok(())
    }
}

/// Print the call history of `op` to stdout
pub fn replay<O: Operation + ?Sized>(op: &O) -> Result<()> {
    let stdout = io::stdout();
    replay_to(op, &mut stdout.lock())
}

/// Write the call history of `op` to `out`
pub fn replay_to<O, W>(op: &O, out: &mut W) -> Result<()>
where
    O: Operation + ?Sized,
    W: Write + ?Sized,
{
    let history = CallHistory::load(op)?;
    write!(out, "{}", history)?;
    out.flush()?;
    Ok(())
}

fn decode_all(entries: Vec<Vec<u8>>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| String::from_utf8_lossy(&entry).into_owned())
        .collect()
}
