//! Line-oriented console source feeding integers into a pipeline.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::stage::{emit, spawn_worker};
use crossbeam::channel::{bounded, Receiver};
use std::io::{BufRead, Write};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Line that stops the source, compared case-insensitively
pub const EXIT_SENTINEL: &str = "exit";

/// Classification of one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Value(i64),
    Exit,
    Invalid(String),
}

/// Classify a raw input line. Surrounding whitespace is ignored.
pub fn parse_line(line: &str) -> InputLine {
    let line = line.trim();
    if line.eq_ignore_ascii_case(EXIT_SENTINEL) {
        return InputLine::Exit;
    }
    match line.parse::<i64>() {
        Ok(value) => InputLine::Value(value),
        Err(_) => InputLine::Invalid(line.to_string()),
    }
}

/// Start a thread reading `reader` line by line.
///
/// Integers are handed to the returned stream. Other lines get a rejection
/// message on `console` and are skipped. The sentinel, end of input, or a read
/// error fires `cancel`, which is how the rest of the pipeline learns that
/// input is over.
pub fn spawn_line_source<R, W>(
    reader: R,
    mut console: W,
    cancel: CancellationToken,
) -> Result<(Receiver<i64>, JoinHandle<()>)>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let (tx, rx) = bounded(0);
    let handle = spawn_worker("source", "reader", move || {
        announce(&mut console, "Enter integers to feed into the pipeline:");
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    break;
                }
            };
            match parse_line(&line) {
                InputLine::Value(value) => {
                    if !emit(&cancel, &tx, value) {
                        debug!("source stopped before end of input");
                        return;
                    }
                }
                InputLine::Exit => break,
                InputLine::Invalid(raw) => {
                    warn!(line = %raw, "rejected non-integer input");
                    announce(&mut console, &format!("Only integers are accepted, got {raw:?}"));
                }
            }
        }
        announce(&mut console, "Shutting down.");
        cancel.cancel();
    })?;
    Ok((rx, handle))
}

/// Write one line for the user. Console failures are logged, never fatal.
fn announce<W: Write>(console: &mut W, message: &str) {
    if let Err(e) = writeln!(console, "{message}").and_then(|()| console.flush()) {
        warn!(error = %e, "failed to write to console");
    }
}
