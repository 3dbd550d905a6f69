//! Console consumer printing every value that leaves the pipeline.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crossbeam::channel::{select, Receiver};
use std::io::Write;
use tracing::debug;

/// Print each value from `input` on its own line until cancellation fires or
/// the stream closes. Returns the number of values printed.
pub fn consume<W: Write>(
    cancel: &CancellationToken,
    input: &Receiver<i64>,
    mut writer: W,
) -> Result<u64> {
    let mut printed = 0;
    while !cancel.is_cancelled() {
        select! {
            recv(input) -> msg => {
                let Ok(value) = msg else { break };
                writeln!(writer, "Received: {value}")?;
                writer.flush()?;
                printed += 1;
            }
            recv(cancel.signal()) -> _ => break,
        }
    }
    debug!(printed, "consumer stopped");
    Ok(printed)
}
