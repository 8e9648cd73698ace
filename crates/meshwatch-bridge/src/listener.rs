//! Supervision of the upstream mesh monitor process.
//!
//! The monitor prints human-readable blocks to stdout. This module spawns
//! it, decodes its output into text, feeds that text to a
//! [`RecordParser`], and applies every completed record through the hub.
//!
//! The parser only finalises a block when the next header arrives or the
//! stream ends, so the last block of a burst would otherwise sit in the
//! parser until more output shows up. After `flush_idle_ms` of silence the
//! open block is flushed.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use meshwatch_core::RecordParser;
use meshwatch_core::config::ListenerSettings;
use meshwatch_observer::AppState;
use meshwatch_types::Record;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::error::BridgeError;

/// Bytes requested per read from the monitor's stdout.
const READ_BUFFER_BYTES: usize = 8192;

/// Spawn the monitor and relay its output until it exits.
///
/// Returns the exit status once stdout has closed and the final block has
/// been applied.
///
/// # Errors
///
/// Returns [`BridgeError::Spawn`] if the program cannot be started and
/// [`BridgeError::Wait`] if its exit status cannot be collected.
pub async fn run(
    settings: &ListenerSettings,
    state: Arc<AppState>,
) -> Result<ExitStatus, BridgeError> {
    info!(program = %settings.program, args = ?settings.args, "Starting listener");

    let mut child = Command::new(&settings.program)
        .args(&settings.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BridgeError::Spawn {
            program: settings.program.clone(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(BridgeError::Pipe { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(BridgeError::Pipe { stream: "stderr" })?;

    let stderr_task = tokio::spawn(log_stderr(stderr));

    let idle = (settings.flush_idle_ms > 0)
        .then(|| Duration::from_millis(settings.flush_idle_ms));
    relay(stdout, idle, &state).await;

    let status = child
        .wait()
        .await
        .map_err(|source| BridgeError::Wait { source })?;
    if stderr_task.await.is_err() {
        debug!("Listener stderr task ended abnormally");
    }

    if status.success() {
        info!(%status, "Listener exited");
    } else {
        warn!(%status, "Listener exited with failure");
    }
    Ok(status)
}

/// Read `source` to the end, applying every record it yields.
///
/// With `idle` set, the block in progress is flushed once no output has
/// arrived for that long.
pub async fn relay<R>(mut source: R, idle: Option<Duration>, state: &AppState)
where
    R: AsyncRead + Unpin,
{
    let mut parser = RecordParser::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0_u8; READ_BUFFER_BYTES];

    loop {
        let flush_after = idle.filter(|_| parser.has_pending());
        tokio::select! {
            read = source.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        pending.extend_from_slice(buf.get(..n).unwrap_or_default());
                        let text = take_complete_lines(&mut pending);
                        if text.is_empty() {
                            continue;
                        }
                        debug!(bytes = text.len(), "Listener output: {}", text.trim_end());
                        for record in parser.feed(&text) {
                            apply(state, record).await;
                        }
                    }
                    Err(e) => {
                        warn!("Listener stdout read failed: {e}");
                        break;
                    }
                }
            }
            () = tokio::time::sleep(flush_after.unwrap_or_default()), if flush_after.is_some() => {
                if let Some(record) = parser.flush() {
                    debug!("Flushing idle record");
                    apply(state, record).await;
                }
            }
        }
    }

    let tail = String::from_utf8_lossy(&pending);
    let mut records = parser.feed(&tail);
    records.extend(parser.close());
    for record in records {
        apply(state, record).await;
    }
}

/// Apply one parsed record, logging the outcome.
async fn apply(state: &AppState, record: Record) {
    let kind = record.kind();
    let node = record.node_id().cloned();
    match state.ingest(record).await {
        Ok(event) => info!(
            %kind,
            node = state.aliases().display_optional(node.as_ref()),
            event = event.name(),
            "Record relayed"
        ),
        Err(reason) => debug!(%kind, %reason, "Record dropped"),
    }
}

/// Log each stderr line of the monitor.
async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => warn!(target: "meshwatch_bridge::listener::stderr", "{line}"),
            Ok(None) => return,
            Err(e) => {
                debug!("Listener stderr read failed: {e}");
                return;
            }
        }
    }
}

/// Remove and decode every complete line from `pending`.
///
/// Bytes after the last newline stay buffered so that a multi-byte
/// character split across reads is decoded whole.
fn take_complete_lines(pending: &mut Vec<u8>) -> String {
    let Some(last_newline) = pending.iter().rposition(|&b| b == b'\n') else {
        return String::new();
    };
    let complete: Vec<u8> = pending.drain(..=last_newline).collect();
    String::from_utf8_lossy(&complete).into_owned()
}
