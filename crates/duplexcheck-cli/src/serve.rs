//! Test a single line-oriented TCP connection against a script
//!
//! ```text
//! ┌──────────────┐  lines  ┌─────────────┐  deliver  ┌──────────────┐
//! │ TCP peer     │ ──────▶ │ read task   │ ────────▶ │              │
//! │ (under test) │         └─────────────┘           │   Tester     │
//! │              │  lines  ┌─────────────┐   mpsc    │ (blocking    │
//! │              │ ◀────── │ write task  │ ◀──────── │  run thread) │
//! └──────────────┘         └─────────────┘           └──────────────┘
//! ```
//!
//! The tester is synchronous: `run` gets its own thread and every `deliver`
//! goes through `spawn_blocking`. Deliveries are awaited one at a time, which
//! keeps them serialized in the order the lines arrived.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use duplexcheck_core::{
    LogLevel, StreamHandler, Tester, TesterConfig, TesterState, Transcript, Verdict,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::script_file::ScriptFile;

const BANNER: &str = "\
Starting duplexcheck test\r
Try interacting with the console to see how each of the\r
different tests are validated...\r
";

/// Options for one `serve` session
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: SocketAddr,
    pub write_delay: Duration,
    pub log_level: LogLevel,
    pub script: ScriptFile,
}

/// What the tester asks of the socket
#[derive(Debug)]
enum Outgoing {
    Line(String),
    Close,
}

/// Forwards writes and failures to the socket's write task
struct SocketHandler {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl StreamHandler<String> for SocketHandler {
    fn fail(&self, message: &str) {
        error!("Error: {}", message);
        if self.tx.send(Outgoing::Close).is_err() {
            debug!("Write task already gone, nothing to close");
        }
    }

    fn write_to_stream(&self, input: &String) {
        if let Err(e) = self.tx.send(Outgoing::Line(input.clone())) {
            debug!(error = %e, "Write task already gone, dropping write");
        }
    }
}

/// Accept one connection on `options.bind` and test it.
///
/// `on_listening` is called with the bound address before accepting, so
/// callers binding port 0 can learn the real port.
pub async fn serve(
    options: ServeOptions,
    on_listening: impl FnOnce(SocketAddr),
) -> Result<(Verdict, Transcript)> {
    let listener = TcpListener::bind(options.bind)
        .await
        .with_context(|| format!("Failed to bind {}", options.bind))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "Listening");
    on_listening(local);

    // Only one connection is ever tested
    let (socket, peer) = listener.accept().await?;
    drop(listener);
    info!(%peer, "Got connection");

    let (read_half, mut write_half) = socket.into_split();
    write_half.write_all(BANNER.as_bytes()).await?;

    let config = TesterConfig::default()
        .with_write_delay(options.write_delay)
        .with_log_level(options.log_level);
    let tester = Arc::new(Tester::<String, String>::with_config(config));
    let (tx, rx) = mpsc::unbounded_channel();
    tester.set_handler(SocketHandler { tx: tx.clone() })?;
    options.script.apply(&tester)?;

    let writer = tokio::spawn(write_loop(write_half, rx));
    let mut reader = tokio::spawn(read_loop(read_half, Arc::clone(&tester)));

    // A plain thread rather than spawn_blocking: if the peer hangs up
    // mid-script the driver never returns, and must not hold up shutdown.
    let (done_tx, mut done_rx) = oneshot::channel();
    let driver = Arc::clone(&tester);
    std::thread::spawn(move || {
        let _ = done_tx.send(driver.run());
    });

    let verdict = tokio::select! {
        biased;
        result = &mut done_rx => result.context("Tester thread panicked")??,
        _ = &mut reader => {
            if tester.state() != TesterState::Stopped {
                bail!("Connection closed before the script finished");
            }
            done_rx.await.context("Tester thread panicked")??
        }
    };

    let _ = tx.send(Outgoing::Close);
    if let Err(e) = writer.await? {
        warn!(error = %e, "Write side closed with error");
    }
    reader.abort();

    Ok((verdict, tester.transcript()))
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) -> std::io::Result<()> {
    while let Some(outgoing) = rx.recv().await {
        match outgoing {
            Outgoing::Line(line) => {
                write_half.write_all(line.as_bytes()).await?;
                write_half.write_all(b"\r\n").await?;
            }
            Outgoing::Close => break,
        }
    }
    write_half.shutdown().await
}

async fn read_loop(read_half: OwnedReadHalf, tester: Arc<Tester<String, String>>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Socket closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Socket read failed");
                return;
            }
        };

        let tester = Arc::clone(&tester);
        match tokio::task::spawn_blocking(move || tester.deliver(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "Stopped reading");
                return;
            }
            Err(e) => {
                error!(error = %e, "Delivery thread panicked");
                return;
            }
        }
    }
}
