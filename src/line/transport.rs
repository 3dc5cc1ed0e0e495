//! Line Transport: the paired data+signal TCP accept loop for one line.
//!
//! Each line listens once and then, in a loop, accepts exactly two
//! connections in sequence — data first, then signal — spawns reader
//! tasks that feed the shared [`Line`](super::Line) state, and re-arms
//! on disconnect of either member of the pair.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::constants::{KEEPALIVE_IDLE, KEEPALIVE_INTERVAL, KEEPALIVE_RETRIES, SIGNAL_WRITE_POLL};

use super::Line;

/// Events the transport emits about one line, consumed by the worker
/// that drives the scanner/DLSw/null-modem logic for this line.
#[derive(Debug)]
pub enum LineEvent {
    /// Both the data and signal channels are now connected.
    Connected,
    /// Either channel was lost; both have been torn down and signals reset.
    Disconnected,
}

const MAX_CHUNK: usize = 4096;

pub(crate) fn apply_keepalive(stream: &TcpStream) -> Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_IDLE)
        .with_interval(KEEPALIVE_INTERVAL);
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);
    let _ = KEEPALIVE_RETRIES; // referenced unconditionally for non-Linux targets too
    sock.set_tcp_keepalive(&keepalive)
        .context("failed to set TCP keepalive")?;
    Ok(())
}

/// Run the accept loop for one line forever (until the listener itself
/// fails to bind, which is a startup-time fatal error per the error
/// handling design).
pub async fn run(line: Arc<Line>, event_tx: mpsc::UnboundedSender<(u16, LineEvent)>) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], line.port).into();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("line {}: failed to bind {addr}", line.index))?;
    log::info!("line {}: listening on {addr}", line.index);

    loop {
        let (data_stream, data_peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("line {}: accept (data) failed: {e}", line.index);
                continue;
            }
        };
        if let Err(e) = apply_keepalive(&data_stream) {
            log::warn!("line {}: keepalive on data channel: {e}", line.index);
        }
        log::info!("line {}: data channel connected from {data_peer}", line.index);

        let (signal_stream, signal_peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("line {}: accept (signal) failed: {e}", line.index);
                continue;
            }
        };
        if let Err(e) = apply_keepalive(&signal_stream) {
            log::warn!("line {}: keepalive on signal channel: {e}", line.index);
        }
        log::info!("line {}: signal channel connected from {signal_peer}", line.index);

        line.signal.lock().expect("signal mutex poisoned").signal_channel_accepted();
        line.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = event_tx.send((line.index, LineEvent::Connected));

        run_connected_pair(&line, data_stream, signal_stream).await;

        line.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        line.buffers.lock().expect("buffer mutex poisoned").reset();
        line.signal.lock().expect("signal mutex poisoned").data_connection_lost();
        *line.data_out.lock().expect("data_out mutex poisoned") = None;
        let _ = event_tx.send((line.index, LineEvent::Disconnected));
        log::info!("line {}: connection pair torn down, re-arming", line.index);
    }
}

/// Owns both halves of a connected pair until either drops.
async fn run_connected_pair(line: &Arc<Line>, data_stream: TcpStream, signal_stream: TcpStream) {
    let (mut data_rd, mut data_wr) = data_stream.into_split();
    let (mut signal_rd, mut signal_wr) = signal_stream.into_split();

    let (data_out_tx, mut data_out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    *line.data_out.lock().expect("data_out mutex poisoned") = Some(data_out_tx);

    let writer_line = Arc::clone(line);
    let writer = tokio::spawn(async move {
        while let Some(bytes) = data_out_rx.recv().await {
            if let Err(e) = data_wr.write_all(&bytes).await {
                log::debug!("line {}: data write error: {e}", writer_line.index);
                break;
            }
        }
        let _ = data_wr.shutdown().await;
    });

    let reader_line = Arc::clone(line);
    let data_reader = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_CHUNK];
        loop {
            match data_rd.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    reader_line
                        .buffers
                        .lock()
                        .expect("buffer mutex poisoned")
                        .fill_rx(&buf[..n]);
                }
                Err(_) => break,
            }
        }
    });

    let signal_writer_line = Arc::clone(line);
    let signal_writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SIGNAL_WRITE_POLL);
        loop {
            ticker.tick().await;
            let update = signal_writer_line
                .signal
                .lock()
                .expect("signal mutex poisoned")
                .take_remote_update();
            if let Some(byte) = update {
                if signal_wr.write_all(&[byte]).await.is_err() {
                    break;
                }
            }
        }
    });

    let signal_line = Arc::clone(line);
    let signal_reader = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            // Coalesce: only the most recently read byte matters.
            match signal_rd.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let last = buf[n - 1];
                    let rx_empty = signal_line.buffers.lock().expect("buffer mutex poisoned").rx_is_empty();
                    signal_line
                        .signal
                        .lock()
                        .expect("signal mutex poisoned")
                        .on_remote_signal(last, rx_empty);
                }
                Err(_) => break,
            }
        }
    });

    // The pair is "connected" until either half observes EOF/error.
    tokio::select! {
        _ = data_reader => {}
        _ = signal_reader => {}
    }
    writer.abort();
    signal_writer.abort();
}
