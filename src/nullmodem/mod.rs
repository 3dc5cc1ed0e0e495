//! Null Modem: a transparent two-line relay (§4.6).
//!
//! Unlike the DLSw bridge, this engine owns no [`Line`](crate::Line), ICW,
//! or scanner state of its own — both of its endpoints are themselves TCP
//! *clients*, dialed outward to two remote LIB line listeners. Bytes on
//! the data channel are forwarded verbatim; signal bytes are crossed over
//! (side A's signal byte becomes what side B reads, and vice versa).
//! Reconnection is independent per side: a dropped side is torn down and
//! redialed alone while the other side's connection is held open.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use anyhow::{Context, Result};

use crate::config::{Endpoint, NullModemConfig};
use crate::constants::{LINE_PORT_BASE, RECONNECT_RETRY_DELAY};
use crate::line::transport::apply_keepalive;
use crate::trace::{self, OptionalTracer, CLASS_LIB, DIR_IN, DIR_OUT};

const MAX_CHUNK: usize = 4096;

/// One endpoint's live data+signal connection pair.
struct SidePair {
    data: TcpStream,
    signal: TcpStream,
}

/// Dial a remote LIB line listener's data channel, then its signal
/// channel, retrying forever. Mirrors the accept order the listener
/// expects (§4.1): data first, then signal.
async fn dial_line(endpoint: &Endpoint, line: u16) -> SidePair {
    let port = LINE_PORT_BASE + line;
    loop {
        match try_dial_line(endpoint, port).await {
            Ok(pair) => return pair,
            Err(e) => {
                log::warn!("nmodem: dial {}:{port} failed: {e}", endpoint.host_str());
                tokio::time::sleep(RECONNECT_RETRY_DELAY).await;
            }
        }
    }
}

async fn try_dial_line(endpoint: &Endpoint, port: u16) -> Result<SidePair> {
    let host = endpoint.host_str();
    let data = TcpStream::connect((host.as_str(), port)).await.context("data channel connect")?;
    apply_keepalive(&data).context("data channel keepalive")?;
    let signal = TcpStream::connect((host.as_str(), port)).await.context("signal channel connect")?;
    apply_keepalive(&signal).context("signal channel keepalive")?;
    Ok(SidePair { data, signal })
}

/// Why one `pump` task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpOutcome {
    /// Its own read half hit EOF or an error: the stream it reads from is down.
    ReadFailed,
    /// A write to its target half failed: the stream it writes to is down.
    WriteFailed,
    /// Stopped because a sibling pump cancelled the shared token.
    Cancelled,
}

/// Copy bytes from `rd` to `wr` until EOF, error, or `token` is cancelled,
/// cancelling `token` itself the moment this pump's own half fails so its
/// three siblings stop too. Returns both halves so the caller can reunite
/// or discard them once every pump in the group has finished.
async fn pump(
    mut rd: OwnedReadHalf,
    mut wr: OwnedWriteHalf,
    token: CancellationToken,
) -> (OwnedReadHalf, OwnedWriteHalf, PumpOutcome) {
    let mut buf = [0u8; MAX_CHUNK];
    loop {
        tokio::select! {
            _ = token.cancelled() => return (rd, wr, PumpOutcome::Cancelled),
            result = rd.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        token.cancel();
                        return (rd, wr, PumpOutcome::ReadFailed);
                    }
                    Ok(n) => {
                        if wr.write_all(&buf[..n]).await.is_err() {
                            token.cancel();
                            return (rd, wr, PumpOutcome::WriteFailed);
                        }
                    }
                    Err(_) => {
                        token.cancel();
                        return (rd, wr, PumpOutcome::ReadFailed);
                    }
                }
            }
        }
    }
}

/// Run one round of four-way forwarding until at least one side drops,
/// then reunite whichever side(s) are still healthy back into `SidePair`s.
/// `None` for a side means it dropped and must be redialed.
async fn relay_round(side_a: SidePair, side_b: SidePair) -> (Option<SidePair>, Option<SidePair>) {
    let (da_rd, da_wr) = side_a.data.into_split();
    let (sa_rd, sa_wr) = side_a.signal.into_split();
    let (db_rd, db_wr) = side_b.data.into_split();
    let (sb_rd, sb_wr) = side_b.signal.into_split();

    let token = CancellationToken::new();

    let data_a_to_b = tokio::spawn(pump(da_rd, db_wr, token.clone()));
    let data_b_to_a = tokio::spawn(pump(db_rd, da_wr, token.clone()));
    let signal_a_to_b = tokio::spawn(pump(sa_rd, sb_wr, token.clone()));
    let signal_b_to_a = tokio::spawn(pump(sb_rd, sa_wr, token));

    let (r1, r2, r3, r4) = tokio::join!(data_a_to_b, data_b_to_a, signal_a_to_b, signal_b_to_a);
    let (da_rd, db_wr, o1) = r1.expect("data A->B pump panicked");
    let (db_rd, da_wr, o2) = r2.expect("data B->A pump panicked");
    let (sa_rd, sb_wr, o3) = r3.expect("signal A->B pump panicked");
    let (sb_rd, sa_wr, o4) = r4.expect("signal B->A pump panicked");

    let side_a_down = o1 == PumpOutcome::ReadFailed || o2 == PumpOutcome::WriteFailed || o3 == PumpOutcome::ReadFailed || o4 == PumpOutcome::WriteFailed;
    let side_b_down = o2 == PumpOutcome::ReadFailed || o1 == PumpOutcome::WriteFailed || o4 == PumpOutcome::ReadFailed || o3 == PumpOutcome::WriteFailed;

    let side_a = if side_a_down {
        None
    } else {
        match (da_rd.reunite(da_wr), sa_rd.reunite(sa_wr)) {
            (Ok(data), Ok(signal)) => Some(SidePair { data, signal }),
            _ => None,
        }
    };
    let side_b = if side_b_down {
        None
    } else {
        match (db_rd.reunite(db_wr), sb_rd.reunite(sb_wr)) {
            (Ok(data), Ok(signal)) => Some(SidePair { data, signal }),
            _ => None,
        }
    };

    (side_a, side_b)
}

/// Run the Null Modem relay forever, redialing either side independently
/// whenever its pair drops.
pub async fn run(config: NullModemConfig, mut tracer: OptionalTracer) -> Result<()> {
    log::info!(
        "nmodem: bridging line {} on {} with line {} on {}",
        config.line1,
        config.controller1.host_str(),
        config.line2,
        config.controller2.host_str()
    );
    trace::trace(&mut tracer, CLASS_LIB, config.line1, DIR_OUT, "nmodem starting");

    let mut side_a = dial_line(&config.controller1, config.line1).await;
    let mut side_b = dial_line(&config.controller2, config.line2).await;

    loop {
        let (kept_a, kept_b) = relay_round(side_a, side_b).await;

        side_a = match kept_a {
            Some(pair) => pair,
            None => {
                trace::trace(&mut tracer, CLASS_LIB, config.line1, DIR_IN, "side A dropped, redialing");
                dial_line(&config.controller1, config.line1).await
            }
        };
        side_b = match kept_b {
            Some(pair) => pair,
            None => {
                trace::trace(&mut tracer, CLASS_LIB, config.line2, DIR_IN, "side B dropped, redialing");
                dial_line(&config.controller2, config.line2).await
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn accept_pair(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let (data, _) = listener.accept().await.unwrap();
        let (signal, _) = listener.accept().await.unwrap();
        (data, signal)
    }

    #[tokio::test]
    async fn forwards_data_and_crosses_signal_bytes() {
        let line1 = 2000;
        let line2 = 2010;
        let listener_a = TcpListener::bind(("127.0.0.1", LINE_PORT_BASE + line1)).await.unwrap();
        let listener_b = TcpListener::bind(("127.0.0.1", LINE_PORT_BASE + line2)).await.unwrap();

        let accept_task = tokio::spawn(async move {
            let a = accept_pair(&listener_a).await;
            let b = accept_pair(&listener_b).await;
            (a, b)
        });

        let config = NullModemConfig {
            controller1: Endpoint::Addr("127.0.0.1".parse().unwrap()),
            controller2: Endpoint::Addr("127.0.0.1".parse().unwrap()),
            line1,
            line2,
            debug: false,
        };

        let relay = tokio::spawn(run(config, None));

        let ((mut term_data_a, mut term_signal_a), (mut term_data_b, mut term_signal_b)) =
            timeout(Duration::from_secs(2), accept_task).await.unwrap().unwrap();

        term_data_a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        timeout(Duration::from_secs(2), term_data_b.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"hello");

        term_signal_a.write_all(&[0x08]).await.unwrap();
        let mut sig_buf = [0u8; 1];
        timeout(Duration::from_secs(2), term_signal_b.read_exact(&mut sig_buf)).await.unwrap().unwrap();
        assert_eq!(sig_buf[0], 0x08);

        relay.abort();
    }
}
