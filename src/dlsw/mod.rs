//! The DLSw worker: two TCP connections to one peer (an inbound listener
//! accept and an outbound connector), a [`Circuit`] per peer, and the
//! glue routing its actions into a [`Line`] and the scanner's shared
//! identity/pacing state (§4.5, §5).

pub mod circuit;
pub mod flowcontrol;
pub mod header;
pub mod messages;

pub use circuit::{Circuit, CircuitAction, CircuitState};
pub use header::Header;

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::{DlswConfig, Endpoint};
use crate::constants::{DLSW_PORT, RECONNECT_RETRY_DELAY};
use crate::line::Line;
use crate::scanner::StationIdentity;
use crate::trace::{self, OptionalTracer, CLASS_LIB, DIR_IN, DIR_OUT};

use messages::{build_fcb, CAP_EXCHANGE, FCO_RPT, GDS_CAP_EXCHANGE_REQUEST, INFOFRAME};

/// Read one DLSw message: the header's first four bytes give
/// `header_length` (offset `0x01`) and `message_length` (offset `0x02`),
/// so the remaining header bytes and the payload are read as two further
/// `read_exact` calls once those lengths are known. Returns `None` on a
/// clean EOF before any bytes of a new message arrive.
async fn read_message(stream: &mut (impl AsyncReadExt + Unpin)) -> Result<Option<(Header, Vec<u8>)>> {
    let mut prefix = [0u8; 4];
    match stream.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("reading DLSw header prefix"),
    }

    let header_length = prefix[1] as usize;
    let message_length = u16::from_be_bytes([prefix[2], prefix[3]]) as usize;

    let mut header_buf = Vec::with_capacity(header_length.max(4));
    header_buf.extend_from_slice(&prefix);
    if header_length > 4 {
        let mut rest = vec![0u8; header_length - 4];
        stream.read_exact(&mut rest).await.context("reading DLSw header body")?;
        header_buf.extend_from_slice(&rest);
    }
    let header = Header::decode(&header_buf).context("malformed DLSw header")?;

    let mut payload = vec![0u8; message_length];
    if message_length > 0 {
        stream.read_exact(&mut payload).await.context("reading DLSw payload")?;
    }

    Ok(Some((header, payload)))
}

async fn write_message(
    stream: &mut (impl AsyncWriteExt + Unpin),
    header: &Header,
    payload: &[u8],
) -> Result<()> {
    stream.write_all(&header.encode()).await?;
    if !payload.is_empty() {
        stream.write_all(payload).await?;
    }
    Ok(())
}

/// Dial `peer` on the DLSw port, retrying forever on failure.
async fn connect_outbound(peer: &Endpoint) -> TcpStream {
    loop {
        match TcpStream::connect((peer.host_str(), DLSW_PORT)).await {
            Ok(stream) => return stream,
            Err(e) => {
                log::warn!("dlsw: outbound connect to {} failed: {e}", peer.host_str());
                tokio::time::sleep(RECONNECT_RETRY_DELAY).await;
            }
        }
    }
}

async fn accept_inbound(listener: &TcpListener) -> TcpStream {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::info!("dlsw: inbound connection from {peer}");
                return stream;
            }
            Err(e) => log::warn!("dlsw: inbound accept failed: {e}"),
        }
    }
}

fn capabilities_exchange_request() -> (Header, Vec<u8>) {
    let vendor_id = [0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
    let mut body = Vec::new();
    body.extend_from_slice(&0x0026u16.to_be_bytes());
    body.extend_from_slice(&GDS_CAP_EXCHANGE_REQUEST.to_be_bytes());
    body.extend_from_slice(&vendor_id);
    body.push(0x02); // DLSw version 2
    body.push(20); // initial pacing window
    body.push(0x04); // supported SAP (SNA)
    body.push(2); // TCP connection count

    let header = Header { message_length: body.len() as u16, ..Header::control(CAP_EXCHANGE) };
    (header, body)
}

/// Run one DLSw peer bridge forever: establish the inbound/outbound pair,
/// exchange capabilities, then alternate between inbound DLSw messages
/// and the scanner's SDLC→DLSw path until either connection drops, at
/// which point the whole pair is torn down and re-established.
pub async fn run(
    config: DlswConfig,
    line: Arc<Line>,
    identity: Arc<Mutex<StationIdentity>>,
    lp_granted_units: Arc<AtomicU32>,
    current_nr: Arc<AtomicU8>,
    mut sdlc_info_rx: mpsc::UnboundedReceiver<(u16, u8, u8, Vec<u8>)>,
    mut tracer: OptionalTracer,
) -> Result<()> {
    let listen_addr: std::net::SocketAddr = ([0, 0, 0, 0], DLSW_PORT).into();
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind DLSw listener on {listen_addr}"))?;
    log::info!("dlsw: listening on {listen_addr}, bridging line {}", config.line);

    loop {
        let (mut inbound, mut outbound) =
            tokio::join!(accept_inbound(&listener), connect_outbound(&config.peer));

        let mut circuit = Circuit::new();

        let (req_header, req_payload) = capabilities_exchange_request();
        if let Err(e) = write_message(&mut outbound, &req_header, &req_payload).await {
            log::warn!("dlsw: failed to send capabilities exchange: {e}");
            continue;
        }

        loop {
            tokio::select! {
                message = read_message(&mut inbound) => {
                    let Some((header, payload)) = (match message {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("dlsw: inbound read failed, re-arming: {e}");
                            None
                        }
                    }) else {
                        break;
                    };

                    trace::trace(&mut tracer, CLASS_LIB, config.line, DIR_IN, &format!("type={:#04x} len={}", header.message_type, payload.len()));

                    let action = circuit.handle(&header, &payload);
                    apply_action(&line, &action);

                    for (reply_header, reply_payload) in &action.replies {
                        trace::trace(&mut tracer, CLASS_LIB, config.line, DIR_OUT, &format!("type={:#04x} len={}", reply_header.message_type, reply_payload.len()));
                        if let Err(e) = write_message(&mut outbound, reply_header, reply_payload).await {
                            log::warn!("dlsw: outbound write failed: {e}");
                            break;
                        }
                    }

                    *identity.lock().expect("identity mutex poisoned") = circuit.identity;
                    lp_granted_units.store(circuit.pacing.lp_granted_units, Ordering::Relaxed);
                    current_nr.store(circuit.seq_nr, Ordering::Relaxed);
                }
                sdlc_info = sdlc_info_rx.recv() => {
                    let Some((_line_index, _ns, _nr, payload)) = sdlc_info else { continue };
                    if circuit.state != CircuitState::Connected {
                        log::debug!("dlsw: dropping SDLC frame, circuit not connected");
                        continue;
                    }
                    let header = Header {
                        message_length: payload.len() as u16,
                        remote_dlc_correlator: circuit.remote_dlc_correlator,
                        remote_dlc_port_id: circuit.remote_dlc_port_id,
                        flow_control: build_fcb(false, false, FCO_RPT),
                        message_type: INFOFRAME,
                        ..Header::info()
                    };
                    if let Err(e) = write_message(&mut outbound, &header, &payload).await {
                        log::warn!("dlsw: outbound INFOFRAME write failed: {e}");
                        break;
                    }
                }
            }
        }

        log::info!("dlsw: circuit torn down, re-establishing");
    }
}

fn apply_action(line: &Arc<Line>, action: &CircuitAction) {
    if let Some(frame) = &action.sdlc_tx {
        line.send_data(frame.clone());
    }
    if action.raise_rts {
        line.signal.lock().expect("signal mutex poisoned").ncp_set_rts();
    }
    if action.drop_rts {
        line.signal.lock().expect("signal mutex poisoned").ncp_drop_rts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    async fn read_one(stream: &mut TcpStream) -> (Header, Vec<u8>) {
        timeout(Duration::from_secs(2), read_message(stream)).await.unwrap().unwrap().unwrap()
    }

    #[tokio::test]
    async fn message_round_trips_over_a_loopback_socket() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_one(&mut stream).await
        });

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (header, payload) = capabilities_exchange_request();
        write_message(&mut client, &header, &payload).await.unwrap();

        let (got_header, got_payload) = server.await.unwrap();
        assert_eq!(got_header.message_type, CAP_EXCHANGE);
        assert_eq!(got_header.message_length as usize, payload.len());
        assert_eq!(got_payload, payload);
    }

    #[tokio::test]
    async fn info_message_carries_an_empty_payload_cleanly() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_one(&mut stream).await
        });

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let header = Header::info();
        write_message(&mut client, &header, &[]).await.unwrap();

        let (got_header, got_payload) = server.await.unwrap();
        assert_eq!(got_header.header_length, header::INFO_HEADER_LEN as u8);
        assert!(got_payload.is_empty());
    }

    #[tokio::test]
    async fn read_message_returns_none_on_clean_eof() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_message(&mut stream).await.unwrap()
        });

        let client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        drop(client);

        assert!(server.await.unwrap().is_none());
    }
}
