//! The per-peer DLSw circuit state machine (§3, §4.5).

use super::flowcontrol::Pacing;
use super::header::{Header, DIR_ORIGIN_TO_TARGET, DIR_TARGET_TO_ORIGIN};
use super::messages::{self, *};
use crate::scanner::StationIdentity;
use crate::sdlc;

/// Circuit lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Disconnected,
    CircuitStart,
    CircuitEstablished,
    ConnectPending,
    Connected,
}

/// Canned 20-byte XID response body used when the peer's `XIDFRAME` has an
/// empty payload (the "null XID" poll used to probe link status).
const NULL_XID_RESPONSE: [u8; 20] = [0u8; 20];

/// One DLSw peer circuit: correlators, pacing counters, SDLC sequence
/// numbers, and the learned station identity.
#[derive(Debug)]
pub struct Circuit {
    pub state: CircuitState,
    pub remote_dlc_correlator: u32,
    pub remote_dlc_port_id: u32,
    pub origin_dlc_correlator: u32,
    pub origin_dlc_port_id: u32,
    pub pacing: Pacing,
    pub seq_ns: u8,
    pub seq_nr: u8,
    pub identity: StationIdentity,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Disconnected,
            remote_dlc_correlator: 0,
            remote_dlc_port_id: 0,
            origin_dlc_correlator: 0,
            origin_dlc_port_id: 0,
            pacing: Pacing::new(20),
            seq_ns: 0,
            seq_nr: 0,
            identity: StationIdentity::default(),
        }
    }
}

/// What the caller (the DLSw TCP worker) should do after feeding one
/// inbound message to [`Circuit::handle`].
#[derive(Debug, Default)]
pub struct CircuitAction {
    /// Messages to send back on the same TCP circuit, in order.
    pub replies: Vec<(Header, Vec<u8>)>,
    /// An SDLC I-frame to push into the line's transmit buffer.
    pub sdlc_tx: Option<Vec<u8>>,
    /// Raise RTS on the SDLC signal channel (circuit just went CONNECTED).
    pub raise_rts: bool,
    /// Drop RTS (circuit just halted).
    pub drop_rts: bool,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded inbound message through the state machine.
    pub fn handle(&mut self, header: &Header, payload: &[u8]) -> CircuitAction {
        let mut action = CircuitAction::default();
        let fc = self.pacing.on_receive(header.flow_control);

        match header.message_type {
            CAP_EXCHANGE => {
                if is_cap_exchange_request(payload) {
                    self.pacing = Pacing::new(read_pacing_window(payload).unwrap_or(20));
                    let reply_header = Header {
                        frame_direction: DIR_TARGET_TO_ORIGIN,
                        ..Header::control(CAP_EXCHANGE)
                    };
                    let reply_payload = build_gds(GDS_CAP_EXCHANGE_REPLY, &[]);
                    action.replies.push((
                        finish_header(reply_header, &reply_payload, fc.fca_due),
                        reply_payload,
                    ));
                }
                // A reply (GDS 1521) is consumed silently.
            }
            CANUREACH if self.state == CircuitState::Disconnected => {
                self.remote_dlc_correlator = header.origin_dlc_correlator;
                self.remote_dlc_port_id = header.origin_dlc_port_id;
                let reply_header = Header {
                    remote_dlc_correlator: header.origin_dlc_correlator,
                    remote_dlc_port_id: header.origin_dlc_port_id,
                    frame_direction: DIR_TARGET_TO_ORIGIN,
                    ..Header::control(ICANREACH)
                };
                action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
                self.state = CircuitState::CircuitStart;
            }
            ICANREACH if self.state == CircuitState::CircuitStart => {
                let reply_header = Header {
                    remote_dlc_correlator: header.origin_dlc_correlator,
                    remote_dlc_port_id: header.origin_dlc_port_id,
                    frame_direction: DIR_TARGET_TO_ORIGIN,
                    ..Header::control(REACH_ACK)
                };
                action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
            }
            REACH_ACK if self.state == CircuitState::CircuitStart => {
                self.origin_dlc_correlator = header.remote_dlc_correlator;
                self.origin_dlc_port_id = header.remote_dlc_port_id;
                self.state = CircuitState::CircuitEstablished;
            }
            XIDFRAME if self.state == CircuitState::CircuitEstablished => {
                if payload.is_empty() {
                    let reply_header = Header { ..Header::control(XIDFRAME) };
                    action.replies.push((
                        finish_header(reply_header, &NULL_XID_RESPONSE, fc.fca_due),
                        NULL_XID_RESPONSE.to_vec(),
                    ));
                } else if let Some((pu_type, idblk, idnum)) = parse_xid_identity(payload) {
                    self.identity = StationIdentity { pu_type, idblk, idnum };
                    let reply_header = Header { ..Header::control(CONTACT) };
                    action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
                }
            }
            CONTACT if self.state == CircuitState::CircuitEstablished => {
                let reply_header = Header { ..Header::control(CONTACT) };
                action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
                self.state = CircuitState::ConnectPending;
            }
            CONTACTED if self.state == CircuitState::ConnectPending => {
                self.state = CircuitState::Connected;
                action.raise_rts = true;
            }
            INFOFRAME if self.state == CircuitState::Connected => {
                let frame = sdlc::frame::build_info_frame(self.seq_ns, self.seq_nr, payload);
                self.seq_ns = (self.seq_ns + 1) % 8;
                action.sdlc_tx = Some(frame);
            }
            HALT_DL if self.state == CircuitState::Connected => {
                let reply_header = Header { ..Header::control(DL_HALTED) };
                action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
                action.drop_rts = true;
            }
            RESTART_DL if self.state == CircuitState::Connected => {
                let reply_header = Header { ..Header::control(DL_RESTARTED) };
                action.replies.push((finish_header(reply_header, &[], fc.fca_due), Vec::new()));
            }
            _ => {}
        }

        if fc.send_ifcm_rpt {
            let ifcm_header = Header { flow_control: Pacing::ifcm_rpt_byte(), ..Header::control(IFCM) };
            action.replies.push((finish_header(ifcm_header, &[], false), Vec::new()));
        }

        action
    }
}

fn finish_header(mut header: Header, payload: &[u8], fca_due: bool) -> Header {
    header.message_length = payload.len() as u16;
    if fca_due {
        header.flow_control = messages::build_fcb(false, true, FCO_RPT);
    }
    header
}

fn build_gds(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(4 + body.len() as u16).to_be_bytes());
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn is_cap_exchange_request(payload: &[u8]) -> bool {
    payload.len() >= 4 && u16::from_be_bytes([payload[2], payload[3]]) == GDS_CAP_EXCHANGE_REQUEST
}

/// Read the initial pacing window from a Capabilities Exchange payload.
/// This implementation only looks at the fixed offset the reference
/// daemon writes it at; unknown/extra capability sub-fields are ignored.
fn read_pacing_window(payload: &[u8]) -> Option<u32> {
    payload.get(4).map(|&b| u32::from(b))
}

/// Extract `(PU type, IDBLK, IDNUM)` from an XID payload per the packed
/// layout `build_xid_payload` uses on the way out.
fn parse_xid_identity(payload: &[u8]) -> Option<(u8, u16, u32)> {
    if payload.len() < 5 {
        return None;
    }
    let pu_type = (payload[0] >> 3) & 0x0F;
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let idblk = (id >> 20) as u16 & 0x0FFF;
    let idnum = id & 0x000F_FFFF;
    Some((pu_type, idblk, idnum))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canureach(correlator: u32, port: u32) -> (Header, Vec<u8>) {
        let header = Header {
            origin_dlc_correlator: correlator,
            origin_dlc_port_id: port,
            frame_direction: DIR_ORIGIN_TO_TARGET,
            ..Header::control(CANUREACH)
        };
        (header, Vec::new())
    }

    #[test]
    fn canureach_replies_icanreach_and_advances() {
        let mut c = Circuit::new();
        let (header, payload) = canureach(0x0102_0304, 0x0A0B_0C0D);
        let action = c.handle(&header, &payload);
        assert_eq!(c.state, CircuitState::CircuitStart);
        assert_eq!(action.replies.len(), 1);
        assert_eq!(action.replies[0].0.message_type, ICANREACH);
        assert_eq!(action.replies[0].0.remote_dlc_correlator, 0x0102_0304);
    }

    #[test]
    fn full_handshake_reaches_connected_and_raises_rts() {
        let mut c = Circuit::new();
        let (header, payload) = canureach(1, 2);
        c.handle(&header, &payload);

        let reach_ack = Header { remote_dlc_correlator: 10, remote_dlc_port_id: 20, ..Header::control(REACH_ACK) };
        c.handle(&reach_ack, &[]);
        assert_eq!(c.state, CircuitState::CircuitEstablished);

        let xid_payload = crate::sdlc::frame::build_xid_payload(0x02, 0x017, 0x30001);
        let xid = Header::control(XIDFRAME);
        let action = c.handle(&xid, &xid_payload);
        assert_eq!(action.replies[0].0.message_type, CONTACT);
        assert_eq!(c.identity.idblk, 0x017);
        assert_eq!(c.identity.idnum, 0x30001);

        let contact = Header::control(CONTACT);
        let action = c.handle(&contact, &[]);
        assert_eq!(c.state, CircuitState::ConnectPending);
        assert_eq!(action.replies[0].0.message_type, CONTACT);

        let contacted = Header::control(CONTACTED);
        let action = c.handle(&contacted, &[]);
        assert_eq!(c.state, CircuitState::Connected);
        assert!(action.raise_rts);
    }

    #[test]
    fn infoframe_wraps_payload_and_increments_ns() {
        let mut c = Circuit::new();
        c.state = CircuitState::Connected;
        let infoframe = Header::control(INFOFRAME);
        let payload = vec![0xAA; 10];
        let action = c.handle(&infoframe, &payload);
        let frame = action.sdlc_tx.unwrap();
        assert_eq!(frame[0], sdlc::FLAG);
        assert_eq!(frame[1], sdlc::STATION_ADDR);
        assert_eq!(&frame[3..13], &payload[..]);
        assert_eq!(c.seq_ns, 1);
    }

    #[test]
    fn halt_dl_replies_once_and_drops_rts() {
        let mut c = Circuit::new();
        c.state = CircuitState::Connected;
        let action = c.handle(&Header::control(HALT_DL), &[]);
        assert!(action.drop_rts);
        assert_eq!(action.replies.iter().filter(|(h, _)| h.message_type == DL_HALTED).count(), 1);
    }

    #[test]
    fn cap_exchange_reply_is_consumed_silently() {
        let mut c = Circuit::new();
        let reply = Header { frame_direction: DIR_TARGET_TO_ORIGIN, ..Header::control(CAP_EXCHANGE) };
        let body = build_gds(GDS_CAP_EXCHANGE_REPLY, &[]);
        let action = c.handle(&reply, &body);
        assert!(action.replies.is_empty());
    }
}
