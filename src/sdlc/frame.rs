//! Decoded SDLC frame shapes and the supervisory/unnumbered response
//! builders the scanner uses to answer Poll/Final requests.

use super::control::{
    build_i_control, build_s_control, build_u_control, frame_nr, i_frame_ns, is_i_frame,
    is_s_frame, poll_final, s_frame_type, u_frame_command, S_TYPE_RNR, S_TYPE_RR, U_SNRM, U_UA,
    U_XID,
};
use super::build_frame;

/// A decoded SDLC frame, minus the leading flag, address, and trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Information frame carrying a payload.
    Info { ns: u8, nr: u8, poll: bool, payload: Vec<u8> },
    /// Receive Ready.
    ReceiveReady { nr: u8, poll_final: bool },
    /// Receive Not Ready.
    ReceiveNotReady { nr: u8, poll_final: bool },
    /// Set Normal Response Mode.
    SetNormalResponseMode { poll: bool },
    /// Unnumbered Acknowledge.
    UnnumberedAck { final_bit: bool },
    /// Exchange Identification, carrying its raw payload.
    Xid { poll_final: bool, payload: Vec<u8> },
    /// Anything else: control byte and payload preserved verbatim.
    Unknown { control: u8, payload: Vec<u8> },
}

impl Frame {
    /// Parse a de-flagged frame (`addr | control | payload`). The address
    /// byte is not validated — this station only ever talks to the one
    /// hardcoded peer address.
    pub fn parse(raw: &[u8]) -> Option<Frame> {
        if raw.len() < 2 {
            return None;
        }
        let control = raw[1];
        let payload = raw[2..].to_vec();

        if is_i_frame(control) {
            return Some(Frame::Info {
                ns: i_frame_ns(control),
                nr: frame_nr(control),
                poll: poll_final(control),
                payload,
            });
        }
        if is_s_frame(control) {
            return Some(match s_frame_type(control) {
                S_TYPE_RR => Frame::ReceiveReady {
                    nr: frame_nr(control),
                    poll_final: poll_final(control),
                },
                S_TYPE_RNR => Frame::ReceiveNotReady {
                    nr: frame_nr(control),
                    poll_final: poll_final(control),
                },
                _ => Frame::Unknown { control, payload },
            });
        }
        Some(match u_frame_command(control) {
            U_SNRM => Frame::SetNormalResponseMode { poll: poll_final(control) },
            U_UA => Frame::UnnumberedAck { final_bit: poll_final(control) },
            U_XID => Frame::Xid { poll_final: poll_final(control), payload },
            _ => Frame::Unknown { control, payload },
        })
    }
}

/// Build an I-frame on the wire (flag, address, control, payload, trailer).
pub fn build_info_frame(ns: u8, nr: u8, payload: &[u8]) -> Vec<u8> {
    build_frame(build_i_control(ns, nr, false), payload)
}

/// Reply to a Poll with Receive Ready, Final, and the current `Nr`.
pub fn build_rr_response(nr: u8) -> Vec<u8> {
    build_frame(build_s_control(S_TYPE_RR, nr, true), &[])
}

/// Reply to a Poll with Receive Not Ready (no budget left), Final, `Nr`.
pub fn build_rnr_response(nr: u8) -> Vec<u8> {
    build_frame(build_s_control(S_TYPE_RNR, nr, true), &[])
}

/// Reply to SNRM-with-Poll: Unnumbered Acknowledge, Final.
pub fn build_ua_response() -> Vec<u8> {
    build_frame(build_u_control(U_UA, true), &[])
}

/// Build the 9-byte XID response body from the station's saved identity:
/// a format byte carrying the PU type, followed by the 32-bit packed
/// `(IDBLK:12 | IDNUM:20)` node id, followed by 4 reserved zero bytes.
pub fn build_xid_payload(pu_type: u8, idblk: u16, idnum: u32) -> Vec<u8> {
    let id = (u32::from(idblk & 0x0FFF) << 20) | (idnum & 0x000F_FFFF);
    let mut payload = Vec::with_capacity(9);
    payload.push(0x80 | ((pu_type & 0x0F) << 3));
    payload.extend_from_slice(&id.to_be_bytes());
    payload.extend_from_slice(&[0x00; 4]);
    payload
}

/// Reply to XID-with-Poll: Unnumbered, Final, carrying the XID payload.
pub fn build_xid_response(pu_type: u8, idblk: u16, idnum: u32) -> Vec<u8> {
    build_frame(build_u_control(U_XID, true), &build_xid_payload(pu_type, idblk, idnum))
}
