//! SDLC control-field bit layout and the well-known U/S-frame codes.
//!
//! Control byte bit numbering (bit 0 = LSB):
//! - I-frame: bit 0 = 0, bits 1..3 = `Ns`, bit 4 = P/F, bits 5..7 = `Nr`.
//! - S-frame: bits 0..1 = `01`, bits 2..3 = type, bit 4 = P/F, bits 5..7 = `Nr`.
//! - U-frame: bits 0..1 = `11`, remaining bits select the command/response.

/// Poll/Final bit, shared by I- and S-frame control bytes.
pub const POLL_FINAL: u8 = 0x10;

const S_FRAME_TAG: u8 = 0x01;
const U_FRAME_TAG: u8 = 0x03;

/// Supervisory type: Receive Ready.
pub const S_TYPE_RR: u8 = 0x00;
/// Supervisory type: Receive Not Ready.
pub const S_TYPE_RNR: u8 = 0x01;

/// Unnumbered command/response codes (base, P/F bit not included).
pub const U_SNRM: u8 = 0x83;
/// Unnumbered Acknowledge.
pub const U_UA: u8 = 0x63;
/// Exchange Identification.
pub const U_XID: u8 = 0xAF;

/// `true` for an I-frame control byte.
pub fn is_i_frame(control: u8) -> bool {
    control & 0x01 == 0
}

/// `true` for a supervisory (S-frame) control byte.
pub fn is_s_frame(control: u8) -> bool {
    control & 0x03 == S_FRAME_TAG
}

/// `true` for an unnumbered (U-frame) control byte.
pub fn is_u_frame(control: u8) -> bool {
    control & 0x03 == U_FRAME_TAG
}

/// `Ns` carried in an I-frame control byte.
pub fn i_frame_ns(control: u8) -> u8 {
    (control >> 1) & 0x07
}

/// `Nr` carried in an I- or S-frame control byte.
pub fn frame_nr(control: u8) -> u8 {
    (control >> 5) & 0x07
}

/// `true` when the Poll/Final bit is set.
pub fn poll_final(control: u8) -> bool {
    control & POLL_FINAL != 0
}

/// Supervisory type (RR/RNR) of an S-frame control byte.
pub fn s_frame_type(control: u8) -> u8 {
    (control >> 2) & 0x03
}

/// Base U-frame command code, with the P/F bit masked off.
pub fn u_frame_command(control: u8) -> u8 {
    control & !POLL_FINAL
}

/// Build an I-frame control byte.
pub fn build_i_control(ns: u8, nr: u8, poll: bool) -> u8 {
    let mut c = 0u8;
    c |= (ns & 0x07) << 1;
    c |= (nr & 0x07) << 5;
    if poll {
        c |= POLL_FINAL;
    }
    c
}

/// Build a supervisory (RR/RNR) control byte.
pub fn build_s_control(s_type: u8, nr: u8, final_bit: bool) -> u8 {
    let mut c = S_FRAME_TAG;
    c |= (s_type & 0x03) << 2;
    c |= (nr & 0x07) << 5;
    if final_bit {
        c |= POLL_FINAL;
    }
    c
}

/// Build an unnumbered control byte from a base command code.
pub fn build_u_control(base: u8, final_bit: bool) -> u8 {
    if final_bit {
        base | POLL_FINAL
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i_control_round_trips_ns_nr_poll() {
        let c = build_i_control(3, 5, true);
        assert!(is_i_frame(c));
        assert_eq!(i_frame_ns(c), 3);
        assert_eq!(frame_nr(c), 5);
        assert!(poll_final(c));
    }

    #[test]
    fn s_control_rr_and_rnr_distinguish_type() {
        let rr = build_s_control(S_TYPE_RR, 2, true);
        let rnr = build_s_control(S_TYPE_RNR, 2, true);
        assert!(is_s_frame(rr) && is_s_frame(rnr));
        assert_eq!(s_frame_type(rr), S_TYPE_RR);
        assert_eq!(s_frame_type(rnr), S_TYPE_RNR);
        assert_eq!(frame_nr(rr), 2);
    }

    #[test]
    fn u_control_masks_poll_final_for_command_match() {
        let snrm = build_u_control(U_SNRM, true);
        assert!(is_u_frame(snrm));
        assert_eq!(u_frame_command(snrm), U_SNRM);
        assert!(poll_final(snrm));
    }
}
