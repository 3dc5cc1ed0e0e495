//! The 16-state PCF dispatch table (§4.4): one step of one line's
//! automaton per scanner cycle.

use crate::line::buffers::LineBuffers;
use crate::line::signal::SignalState;
use crate::sdlc::{self, frame::Frame, FrameAssembler};

use super::icw::{Icw, LineState, PdfReg, SDF_DTR};

/// PCF state numbers, named per §4.4's table.
pub mod pcf {
    pub const NOOP: u8 = 0x0;
    pub const SET_MODE: u8 = 0x1;
    pub const MONITOR_DSR: u8 = 0x2;
    pub const MONITOR_DSR_RI: u8 = 0x3;
    pub const MONITOR_FLAG_BLOCK: u8 = 0x4;
    pub const MONITOR_FLAG_ALLOW: u8 = 0x5;
    pub const RECEIVE_BLOCK: u8 = 0x6;
    pub const RECEIVE_ALLOW: u8 = 0x7;
    pub const TRANSMIT_INITIAL: u8 = 0x8;
    pub const TRANSMIT_NORMAL: u8 = 0x9;
    pub const TRANSMIT_NEW_SYNC: u8 = 0xA;
    pub const TURNAROUND_RTS_OFF: u8 = 0xC;
    pub const TURNAROUND_RTS_ON: u8 = 0xD;
    pub const DISABLE: u8 = 0xF;
}
use pcf::*;

/// Result of one PCF tick: whether a level-2 service interrupt should be
/// raised to the CPU this cycle, any SDLC bytes to flush as a
/// supervisory/unnumbered response the scanner built on its own (answers
/// to Poll that don't need the DLSw engine's involvement), and any
/// completed I-frame payload handed up to the DLSw engine for tunnelling.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub l2_raised: bool,
    pub response: Option<Vec<u8>>,
    /// `(Ns, Nr, payload)` of a completed inbound I-frame, for the
    /// SDLC→DLSw path (§4.5).
    pub sdlc_info: Option<(u8, u8, Vec<u8>)>,
}

/// PCFs suspended while a level-2 service request is still pending.
fn suspended_while_l2_pending(current: u8) -> bool {
    matches!(
        current,
        RECEIVE_BLOCK | RECEIVE_ALLOW | TRANSMIT_INITIAL | TRANSMIT_NORMAL | TRANSMIT_NEW_SYNC
            | TURNAROUND_RTS_ON
    )
}

/// Run one scanner cycle for a single line. `identity` supplies the
/// station fields needed to answer an inbound XID Poll; `lp_granted_units`
/// gates the RR/RNR choice on an inbound RR Poll with an empty tx-buf.
///
/// This function only *reports* whether a level-2 service event occurred
/// (`TickOutcome::l2_raised`); raising `icw.scf.service_request` and
/// clearing it once serviced is the calling worker's job (`scanner::run`),
/// since that handshake spans cycles and (in the real system) the CPU side.
#[allow(clippy::too_many_arguments)]
pub fn tick(
    icw: &mut Icw,
    buffers: &mut LineBuffers,
    signal: &mut SignalState,
    framer: &mut FrameAssembler,
    identity: (u8, u16, u32),
    lp_granted_units: u32,
    current_nr: u8,
) -> TickOutcome {
    // Step 1: adopt a pending PCF requested by the NCP between cycles.
    if icw.pcf_next != icw.pcf {
        icw.pcf_prev = icw.pcf;
        icw.pcf = icw.pcf_next;
        if icw.pcf == NOOP {
            icw.lne_state = LineState::Reset;
        }
    }

    if icw.scf.service_request && suspended_while_l2_pending(icw.pcf) {
        return TickOutcome::default();
    }

    let mut outcome = TickOutcome::default();

    match icw.pcf {
        NOOP => {}
        SET_MODE => {
            icw.sdf |= SDF_DTR;
            signal.ncp_set_dtr();
            icw.pcf_next = NOOP;
            icw.pcf = NOOP;
            outcome.l2_raised = true;
        }
        MONITOR_DSR => {
            let local = signal.local();
            if local & crate::constants::SIG_DCD != 0 {
                icw.scf.dcd = true;
            }
            if local & crate::constants::SIG_DCD != 0 && local & crate::constants::SIG_DSR != 0 {
                icw.pcf = MONITOR_FLAG_BLOCK;
                icw.pcf_next = MONITOR_FLAG_BLOCK;
                outcome.l2_raised = true;
            }
        }
        MONITOR_DSR_RI => {
            outcome.l2_raised = true;
            icw.pcf = NOOP;
            icw.pcf_next = NOOP;
        }
        MONITOR_FLAG_BLOCK | MONITOR_FLAG_ALLOW => {
            let local = signal.local();
            if local & crate::constants::SIG_DSR == 0 {
                icw.pcf = MONITOR_DSR;
                icw.pcf_next = MONITOR_DSR;
                outcome.l2_raised = true;
            } else if let Some(byte) = buffers.pop_rx() {
                let wanted = if icw.lcd.is_sdlc() { 0x7E } else { 0x32 };
                if byte == wanted {
                    let next = if icw.lcd.is_sdlc() { RECEIVE_BLOCK } else { RECEIVE_ALLOW };
                    icw.pcf = next;
                    icw.pcf_next = next;
                }
            }
        }
        RECEIVE_BLOCK | RECEIVE_ALLOW => {
            if let Some(byte) = buffers.pop_rx() {
                if let Some(raw) = framer.feed(byte) {
                    icw.lne_state = LineState::Tx;
                    icw.scf.flag_detected = true;
                    icw.pcf = RECEIVE_BLOCK;
                    icw.pcf_next = RECEIVE_BLOCK;
                    outcome.l2_raised = true;
                    match Frame::parse(&raw) {
                        Some(Frame::Info { ns, nr, payload, .. }) => {
                            outcome.sdlc_info = Some((ns, nr, payload));
                        }
                        Some(frame) => {
                            outcome.response =
                                respond_to_frame(frame, identity, lp_granted_units, current_nr);
                        }
                        None => {}
                    }
                } else if byte == sdlc::FLAG {
                    icw.scf.flag_detected = true;
                } else {
                    icw.pdf = byte;
                    icw.pdf_reg = PdfReg::Filled;
                    if icw.pcf == RECEIVE_BLOCK {
                        icw.pcf = RECEIVE_ALLOW;
                        icw.pcf_next = RECEIVE_ALLOW;
                    }
                    outcome.l2_raised = true;
                }
            }
        }
        TRANSMIT_INITIAL => {
            signal.ncp_set_rts();
            if signal.local() & crate::constants::SIG_CTS != 0 {
                buffers.push_tx(sdlc::STATION_ADDR);
                icw.pcf = TRANSMIT_NORMAL;
                icw.pcf_next = TRANSMIT_NORMAL;
            }
        }
        TRANSMIT_NORMAL | TRANSMIT_NEW_SYNC => {
            if icw.pdf_reg == PdfReg::Filled {
                buffers.push_tx(icw.pdf);
                icw.pdf_reg = PdfReg::Empty;
                outcome.l2_raised = true;
            }
        }
        TURNAROUND_RTS_OFF => {
            outcome.response = finish_transmit(icw, buffers, signal);
            icw.pcf = MONITOR_FLAG_ALLOW;
            icw.pcf_next = MONITOR_FLAG_ALLOW;
            outcome.l2_raised = true;
        }
        TURNAROUND_RTS_ON => {
            outcome.response = finish_transmit(icw, buffers, signal);
            if !icw.lcd.is_sdlc() {
                icw.pcf = MONITOR_FLAG_ALLOW;
                icw.pcf_next = MONITOR_FLAG_ALLOW;
                outcome.l2_raised = true;
            }
        }
        DISABLE => {
            icw.sdf &= !SDF_DTR;
            signal.ncp_clear_dtr();
            outcome.l2_raised = true;
            icw.pcf = NOOP;
            icw.pcf_next = NOOP;
        }
        _ => {}
    }

    outcome
}

fn finish_transmit(icw: &mut Icw, buffers: &mut LineBuffers, signal: &mut SignalState) -> Option<Vec<u8>> {
    let frame = buffers.take_tx();
    icw.lne_state = LineState::Rx;
    signal.ncp_clear_dtr();
    if frame.is_empty() {
        None
    } else {
        Some(frame)
    }
}

/// Build the scanner's own reply to an inbound supervisory/unnumbered
/// frame that doesn't need the DLSw engine (RR/RNR Poll answers, SNRM,
/// XID). `Frame::Info` frames never reach here — the caller routes them
/// to `TickOutcome::sdlc_info` instead.
fn respond_to_frame(
    frame: Frame,
    identity: (u8, u16, u32),
    lp_granted_units: u32,
    current_nr: u8,
) -> Option<Vec<u8>> {
    match frame {
        Frame::ReceiveReady { poll_final, .. } if poll_final => {
            if lp_granted_units > 0 {
                Some(sdlc::frame::build_rr_response(current_nr))
            } else {
                Some(sdlc::frame::build_rnr_response(current_nr))
            }
        }
        Frame::SetNormalResponseMode { poll } if poll => Some(sdlc::frame::build_ua_response()),
        Frame::Xid { poll_final, .. } if poll_final => {
            let (pu_type, idblk, idnum) = identity;
            Some(sdlc::frame::build_xid_response(pu_type, idblk, idnum))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::icw::LineCode;

    fn fresh() -> (Icw, LineBuffers, SignalState, FrameAssembler) {
        (
            Icw::new(LineCode::Sdlc8),
            LineBuffers::new(),
            SignalState::new(),
            FrameAssembler::new(),
        )
    }

    #[test]
    fn set_mode_raises_dtr_and_l2() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf_next = SET_MODE;
        let out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert!(out.l2_raised);
        assert_eq!(icw.sdf & SDF_DTR, SDF_DTR);
        assert_eq!(sig.local() & crate::constants::SIG_DTR, crate::constants::SIG_DTR);
    }

    #[test]
    fn monitor_dsr_advances_once_dcd_and_dsr_present() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf = MONITOR_DSR;
        icw.pcf_next = MONITOR_DSR;
        sig.signal_channel_accepted();
        sig.ncp_set_dtr();
        let out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert!(out.l2_raised);
        assert_eq!(icw.pcf, MONITOR_FLAG_BLOCK);
    }

    #[test]
    fn receive_delivers_byte_into_pdf() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf = RECEIVE_ALLOW;
        icw.pcf_next = RECEIVE_ALLOW;
        buf.fill_rx(&[0xAB]);
        let out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert!(out.l2_raised);
        assert_eq!(icw.pdf, 0xAB);
        assert_eq!(icw.pdf_reg, PdfReg::Filled);
    }

    #[test]
    fn receive_closes_frame_and_answers_rr_poll() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf = RECEIVE_BLOCK;
        icw.pcf_next = RECEIVE_BLOCK;
        let rr_poll = sdlc::build_frame(sdlc::control::build_s_control(sdlc::control::S_TYPE_RR, 0, true), &[]);
        buf.fill_rx(&rr_poll[1..]); // flag already consumed by the line reader in practice
        let mut out = TickOutcome::default();
        for _ in 0..rr_poll.len() - 1 {
            out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0x02, 0x017, 0x30001), 3, 0);
        }
        assert!(out.response.is_some());
    }

    #[test]
    fn transmit_initial_waits_for_cts() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf = TRANSMIT_INITIAL;
        icw.pcf_next = TRANSMIT_INITIAL;
        let out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert!(!out.l2_raised);
        assert_eq!(icw.pcf, TRANSMIT_INITIAL);
        assert_eq!(buf.tx_len(), 0);
    }

    #[test]
    fn transmit_initial_advances_once_cts_observed() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        icw.pcf = TRANSMIT_INITIAL;
        icw.pcf_next = TRANSMIT_INITIAL;
        sig.on_remote_signal(crate::constants::SIG_CTS, false);
        tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert_eq!(icw.pcf, TRANSMIT_NORMAL);
        assert_eq!(buf.tx_len(), 1);
    }

    #[test]
    fn disable_drops_dtr() {
        let (mut icw, mut buf, mut sig, mut fr) = fresh();
        sig.ncp_set_dtr();
        icw.sdf |= SDF_DTR;
        icw.pcf = DISABLE;
        icw.pcf_next = DISABLE;
        let out = tick(&mut icw, &mut buf, &mut sig, &mut fr, (0, 0, 0), 0, 0);
        assert!(out.l2_raised);
        assert_eq!(icw.sdf & SDF_DTR, 0);
        assert_eq!(icw.pcf, NOOP);
    }
}
