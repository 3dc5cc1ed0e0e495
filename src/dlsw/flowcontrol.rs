//! Adaptive-pacing flow control (RFC 1795 §8.7).

use super::messages::{FCB_FCA, FCB_FCI, FCO_RPT};

/// Per-circuit pacing counters.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub init_window: u32,
    pub current_window: u32,
    /// Remote peer's granted budget, as tracked on our receive side.
    pub rp_granted_units: u32,
    /// Local peer's granted budget, as communicated to us by the remote.
    pub lp_granted_units: u32,
    /// We owe the remote peer an acknowledging IFCM for its last FCI.
    pub fca_owed: bool,
    /// The next outgoing header must carry `FCB.FCA` (we received an FCI).
    pub fca_due: bool,
}

/// Outcome of processing one received message's flow-control byte.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// The reply this engine sends for this message must set `FCB.FCA`.
    pub fca_due: bool,
    /// An `FCB.FCA` arrived with nothing outstanding.
    pub protocol_error: bool,
    /// Emit an independent `IFCM` with `FCO_RPT` after this message.
    pub send_ifcm_rpt: bool,
}

impl Pacing {
    /// A freshly negotiated pacing state after Capabilities Exchange.
    pub fn new(init_window: u32) -> Self {
        Self {
            init_window,
            current_window: init_window,
            rp_granted_units: init_window * 2,
            lp_granted_units: init_window,
            fca_owed: false,
            fca_due: false,
        }
    }

    /// Apply the discipline in §4.5 to one received flow-control byte.
    pub fn on_receive(&mut self, fcb_in: u8) -> ReceiveOutcome {
        let mut outcome = ReceiveOutcome::default();

        if fcb_in & FCB_FCI != 0 {
            self.fca_due = true;
            outcome.fca_due = true;
        }

        self.rp_granted_units = self.rp_granted_units.saturating_sub(1);

        if fcb_in & FCB_FCA != 0 {
            if !self.fca_owed {
                outcome.protocol_error = true;
            }
            self.fca_owed = false;
        }

        if self.rp_granted_units <= self.current_window && !self.fca_owed {
            self.rp_granted_units += self.current_window;
            self.fca_owed = true;
            outcome.send_ifcm_rpt = true;
        }

        outcome
    }

    /// The flow-control byte for an `IFCM` carrying the (always, for now)
    /// steady-state repeat operator.
    pub fn ifcm_rpt_byte() -> u8 {
        super::messages::build_fcb(true, false, FCO_RPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fci_sets_fca_due_and_decrements_budget() {
        let mut p = Pacing::new(4);
        let before = p.rp_granted_units;
        let outcome = p.on_receive(FCB_FCI);
        assert!(outcome.fca_due);
        assert_eq!(p.rp_granted_units, before - 1);
    }

    #[test]
    fn unexpected_fca_is_a_protocol_error() {
        let mut p = Pacing::new(4);
        let outcome = p.on_receive(FCB_FCA);
        assert!(outcome.protocol_error);
    }

    #[test]
    fn expected_fca_clears_owed_flag_without_error() {
        let mut p = Pacing::new(4);
        p.fca_owed = true;
        let outcome = p.on_receive(FCB_FCA);
        assert!(!outcome.protocol_error);
        assert!(!p.fca_owed);
    }

    #[test]
    fn emits_exactly_one_rpt_after_fourth_of_five_frames() {
        let mut p = Pacing { current_window: 4, rp_granted_units: 8, ..Pacing::new(4) };
        let mut rpts = 0;
        for _ in 0..5 {
            if p.on_receive(0).send_ifcm_rpt {
                rpts += 1;
            }
        }
        assert_eq!(rpts, 1);
    }
}
